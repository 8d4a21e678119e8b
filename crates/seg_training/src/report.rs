//! Dataset health report used by the `dataset_report` tool.

use seg_dataset::{PairingReport, SegmentationDataset, ValidationOutcome};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct DecodeFailure {
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetReport {
    pub root: PathBuf,
    pub layout: String,
    pub samples: usize,
    pub pairing: PairingReport,
    /// Number of samples decoded; zero unless decoding was requested.
    pub decoded: usize,
    pub decode_failures: Vec<DecodeFailure>,
}

impl DatasetReport {
    /// Pairing outcome, downgraded to fail when any sample could not be decoded.
    pub fn outcome(&self) -> ValidationOutcome {
        if self.decode_failures.is_empty() {
            self.pairing.outcome
        } else {
            ValidationOutcome::Fail
        }
    }
}

pub fn build_report(dataset: &SegmentationDataset, decode: bool) -> DatasetReport {
    let pairing = dataset.pairing_report();
    let mut decoded = 0usize;
    let mut decode_failures = Vec::new();
    if decode {
        for index in 0..dataset.len() {
            match dataset.get(index) {
                Ok(_) => decoded += 1,
                Err(e) => {
                    tracing::warn!(index, error = %e, "sample failed to load");
                    decode_failures.push(DecodeFailure {
                        index,
                        error: e.to_string(),
                    });
                }
            }
        }
    }
    DatasetReport {
        root: dataset.root().to_path_buf(),
        layout: dataset.layout().name().to_string(),
        samples: dataset.len(),
        pairing,
        decoded,
        decode_failures,
    }
}
