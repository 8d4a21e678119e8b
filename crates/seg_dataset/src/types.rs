//! Core types, error definitions, and data structures for seg_dataset.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, SegDatasetError>;

#[derive(Debug, Error)]
pub enum SegDatasetError {
    #[error("not found: {path}")]
    NotFound { path: PathBuf },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid label image at {path}: {msg}")]
    Label { path: PathBuf, msg: String },
    #[error("index {index} out of range for dataset of length {len}")]
    OutOfRange { index: usize, len: usize },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("image/label pairing mismatch: {msg}")]
    PairingMismatch { msg: String },
    #[error("config error at {path}: {msg}")]
    Config { path: PathBuf, msg: String },
}

impl SegDatasetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            SegDatasetError::NotFound { path }
        } else {
            SegDatasetError::Io { path, source }
        }
    }

    pub(crate) fn decode(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        let path = path.into();
        match source {
            image::ImageError::IoError(e) => Self::io(path, e),
            source => SegDatasetError::Decode { path, source },
        }
    }
}

/// The two files backing one sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePaths {
    pub image: PathBuf,
    pub label: PathBuf,
}

/// A transformed (image, label) pair, with paths attached when the dataset
/// was built with `include_paths`.
#[derive(Debug, Clone)]
pub struct SegSample<I, L> {
    pub image: I,
    pub label: L,
    pub paths: Option<SamplePaths>,
}

/// Image in CHW layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub data: Vec<f32>,
    /// `[channels, height, width]`.
    pub shape: [usize; 3],
}

impl ImageTensor {
    pub fn channels(&self) -> usize {
        self.shape[0]
    }

    pub fn height(&self) -> usize {
        self.shape[1]
    }

    pub fn width(&self) -> usize {
        self.shape[2]
    }
}

/// Class-index array of arbitrary rank, as produced by label transforms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelArray {
    pub data: Vec<i64>,
    pub shape: Vec<usize>,
}

impl LabelArray {
    pub fn new(data: Vec<i64>, shape: Vec<usize>) -> DatasetResult<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(SegDatasetError::InvalidArgument(format!(
                "label shape {shape:?} needs {expected} elements, got {}",
                data.len()
            )));
        }
        Ok(Self { data, shape })
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }
}

/// Rank-2 class-index map, row-major `[height, width]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    pub data: Vec<i64>,
    pub height: usize,
    pub width: usize,
}

impl LabelMap {
    pub fn get(&self, y: usize, x: usize) -> Option<i64> {
        if y >= self.height || x >= self.width {
            return None;
        }
        self.data.get(y * self.width + x).copied()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingCheck {
    /// Pair by sort position only; count differences surface at lookup time.
    Unchecked,
    /// Image and label lists must have the same length.
    #[default]
    Length,
    /// Same length, and every position must share the same scene key.
    Basename,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    Pass,
    Warn,
    Fail,
}

impl ValidationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationOutcome::Pass => "pass",
            ValidationOutcome::Warn => "warn",
            ValidationOutcome::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairMismatch {
    pub index: usize,
    pub image: Option<PathBuf>,
    pub label: Option<PathBuf>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingReport {
    pub outcome: ValidationOutcome,
    pub images: usize,
    pub labels: usize,
    pub matched: usize,
    pub mismatches: Vec<PairMismatch>,
    pub reasons: Vec<String>,
}
