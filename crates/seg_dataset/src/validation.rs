//! Image/label pairing checks.

use crate::discovery::DiscoveredFiles;
use crate::layout::DatasetLayout;
use crate::types::{PairMismatch, PairingReport, ValidationOutcome};

/// Compare the two sorted lists position by position.
///
/// A length difference fails the report; positions whose scene keys differ
/// are listed as mismatches and also fail it. An empty dataset warns.
pub fn validate_pairing(files: &DiscoveredFiles, layout: &DatasetLayout) -> PairingReport {
    let images = files.images.len();
    let labels = files.labels.len();
    let mut mismatches = Vec::new();
    let mut matched = 0usize;

    for index in 0..images.max(labels) {
        let image = files.images.get(index);
        let label = files.labels.get(index);
        let reason = match (image, label) {
            (Some(img), Some(lbl)) => {
                let img_key = layout.scene_key(img, false);
                let lbl_key = layout.scene_key(lbl, true);
                if img_key.is_some() && img_key == lbl_key {
                    matched += 1;
                    continue;
                }
                format!(
                    "scene key {} != {}",
                    img_key.as_deref().unwrap_or("?"),
                    lbl_key.as_deref().unwrap_or("?")
                )
            }
            (Some(_), None) => "image has no label at this position".to_string(),
            (None, Some(_)) => "label has no image at this position".to_string(),
            (None, None) => unreachable!("index below max of both lengths"),
        };
        mismatches.push(PairMismatch {
            index,
            image: image.cloned(),
            label: label.cloned(),
            reason,
        });
    }

    let mut outcome = ValidationOutcome::Pass;
    let mut reasons = Vec::new();
    if images != labels {
        outcome = ValidationOutcome::Fail;
        reasons.push(format!("count mismatch: {images} images, {labels} labels"));
    }
    if !mismatches.is_empty() {
        outcome = ValidationOutcome::Fail;
        reasons.push(format!("{} positions do not pair up", mismatches.len()));
    }
    if images == 0 && outcome == ValidationOutcome::Pass {
        outcome = ValidationOutcome::Warn;
        reasons.push("no images found".to_string());
    }

    PairingReport {
        outcome,
        images,
        labels,
        matched,
        mismatches,
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn files(images: &[&str], labels: &[&str]) -> DiscoveredFiles {
        DiscoveredFiles {
            images: images.iter().map(PathBuf::from).collect(),
            labels: labels.iter().map(PathBuf::from).collect(),
        }
    }

    #[test]
    fn matching_cityscapes_pairs_pass() {
        let f = files(
            &["a/x_1_leftImg8bit.png", "a/x_2_leftImg8bit.png"],
            &["a/x_1_gtFine_labelTrainIds.png", "a/x_2_gtFine_labelTrainIds.png"],
        );
        let report = validate_pairing(&f, &DatasetLayout::default());
        assert_eq!(report.outcome, ValidationOutcome::Pass);
        assert_eq!(report.matched, 2);
    }

    #[test]
    fn shifted_pairs_are_reported() {
        let f = files(
            &["x_1_leftImg8bit.png", "x_2_leftImg8bit.png"],
            &["x_2_gtFine_labelTrainIds.png"],
        );
        let report = validate_pairing(&f, &DatasetLayout::default());
        assert_eq!(report.outcome, ValidationOutcome::Fail);
        assert_eq!(report.mismatches.len(), 2);
        assert_eq!(report.mismatches[1].label, None);
    }

    #[test]
    fn empty_dataset_warns() {
        let report = validate_pairing(&files(&[], &[]), &DatasetLayout::Validation);
        assert_eq!(report.outcome, ValidationOutcome::Warn);
    }
}
