//! On-disk directory conventions for the supported dataset families.
//!
//! ```text
//! voc12:       <root>/images/<name>.png          <root>/labels_masks/<name>.png
//! cityscapes:  <root>/leftImg8bit/<subset>/**/*   <root>/gtFine/<subset>/**/*_labelTrainIds.png
//! validation:  <root>/images/**/*                 <root>/label_marks/**/*_labelTrainIds.png
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name suffixes accepted as images. Matched exactly (case-sensitive).
pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".png"];

/// Ground-truth suffix of train-id label files.
pub const LABEL_SUFFIX: &str = "_labelTrainIds.png";

pub const DEFAULT_SUBSET: &str = "val";

fn default_subset() -> String {
    DEFAULT_SUBSET.to_string()
}

pub fn is_image(path: &Path) -> bool {
    file_name(path).is_some_and(|name| IMAGE_EXTENSIONS.iter().any(|ext| name.ends_with(ext)))
}

pub fn is_label(path: &Path) -> bool {
    file_name(path).is_some_and(|name| name.ends_with(LABEL_SUFFIX))
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetLayout {
    /// Flat `images/` + `labels_masks/`, paired by basename.
    Voc12,
    /// Cityscapes `leftImg8bit/<subset>` + `gtFine/<subset>`, paired by sort position.
    Cityscapes {
        #[serde(default = "default_subset")]
        subset: String,
    },
    /// `images/` + `label_marks/`, paired by sort position.
    Validation,
}

impl Default for DatasetLayout {
    fn default() -> Self {
        DatasetLayout::cityscapes(DEFAULT_SUBSET)
    }
}

impl DatasetLayout {
    pub fn cityscapes(subset: impl Into<String>) -> Self {
        DatasetLayout::Cityscapes {
            subset: subset.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DatasetLayout::Voc12 => "voc12",
            DatasetLayout::Cityscapes { .. } => "cityscapes",
            DatasetLayout::Validation => "validation",
        }
    }

    pub fn images_root(&self, root: &Path) -> PathBuf {
        match self {
            DatasetLayout::Voc12 | DatasetLayout::Validation => root.join("images"),
            DatasetLayout::Cityscapes { subset } => root.join("leftImg8bit").join(subset),
        }
    }

    pub fn labels_root(&self, root: &Path) -> PathBuf {
        match self {
            DatasetLayout::Voc12 => root.join("labels_masks"),
            DatasetLayout::Validation => root.join("label_marks"),
            DatasetLayout::Cityscapes { subset } => root.join("gtFine").join(subset),
        }
    }

    /// Whether both lists are collected independently and joined by position.
    pub fn pairs_by_position(&self) -> bool {
        !matches!(self, DatasetLayout::Voc12)
    }

    /// Stem shared by an image and its label, used for basename validation.
    ///
    /// `aachen_000000_000019_leftImg8bit.png` and
    /// `aachen_000000_000019_gtFine_labelTrainIds.png` both map to
    /// `aachen_000000_000019`.
    pub fn scene_key(&self, path: &Path, is_label_file: bool) -> Option<String> {
        let name = file_name(path)?;
        let stem = if is_label_file && name.ends_with(LABEL_SUFFIX) {
            &name[..name.len() - LABEL_SUFFIX.len()]
        } else {
            name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name)
        };
        let stem = match self {
            DatasetLayout::Cityscapes { .. } if is_label_file => {
                strip_any_suffix(stem, &["_gtFine", "_gtCoarse"])
            }
            DatasetLayout::Cityscapes { .. } => strip_any_suffix(stem, &["_leftImg8bit"]),
            _ => stem,
        };
        Some(stem.to_string())
    }
}

fn strip_any_suffix<'a>(s: &'a str, suffixes: &[&str]) -> &'a str {
    suffixes
        .iter()
        .find_map(|suffix| s.strip_suffix(suffix))
        .unwrap_or(s)
}
