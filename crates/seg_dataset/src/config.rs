//! TOML dataset configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::label::LabelDecoding;
use crate::layout::DatasetLayout;
use crate::types::{DatasetResult, PairingCheck, SegDatasetError};

pub const DEFAULT_CONFIG_NAME: &str = "seg-dataset.toml";
pub const CONFIG_ENV: &str = "SEG_DATASET_CONFIG";

/// Dataset construction parameters, loadable from TOML:
///
/// ```toml
/// root = "~/datasets/cityscapes"
/// include_paths = true
/// pairing = "basename"
///
/// [layout]
/// kind = "cityscapes"
/// subset = "train"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub root: PathBuf,
    #[serde(default)]
    pub layout: DatasetLayout,
    #[serde(default)]
    pub include_paths: bool,
    #[serde(default)]
    pub pairing: PairingCheck,
    #[serde(default)]
    pub label_decoding: LabelDecoding,
}

impl DatasetConfig {
    pub fn new(root: impl Into<PathBuf>, layout: DatasetLayout) -> Self {
        Self {
            root: root.into(),
            layout,
            include_paths: false,
            pairing: PairingCheck::default(),
            label_decoding: LabelDecoding::default(),
        }
    }

    /// Load from the file named by `SEG_DATASET_CONFIG`, falling back to
    /// `seg-dataset.toml` in the working directory.
    pub fn load() -> DatasetResult<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_path(Path::new(&path)),
            _ => Self::from_path(Path::new(DEFAULT_CONFIG_NAME)),
        }
    }

    pub fn from_path(path: &Path) -> DatasetResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| SegDatasetError::io(path, e))?;
        let mut cfg = Self::from_toml_str(&raw).map_err(|msg| SegDatasetError::Config {
            path: path.to_path_buf(),
            msg,
        })?;
        // Relative roots resolve against the config file's directory.
        if cfg.root.is_relative() {
            if let Some(parent) = path.parent() {
                cfg.root = parent.join(&cfg.root);
            }
        }
        Ok(cfg)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, String> {
        let mut cfg: DatasetConfig = toml::from_str(raw).map_err(|e| e.to_string())?;
        cfg.root = expand_path(&cfg.root.to_string_lossy());
        Ok(cfg)
    }
}

fn expand_path(value: &str) -> PathBuf {
    if let Some(stripped) = value.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(value)
}
