//! Image/label pair indexing and loading for semantic-segmentation datasets.
//!
//! This crate provides utilities for:
//! - Discovering image and label files under Cityscapes, VOC12 and validation layouts
//! - Position-indexed lookup with decoding and user-supplied transforms
//! - Image/label pairing validation
//! - Label rank coercion and Burn tensor collation

// Module declarations
pub mod config;
pub mod dataset;
pub mod discovery;
pub mod label;
pub mod layout;
pub mod transform;
pub mod types;
pub mod validation;

#[cfg(feature = "burn-runtime")]
pub mod batch;

// Re-export public API
pub use config::DatasetConfig;
pub use dataset::{SegmentationDataset, SegmentationDatasetBuilder};
pub use discovery::{collect_files, discover, DiscoveredFiles};
pub use label::{squeeze_to_2d, voc_palette, IntoLabelArray, LabelDecoding};
pub use layout::{is_image, is_label, DatasetLayout, LABEL_SUFFIX};
pub use transform::{Chain, Identity, Normalize, Relabel, Resize, ToLabelArray, ToTensor, Transform};
pub use types::*;
pub use validation::validate_pairing;

#[cfg(feature = "burn-runtime")]
pub use batch::{collate, SegBatch};
