//! Position-indexed segmentation dataset.

use crate::config::DatasetConfig;
use crate::discovery::{discover, DiscoveredFiles};
use crate::label::{squeeze_to_2d, IntoLabelArray, LabelDecoding};
use crate::layout::DatasetLayout;
use crate::transform::{Identity, Transform};
use crate::types::{
    DatasetResult, LabelMap, PairingCheck, PairingReport, SamplePaths, SegDatasetError,
    SegSample,
};
use crate::validation::validate_pairing;
use image::{GrayImage, RgbImage};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Builder for [`SegmentationDataset`].
#[derive(Debug, Clone)]
pub struct SegmentationDatasetBuilder {
    root: PathBuf,
    layout: DatasetLayout,
    include_paths: bool,
    pairing: PairingCheck,
    label_decoding: LabelDecoding,
}

impl SegmentationDatasetBuilder {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            layout: DatasetLayout::default(),
            include_paths: false,
            pairing: PairingCheck::default(),
            label_decoding: LabelDecoding::default(),
        }
    }

    pub fn layout(mut self, layout: DatasetLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Attach the source paths to every returned sample.
    pub fn include_paths(mut self, yes: bool) -> Self {
        self.include_paths = yes;
        self
    }

    pub fn pairing(mut self, pairing: PairingCheck) -> Self {
        self.pairing = pairing;
        self
    }

    pub fn label_decoding(mut self, decoding: LabelDecoding) -> Self {
        self.label_decoding = decoding;
        self
    }

    /// Scan the directory tree and build the dataset with identity transforms.
    pub fn build(self) -> DatasetResult<SegmentationDataset> {
        let files = discover(&self.root, &self.layout)?;
        tracing::debug!(
            root = %self.root.display(),
            layout = self.layout.name(),
            images = files.images.len(),
            labels = files.labels.len(),
            "indexed dataset"
        );
        check_pairing(&files, &self.layout, self.pairing)?;
        Ok(SegmentationDataset {
            root: self.root,
            layout: self.layout,
            files,
            include_paths: self.include_paths,
            label_decoding: self.label_decoding,
            input_transform: Arc::new(Identity),
            target_transform: Arc::new(Identity),
        })
    }
}

fn check_pairing(
    files: &DiscoveredFiles,
    layout: &DatasetLayout,
    pairing: PairingCheck,
) -> DatasetResult<()> {
    let (images, labels) = (files.images.len(), files.labels.len());
    match pairing {
        PairingCheck::Unchecked => {
            if images != labels {
                tracing::warn!(images, labels, "image and label counts differ");
            }
            Ok(())
        }
        PairingCheck::Length if images != labels => Err(SegDatasetError::PairingMismatch {
            msg: format!("{images} images but {labels} labels"),
        }),
        PairingCheck::Length => Ok(()),
        PairingCheck::Basename => {
            let report = validate_pairing(files, layout);
            match report.mismatches.first() {
                None => Ok(()),
                Some(first) => Err(SegDatasetError::PairingMismatch {
                    msg: format!(
                        "{} mismatched positions, first at {}: {}",
                        report.mismatches.len(),
                        first.index,
                        first.reason
                    ),
                }),
            }
        }
    }
}

/// Image/label pairs discovered once at construction and addressed by
/// position.
///
/// `I` and `L` are the outputs of the input and target transforms; the
/// defaults are the decoded RGB image and class-index label.
pub struct SegmentationDataset<I = RgbImage, L = GrayImage> {
    root: PathBuf,
    layout: DatasetLayout,
    files: DiscoveredFiles,
    include_paths: bool,
    label_decoding: LabelDecoding,
    input_transform: Arc<dyn Transform<RgbImage, Output = I>>,
    target_transform: Arc<dyn Transform<GrayImage, Output = L>>,
}

impl SegmentationDataset {
    pub fn builder<P: AsRef<Path>>(root: P) -> SegmentationDatasetBuilder {
        SegmentationDatasetBuilder::new(root)
    }

    pub fn new<P: AsRef<Path>>(root: P, layout: DatasetLayout) -> DatasetResult<Self> {
        Self::builder(root).layout(layout).build()
    }

    pub fn from_config(cfg: &DatasetConfig) -> DatasetResult<Self> {
        Self::builder(&cfg.root)
            .layout(cfg.layout.clone())
            .include_paths(cfg.include_paths)
            .pairing(cfg.pairing)
            .label_decoding(cfg.label_decoding.clone())
            .build()
    }
}

impl<I, L> SegmentationDataset<I, L> {
    pub fn with_input_transform<T>(self, transform: T) -> SegmentationDataset<T::Output, L>
    where
        T: Transform<RgbImage> + 'static,
    {
        SegmentationDataset {
            root: self.root,
            layout: self.layout,
            files: self.files,
            include_paths: self.include_paths,
            label_decoding: self.label_decoding,
            input_transform: Arc::new(transform),
            target_transform: self.target_transform,
        }
    }

    pub fn with_target_transform<T>(self, transform: T) -> SegmentationDataset<I, T::Output>
    where
        T: Transform<GrayImage> + 'static,
    {
        SegmentationDataset {
            root: self.root,
            layout: self.layout,
            files: self.files,
            include_paths: self.include_paths,
            label_decoding: self.label_decoding,
            input_transform: self.input_transform,
            target_transform: Arc::new(transform),
        }
    }

    /// Number of samples, counted from the image list.
    pub fn len(&self) -> usize {
        self.files.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn label_count(&self) -> usize {
        self.files.labels.len()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    pub fn files(&self) -> &DiscoveredFiles {
        &self.files
    }

    pub fn pairing_report(&self) -> PairingReport {
        validate_pairing(&self.files, &self.layout)
    }

    /// Source paths of the sample at `index`, without decoding.
    pub fn paths(&self, index: usize) -> DatasetResult<SamplePaths> {
        let len = self.len();
        if index >= len {
            return Err(SegDatasetError::OutOfRange { index, len });
        }
        // Only reachable with unchecked pairing and fewer labels than images.
        self.files.pair(index).ok_or(SegDatasetError::OutOfRange {
            index,
            len: self.label_count(),
        })
    }

    /// Decode the image as RGB and the label as a class-index image.
    pub fn load_raw(&self, index: usize) -> DatasetResult<(RgbImage, GrayImage, SamplePaths)> {
        let paths = self.paths(index)?;
        let image = image::open(&paths.image)
            .map_err(|e| SegDatasetError::decode(&paths.image, e))?
            .to_rgb8();
        let label = self.label_decoding.load(&paths.label)?;
        Ok((image, label, paths))
    }

    pub fn get(&self, index: usize) -> DatasetResult<SegSample<I, L>> {
        let (image, label, paths) = self.load_raw(index)?;
        let image = self.input_transform.apply(image)?;
        let label = self.target_transform.apply(label)?;
        Ok(SegSample {
            image,
            label,
            paths: self.include_paths.then_some(paths),
        })
    }

    /// Like [`get`](Self::get), with the transformed label squeezed to a
    /// rank-2 class map.
    pub fn get_label_map(&self, index: usize) -> DatasetResult<SegSample<I, LabelMap>>
    where
        L: IntoLabelArray,
    {
        let sample = self.get(index)?;
        let label = squeeze_to_2d(sample.label.into_label_array()?)?;
        Ok(SegSample {
            image: sample.image,
            label,
            paths: sample.paths,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = DatasetResult<SegSample<I, L>>> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }
}

impl<I, L> fmt::Debug for SegmentationDataset<I, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentationDataset")
            .field("root", &self.root)
            .field("layout", &self.layout)
            .field("images", &self.files.images.len())
            .field("labels", &self.files.labels.len())
            .field("include_paths", &self.include_paths)
            .field("label_decoding", &self.label_decoding)
            .finish_non_exhaustive()
    }
}
