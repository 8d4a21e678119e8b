//! Burn tensor conversion and batch collation.

use crate::types::{DatasetResult, ImageTensor, LabelMap, SegDatasetError, SegSample};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};

pub struct SegBatch<B: Backend> {
    /// `[batch, channels, height, width]`.
    pub images: Tensor<B, 4>,
    /// `[batch, height, width]` class indices.
    pub labels: Tensor<B, 3, Int>,
}

impl ImageTensor {
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 3> {
        Tensor::<B, 3>::from_data(TensorData::new(self.data.clone(), self.shape), device)
    }
}

impl LabelMap {
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2, Int> {
        Tensor::<B, 2, Int>::from_data(
            TensorData::new(self.data.clone(), [self.height, self.width]),
            device,
        )
    }
}

/// Stack samples into one batch. Every image must share the first image's
/// shape and every label must match its spatial size.
pub fn collate<B: Backend>(
    samples: &[SegSample<ImageTensor, LabelMap>],
    device: &B::Device,
) -> DatasetResult<SegBatch<B>> {
    let Some(first) = samples.first() else {
        return Err(SegDatasetError::InvalidArgument(
            "cannot collate empty batch".to_string(),
        ));
    };
    let [channels, height, width] = first.image.shape;
    let batch = samples.len();

    let mut image_buf: Vec<f32> = Vec::with_capacity(batch * channels * height * width);
    let mut label_buf: Vec<i64> = Vec::with_capacity(batch * height * width);
    for (i, sample) in samples.iter().enumerate() {
        if sample.image.shape != first.image.shape {
            return Err(SegDatasetError::InvalidArgument(format!(
                "image shapes differ within batch: sample {i} is {:?}, expected {:?}",
                sample.image.shape, first.image.shape
            )));
        }
        if (sample.label.height, sample.label.width) != (height, width) {
            return Err(SegDatasetError::InvalidArgument(format!(
                "label {i} is {}x{}, expected {}x{}",
                sample.label.height, sample.label.width, height, width
            )));
        }
        image_buf.extend_from_slice(&sample.image.data);
        label_buf.extend_from_slice(&sample.label.data);
    }

    let images = Tensor::<B, 4>::from_data(
        TensorData::new(image_buf, [batch, channels, height, width]),
        device,
    );
    let labels = Tensor::<B, 3, Int>::from_data(
        TensorData::new(label_buf, [batch, height, width]),
        device,
    );
    Ok(SegBatch { images, labels })
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    fn sample(value: f32, label: i64, h: usize, w: usize) -> SegSample<ImageTensor, LabelMap> {
        SegSample {
            image: ImageTensor {
                data: vec![value; 3 * h * w],
                shape: [3, h, w],
            },
            label: LabelMap {
                data: vec![label; h * w],
                height: h,
                width: w,
            },
            paths: None,
        }
    }

    #[test]
    fn collate_stacks_in_order() {
        let device = Default::default();
        let batch = collate::<B>(&[sample(0.25, 1, 2, 3), sample(0.5, 2, 2, 3)], &device).unwrap();
        assert_eq!(batch.images.dims(), [2, 3, 2, 3]);
        assert_eq!(batch.labels.dims(), [2, 2, 3]);
        let labels = batch.labels.into_data().to_vec::<i64>().unwrap();
        assert_eq!(&labels[..6], &[1; 6]);
        assert_eq!(&labels[6..], &[2; 6]);
    }

    #[test]
    fn collate_rejects_mixed_sizes() {
        let device = Default::default();
        let result = collate::<B>(&[sample(0.0, 0, 2, 2), sample(0.0, 0, 3, 2)], &device);
        assert!(matches!(result, Err(SegDatasetError::InvalidArgument(_))));
    }

    #[test]
    fn label_map_tensor_shape() {
        let device = Default::default();
        let map = LabelMap {
            data: vec![0, 1, 2, 3, 4, 5],
            height: 2,
            width: 3,
        };
        assert_eq!(map.to_tensor::<B>(&device).dims(), [2, 3]);
    }
}
