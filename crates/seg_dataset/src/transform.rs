//! Per-sample preprocessing transforms.
//!
//! Any `Fn(In) -> DatasetResult<Out> + Send + Sync` closure is a transform;
//! the structs below cover the usual segmentation preprocessing and chain
//! with [`Transform::then`].

use crate::types::{DatasetResult, ImageTensor, LabelArray, SegDatasetError};
use image::imageops::FilterType;
use image::{GrayImage, RgbImage};

pub trait Transform<In>: Send + Sync {
    type Output;

    fn apply(&self, input: In) -> DatasetResult<Self::Output>;

    /// Run `next` on the output of `self`.
    fn then<T>(self, next: T) -> Chain<Self, T>
    where
        Self: Sized,
        T: Transform<Self::Output>,
    {
        Chain {
            first: self,
            second: next,
        }
    }
}

impl<In, Out, F> Transform<In> for F
where
    F: Fn(In) -> DatasetResult<Out> + Send + Sync,
{
    type Output = Out;

    fn apply(&self, input: In) -> DatasetResult<Out> {
        self(input)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl<T> Transform<T> for Identity {
    type Output = T;

    fn apply(&self, input: T) -> DatasetResult<T> {
        Ok(input)
    }
}

#[derive(Debug, Clone)]
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<In, A, B> Transform<In> for Chain<A, B>
where
    A: Transform<In>,
    B: Transform<A::Output>,
{
    type Output = B::Output;

    fn apply(&self, input: In) -> DatasetResult<Self::Output> {
        self.second.apply(self.first.apply(input)?)
    }
}

/// Resize to a fixed (width, height). Images use a triangle filter; labels
/// use nearest-neighbour so class ids are never blended.
#[derive(Debug, Clone, Copy)]
pub struct Resize {
    pub width: u32,
    pub height: u32,
}

impl Resize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Transform<RgbImage> for Resize {
    type Output = RgbImage;

    fn apply(&self, input: RgbImage) -> DatasetResult<RgbImage> {
        if input.dimensions() == (self.width, self.height) {
            return Ok(input);
        }
        Ok(image::imageops::resize(
            &input,
            self.width,
            self.height,
            FilterType::Triangle,
        ))
    }
}

impl Transform<GrayImage> for Resize {
    type Output = GrayImage;

    fn apply(&self, input: GrayImage) -> DatasetResult<GrayImage> {
        if input.dimensions() == (self.width, self.height) {
            return Ok(input);
        }
        Ok(image::imageops::resize(
            &input,
            self.width,
            self.height,
            FilterType::Nearest,
        ))
    }
}

/// RGB image to a CHW tensor with values in [0, 1].
#[derive(Debug, Clone, Copy, Default)]
pub struct ToTensor;

impl Transform<RgbImage> for ToTensor {
    type Output = ImageTensor;

    fn apply(&self, input: RgbImage) -> DatasetResult<ImageTensor> {
        let (width, height) = input.dimensions();
        let (w, h) = (width as usize, height as usize);
        let npix = w * h;
        let raw = input.as_raw();
        // HWC interleaved -> CHW planar
        let mut data = vec![0.0f32; 3 * npix];
        for i in 0..npix {
            data[i] = raw[i * 3] as f32 / 255.0;
            data[npix + i] = raw[i * 3 + 1] as f32 / 255.0;
            data[2 * npix + i] = raw[i * 3 + 2] as f32 / 255.0;
        }
        Ok(ImageTensor {
            data,
            shape: [3, h, w],
        })
    }
}

/// Per-channel `(x - mean) / std`.
#[derive(Debug, Clone, Copy)]
pub struct Normalize {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Normalize {
    pub fn new(mean: [f32; 3], std: [f32; 3]) -> Self {
        Self { mean, std }
    }

    /// ImageNet channel statistics.
    pub fn imagenet() -> Self {
        Self::new([0.485, 0.456, 0.406], [0.229, 0.224, 0.225])
    }
}

impl Transform<ImageTensor> for Normalize {
    type Output = ImageTensor;

    fn apply(&self, mut input: ImageTensor) -> DatasetResult<ImageTensor> {
        if input.channels() != 3 {
            return Err(SegDatasetError::InvalidArgument(format!(
                "normalize expects 3 channels, got shape {:?}",
                input.shape
            )));
        }
        if self.std.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err(SegDatasetError::InvalidArgument(format!(
                "normalize std must be finite and non-zero, got {:?}",
                self.std
            )));
        }
        let plane = input.height() * input.width();
        for (c, chunk) in input.data.chunks_mut(plane.max(1)).enumerate().take(3) {
            for v in chunk {
                *v = (*v - self.mean[c]) / self.std[c];
            }
        }
        Ok(input)
    }
}

/// Grayscale class-index image to a `[1, H, W]` label array.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToLabelArray;

impl Transform<GrayImage> for ToLabelArray {
    type Output = LabelArray;

    fn apply(&self, input: GrayImage) -> DatasetResult<LabelArray> {
        let (w, h) = input.dimensions();
        let data = input.into_raw().into_iter().map(i64::from).collect();
        LabelArray::new(data, vec![1, h as usize, w as usize])
    }
}

/// Replace every occurrence of one class id, e.g. mapping the 255 ignore
/// value to a dedicated void class.
#[derive(Debug, Clone, Copy)]
pub struct Relabel {
    pub from: i64,
    pub to: i64,
}

impl Relabel {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }
}

impl Transform<LabelArray> for Relabel {
    type Output = LabelArray;

    fn apply(&self, mut input: LabelArray) -> DatasetResult<LabelArray> {
        for v in input.data.iter_mut().filter(|v| **v == self.from) {
            *v = self.to;
        }
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_tensor_is_planar_and_scaled() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgb([255, 0, 51]));
        img.put_pixel(1, 0, image::Rgb([0, 255, 0]));
        let t = ToTensor.apply(img).unwrap();
        assert_eq!(t.shape, [3, 1, 2]);
        assert_eq!(t.data, vec![1.0, 0.0, 0.0, 1.0, 0.2, 0.0]);
    }

    #[test]
    fn normalize_rejects_zero_std() {
        let t = ImageTensor {
            data: vec![0.5; 3],
            shape: [3, 1, 1],
        };
        let err = Normalize::new([0.0; 3], [1.0, 0.0, 1.0]).apply(t).unwrap_err();
        assert!(matches!(err, SegDatasetError::InvalidArgument(_)));
    }

    #[test]
    fn label_resize_keeps_class_ids() {
        let mut img = GrayImage::new(2, 2);
        img.put_pixel(0, 0, image::Luma([7]));
        img.put_pixel(1, 1, image::Luma([3]));
        let out = Transform::<GrayImage>::apply(&Resize::new(4, 4), img).unwrap();
        assert!(out.pixels().all(|p| [0, 3, 7].contains(&p.0[0])));
    }

    #[test]
    fn chained_label_pipeline() {
        let img = GrayImage::from_pixel(2, 3, image::Luma([255]));
        let pipeline = ToLabelArray.then(Relabel::new(255, 19));
        let label = pipeline.apply(img).unwrap();
        assert_eq!(label.shape, vec![1, 3, 2]);
        assert!(label.data.iter().all(|v| *v == 19));
    }

    #[test]
    fn closures_are_transforms() {
        let count = |img: GrayImage| -> DatasetResult<usize> { Ok(img.len()) };
        assert_eq!(count.apply(GrayImage::new(3, 2)).unwrap(), 6);
    }
}
