//! Label decoding and rank coercion.

use crate::types::{DatasetResult, LabelArray, LabelMap, SegDatasetError};
use image::error::{DecodingError, ImageFormatHint};
use image::{DynamicImage, GrayImage, ImageError, ImageFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// How a non-indexed label file is turned into a single-channel class-index
/// image.
///
/// Indexed (palette) PNGs always yield their raw palette indices, whatever
/// the decoding. The colour lookups here cover labels stored as RGB.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LabelDecoding {
    /// Grayscale value is the class id. Colour files are accepted only when
    /// every pixel has equal channels.
    #[default]
    Luma,
    /// Standard PASCAL VOC colour map.
    VocPalette,
    /// Explicit palette; entry `i` is the colour of class `i`.
    Palette { colors: Vec<[u8; 3]> },
}

/// The 256-entry PASCAL VOC colour map.
pub fn voc_palette() -> Vec<[u8; 3]> {
    (0..256u32)
        .map(|i| {
            let (mut r, mut g, mut b) = (0u8, 0u8, 0u8);
            let mut c = i;
            for j in 0..8 {
                r |= ((c & 1) as u8) << (7 - j);
                g |= (((c >> 1) & 1) as u8) << (7 - j);
                b |= (((c >> 2) & 1) as u8) << (7 - j);
                c >>= 3;
            }
            [r, g, b]
        })
        .collect()
}

impl LabelDecoding {
    /// Read the label at `path`: raw indices for indexed PNGs, otherwise
    /// decode with `image` and convert per [`decode`](Self::decode).
    pub fn load(&self, path: &Path) -> DatasetResult<GrayImage> {
        if let Some(indices) = read_indexed_png(path)? {
            return Ok(indices);
        }
        let img = image::open(path).map_err(|e| SegDatasetError::decode(path, e))?;
        self.decode(img, path)
    }

    pub fn decode(&self, img: DynamicImage, path: &Path) -> DatasetResult<GrayImage> {
        if !matches!(
            img,
            DynamicImage::ImageLuma8(_)
                | DynamicImage::ImageLumaA8(_)
                | DynamicImage::ImageRgb8(_)
                | DynamicImage::ImageRgba8(_)
        ) {
            return Err(SegDatasetError::Label {
                path: path.to_path_buf(),
                msg: format!("unsupported label colour type {:?}; expected 8-bit", img.color()),
            });
        }
        match self {
            LabelDecoding::Luma => decode_luma(img, path),
            LabelDecoding::VocPalette => decode_palette(img, &voc_palette(), path),
            LabelDecoding::Palette { colors } => decode_palette(img, colors, path),
        }
    }
}

fn decode_luma(img: DynamicImage, path: &Path) -> DatasetResult<GrayImage> {
    match img {
        DynamicImage::ImageLuma8(gray) => Ok(gray),
        DynamicImage::ImageLumaA8(la) => Ok(DynamicImage::ImageLumaA8(la).to_luma8()),
        other => {
            let rgb = other.to_rgb8();
            let (w, h) = rgb.dimensions();
            let mut out = GrayImage::new(w, h);
            for (x, y, px) in rgb.enumerate_pixels() {
                let [r, g, b] = px.0;
                if r != g || g != b {
                    return Err(SegDatasetError::Label {
                        path: path.to_path_buf(),
                        msg: format!(
                            "colour pixel ({r},{g},{b}) at ({x},{y}); use a palette label decoding"
                        ),
                    });
                }
                out.put_pixel(x, y, image::Luma([r]));
            }
            Ok(out)
        }
    }
}

fn decode_palette(img: DynamicImage, colors: &[[u8; 3]], path: &Path) -> DatasetResult<GrayImage> {
    if colors.len() > 256 {
        return Err(SegDatasetError::InvalidArgument(format!(
            "palette has {} entries; at most 256 fit an indexed label",
            colors.len()
        )));
    }
    let mut lookup = HashMap::with_capacity(colors.len());
    for (idx, color) in colors.iter().enumerate() {
        lookup.entry(*color).or_insert(idx as u8);
    }
    let rgb = img.to_rgb8();
    let (w, h) = rgb.dimensions();
    let mut out = GrayImage::new(w, h);
    for (x, y, px) in rgb.enumerate_pixels() {
        let Some(&idx) = lookup.get(&px.0) else {
            return Err(SegDatasetError::Label {
                path: path.to_path_buf(),
                msg: format!("colour {:?} at ({x},{y}) is not in the palette", px.0),
            });
        };
        out.put_pixel(x, y, image::Luma([idx]));
    }
    Ok(out)
}

/// Raw palette indices of an indexed PNG, or `None` when the file is not an
/// indexed PNG (including files that are not PNGs at all).
pub fn read_indexed_png(path: &Path) -> DatasetResult<Option<GrayImage>> {
    let file = File::open(path).map_err(|e| SegDatasetError::io(path, e))?;
    let mut decoder = png::Decoder::new(BufReader::new(file));
    decoder.set_transformations(png::Transformations::IDENTITY);
    let Ok(mut reader) = decoder.read_info() else {
        return Ok(None);
    };
    let info = reader.info();
    if info.color_type != png::ColorType::Indexed {
        return Ok(None);
    }
    let (width, height, depth) = (info.width, info.height, info.bit_depth as u8);
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let frame = reader
        .next_frame(&mut buf)
        .map_err(|e| SegDatasetError::decode(path, png_error(e)))?;
    let data = unpack_indices(&buf, frame.line_size, width, height, depth);
    GrayImage::from_raw(width, height, data)
        .map(Some)
        .ok_or_else(|| SegDatasetError::Label {
            path: path.to_path_buf(),
            msg: format!("indexed frame does not fill {width}x{height}"),
        })
}

fn png_error(e: png::DecodingError) -> ImageError {
    ImageError::Decoding(DecodingError::new(ImageFormatHint::Exact(ImageFormat::Png), e))
}

/// Expand packed rows of `depth`-bit indices (1, 2, 4 or 8) to one byte each.
fn unpack_indices(buf: &[u8], line_size: usize, width: u32, height: u32, depth: u8) -> Vec<u8> {
    let (width, height) = (width as usize, height as usize);
    if depth == 8 {
        return buf
            .chunks(line_size)
            .take(height)
            .flat_map(|row| row[..width].iter().copied())
            .collect();
    }
    let per_byte = (8 / depth) as usize;
    let mask = (1u8 << depth) - 1;
    let mut out = Vec::with_capacity(width * height);
    for row in buf.chunks(line_size).take(height) {
        for x in 0..width {
            let shift = 8 - depth as usize * (x % per_byte + 1);
            out.push((row[x / per_byte] >> shift) & mask);
        }
    }
    out
}

/// Values that can be viewed as an integer class-index array.
pub trait IntoLabelArray {
    fn into_label_array(self) -> DatasetResult<LabelArray>;
}

impl IntoLabelArray for GrayImage {
    fn into_label_array(self) -> DatasetResult<LabelArray> {
        let (w, h) = self.dimensions();
        let data = self.into_raw().into_iter().map(i64::from).collect();
        LabelArray::new(data, vec![h as usize, w as usize])
    }
}

impl IntoLabelArray for LabelArray {
    fn into_label_array(self) -> DatasetResult<LabelArray> {
        Ok(self)
    }
}

impl IntoLabelArray for LabelMap {
    fn into_label_array(self) -> DatasetResult<LabelArray> {
        LabelArray::new(self.data, vec![self.height, self.width])
    }
}

/// Coerce a label array to rank 2 by dropping size-1 dimensions.
///
/// Trailing singletons go first, then leading ones. Fails when a
/// non-singleton dimension would have to be dropped, or when the array has
/// rank below 2.
pub fn squeeze_to_2d(label: LabelArray) -> DatasetResult<LabelMap> {
    let LabelArray { data, mut shape } = label;
    if shape.len() < 2 {
        return Err(SegDatasetError::InvalidArgument(format!(
            "label of shape {shape:?} has rank below 2"
        )));
    }
    let original = shape.clone();
    while shape.len() > 2 && shape.last() == Some(&1) {
        shape.pop();
    }
    while shape.len() > 2 && shape.first() == Some(&1) {
        shape.remove(0);
    }
    if shape.len() != 2 {
        return Err(SegDatasetError::InvalidArgument(format!(
            "label of shape {original:?} cannot be squeezed to 2 dimensions"
        )));
    }
    Ok(LabelMap {
        data,
        height: shape[0],
        width: shape[1],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array(shape: &[usize]) -> LabelArray {
        let n: usize = shape.iter().product();
        LabelArray::new((0..n as i64).collect(), shape.to_vec()).unwrap()
    }

    #[test]
    fn squeeze_drops_leading_channel() {
        let map = squeeze_to_2d(array(&[1, 2, 3])).unwrap();
        assert_eq!((map.height, map.width), (2, 3));
        assert_eq!(map.get(1, 2), Some(5));
    }

    #[test]
    fn squeeze_prefers_trailing_singletons() {
        let map = squeeze_to_2d(array(&[1, 4, 1])).unwrap();
        assert_eq!((map.height, map.width), (1, 4));
    }

    #[test]
    fn squeeze_keeps_rank_two_untouched() {
        let map = squeeze_to_2d(array(&[1, 1])).unwrap();
        assert_eq!((map.height, map.width), (1, 1));
    }

    #[test]
    fn squeeze_rejects_real_extra_dimension() {
        let err = squeeze_to_2d(array(&[3, 2, 2])).unwrap_err();
        assert!(matches!(err, SegDatasetError::InvalidArgument(_)));
    }

    #[test]
    fn voc_palette_first_entries() {
        let p = voc_palette();
        assert_eq!(p[0], [0, 0, 0]);
        assert_eq!(p[1], [128, 0, 0]);
        assert_eq!(p[2], [0, 128, 0]);
        assert_eq!(p[15], [192, 128, 128]);
    }

    #[test]
    fn palette_decoding_recovers_indices() {
        let palette = voc_palette();
        let mut rgb = image::RgbImage::new(2, 1);
        rgb.put_pixel(0, 0, image::Rgb(palette[0]));
        rgb.put_pixel(1, 0, image::Rgb(palette[15]));
        let gray = LabelDecoding::VocPalette
            .decode(DynamicImage::ImageRgb8(rgb), Path::new("x.png"))
            .unwrap();
        assert_eq!(gray.as_raw(), &vec![0, 15]);
    }

    #[test]
    fn sub_byte_indices_are_unpacked() {
        // 2-bit, 3 pixels per row: [2, 0, 1] then [3, 3, 0].
        let buf = [0b10_00_01_00, 0b11_11_00_00];
        assert_eq!(unpack_indices(&buf, 1, 3, 2, 2), vec![2, 0, 1, 3, 3, 0]);
        // 1-bit, 9 pixels spill into a second byte.
        let buf = [0b1010_0000, 0b1000_0000];
        assert_eq!(
            unpack_indices(&buf, 2, 9, 1, 1),
            vec![1, 0, 1, 0, 0, 0, 0, 0, 1]
        );
    }

    #[test]
    fn sixteen_bit_labels_are_rejected() {
        let img = image::ImageBuffer::<image::Luma<u16>, _>::from_pixel(1, 1, image::Luma([300]));
        let err = LabelDecoding::Luma
            .decode(DynamicImage::ImageLuma16(img), Path::new("x.png"))
            .unwrap_err();
        assert!(matches!(err, SegDatasetError::Label { .. }));
    }

    #[test]
    fn luma_rejects_colour_pixels() {
        let rgb = image::RgbImage::from_pixel(1, 1, image::Rgb([1, 2, 3]));
        let err = LabelDecoding::Luma
            .decode(DynamicImage::ImageRgb8(rgb), Path::new("x.png"))
            .unwrap_err();
        assert!(matches!(err, SegDatasetError::Label { .. }));
    }
}
