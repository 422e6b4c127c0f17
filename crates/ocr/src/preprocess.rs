use image::{DynamicImage, GrayImage};
use std::io::Cursor;
use thiserror::Error;

use crate::binarize::{binarize, BinarizeOptions, Binarized};

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Decode raw image bytes (JPEG / PNG / TIFF / …) into 8-bit grayscale.
///
/// When `max_dimension` is set, larger pages are scaled down to fit it first.
pub fn decode_grayscale(data: &[u8], max_dimension: Option<u32>) -> Result<GrayImage, PreprocessError> {
    let img = image::load_from_memory(data)?;
    Ok(to_grayscale(img, max_dimension))
}

/// Decode, then binarize with the page's own histogram.
pub fn prepare_for_ocr(
    data: &[u8],
    max_dimension: Option<u32>,
    options: &BinarizeOptions,
) -> Result<Binarized, PreprocessError> {
    let gray = decode_grayscale(data, max_dimension)?;
    Ok(binarize(&gray, options))
}

fn to_grayscale(img: DynamicImage, max_dimension: Option<u32>) -> GrayImage {
    let img = match max_dimension {
        Some(max) if img.width() > max || img.height() > max => {
            img.resize(max, max, image::imageops::FilterType::Lanczos3)
        }
        _ => img,
    };
    img.to_luma8()
}

/// PNG-encode a grayscale image, for engines that take encoded bytes.
pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
