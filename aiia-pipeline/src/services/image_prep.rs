//! Image preparation for vision backends
//!
//! Decodes, flattens to RGB, downsizes so the longest edge fits a bound
//! (aspect preserved, Lanczos3) and re-encodes as JPEG.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrepError {
    #[error("Image file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Cannot decode {0}: {1}")]
    Decode(PathBuf, String),

    #[error("JPEG encoding failed: {0}")]
    Encode(String),

    #[error("Preparation task failed: {0}")]
    Task(String),
}

/// JPEG payload ready to send to a backend
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub jpeg_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub original_width: u32,
    pub original_height: u32,
}

impl PreparedImage {
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.jpeg_bytes)
    }

    pub fn mime_type(&self) -> &'static str {
        "image/jpeg"
    }

    pub fn original_short_side(&self) -> u32 {
        self.original_width.min(self.original_height)
    }
}

/// Target size fitting `(width, height)` within `max_dimension`
///
/// Images already within the bound are left at their size.
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension || longest == 0 {
        return (width, height);
    }
    let scale = max_dimension as f64 / longest as f64;
    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);
    (w, h)
}

/// Decode, resize and encode one image off the async runtime
pub async fn prepare_for_analysis(
    path: &Path,
    max_dimension: u32,
    jpeg_quality: u8,
) -> Result<PreparedImage, PrepError> {
    if !path.is_file() {
        return Err(PrepError::FileNotFound(path.to_path_buf()));
    }

    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || prepare_blocking(&path, max_dimension, jpeg_quality))
        .await
        .map_err(|e| PrepError::Task(e.to_string()))?
}

fn prepare_blocking(
    path: &Path,
    max_dimension: u32,
    jpeg_quality: u8,
) -> Result<PreparedImage, PrepError> {
    let img = image::open(path).map_err(|e| PrepError::Decode(path.to_path_buf(), e.to_string()))?;
    let (original_width, original_height) = (img.width(), img.height());
    let (width, height) = fit_within(original_width, original_height, max_dimension);

    let resized = if (width, height) != (original_width, original_height) {
        img.resize_exact(width, height, FilterType::Lanczos3)
    } else {
        img
    };

    // Drops alpha and widens 16-bit TIFFs
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

    let mut jpeg_bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg_bytes, jpeg_quality)
        .encode_image(&rgb)
        .map_err(|e| PrepError::Encode(e.to_string()))?;

    tracing::trace!(
        file = %path.display(),
        original_width,
        original_height,
        width,
        height,
        bytes = jpeg_bytes.len(),
        "Prepared image for analysis"
    );

    Ok(PreparedImage {
        jpeg_bytes,
        width,
        height,
        original_width,
        original_height,
    })
}
