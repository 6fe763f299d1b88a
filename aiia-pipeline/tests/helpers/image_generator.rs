//! Synthetic image fixtures
//!
//! Images are generated on the fly so tests need no binary fixtures.

use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};

/// Generated image characteristics
#[derive(Debug, Clone)]
pub struct ImageSpec {
    pub width: u32,
    pub height: u32,
    /// Checkerboard cell size in pixels; 0 renders a flat gradient
    pub checker: u32,
}

impl Default for ImageSpec {
    fn default() -> Self {
        Self {
            width: 96,
            height: 64,
            checker: 8,
        }
    }
}

/// Write an image to `path`; the format follows the extension
pub fn generate_test_image(path: &Path, spec: &ImageSpec) -> anyhow::Result<PathBuf> {
    let img = RgbImage::from_fn(spec.width, spec.height, |x, y| {
        if spec.checker == 0 {
            let v = ((x + y) * 255 / (spec.width + spec.height).max(1)) as u8;
            Rgb([v, v, v])
        } else if ((x / spec.checker) + (y / spec.checker)) % 2 == 0 {
            Rgb([240, 240, 240])
        } else {
            Rgb([20, 20, 20])
        }
    });
    img.save(path)?;
    Ok(path.to_path_buf())
}

/// `count` JPEGs named `img_00.jpg`, `img_01.jpg`, ...
pub fn generate_test_library(dir: &Path, count: usize) -> anyhow::Result<Vec<PathBuf>> {
    (0..count)
        .map(|i| {
            let spec = ImageSpec {
                checker: 2 + i as u32,
                ..Default::default()
            };
            generate_test_image(&dir.join(format!("img_{:02}.jpg", i)), &spec)
        })
        .collect()
}
