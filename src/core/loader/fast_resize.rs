//! SIMD-accelerated RGB resizing.
//!
//! Faces are stretched to a square without cropping, so the aspect ratio
//! of the source is not preserved.

use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, RgbImage};

/// Reusable resizer producing square RGB8 images
pub struct FastResizer {
    resizer: Resizer,
    options: ResizeOptions,
}

impl FastResizer {
    /// Create a resizer using Catmull-Rom (bicubic) interpolation
    pub fn new() -> Self {
        Self {
            resizer: Resizer::new(),
            options: ResizeOptions::new()
                .resize_alg(ResizeAlg::Convolution(FilterType::CatmullRom)),
        }
    }

    /// Convert to RGB8 and resize to `size x size`.
    ///
    /// Errors are returned as plain strings; the caller attaches the path.
    pub fn resize_square(&mut self, image: &DynamicImage, size: u32) -> Result<RgbImage, String> {
        let rgb = image.to_rgb8();
        let (src_width, src_height) = rgb.dimensions();

        if src_width == 0 || src_height == 0 {
            return Err("source image has no pixels".to_string());
        }
        if size == 0 {
            return Err("target size must be at least 1".to_string());
        }

        let src_image = Image::from_vec_u8(src_width, src_height, rgb.into_raw(), PixelType::U8x3)
            .map_err(|e| format!("failed to wrap source buffer: {}", e))?;
        let mut dst_image = Image::new(size, size, PixelType::U8x3);

        self.resizer
            .resize(&src_image, &mut dst_image, &self.options)
            .map_err(|e| format!("resize failed: {}", e))?;

        RgbImage::from_raw(size, size, dst_image.into_vec())
            .ok_or_else(|| "resized buffer has the wrong length".to_string())
    }
}

impl Default for FastResizer {
    fn default() -> Self {
        Self::new()
    }
}
