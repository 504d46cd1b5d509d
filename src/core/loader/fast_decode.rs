//! Image decoding with a fast JPEG path.
//!
//! JPEG files go through zune-jpeg, everything else (and any JPEG zune
//! rejects) through the image crate.

use crate::error::LoadError;
use image::{DynamicImage, ImageBuffer, Luma, Rgb, Rgba};
use std::fs;
use std::path::Path;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_jpeg::JpegDecoder;

/// Read `path` and decode it into a `DynamicImage`.
pub fn decode(path: &Path) -> Result<DynamicImage, LoadError> {
    let bytes = fs::read(path).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    if bytes.is_empty() {
        return Err(LoadError::EmptyImage {
            path: path.to_path_buf(),
        });
    }

    let image = if is_jpeg(path) {
        match decode_jpeg(path, &bytes) {
            Ok(image) => image,
            Err(e) => {
                tracing::debug!("zune-jpeg failed on {}, falling back: {}", path.display(), e);
                decode_generic(path, &bytes)?
            }
        }
    } else {
        decode_generic(path, &bytes)?
    };

    if image.width() == 0 || image.height() == 0 {
        return Err(LoadError::EmptyImage {
            path: path.to_path_buf(),
        });
    }

    Ok(image)
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .is_some_and(|e| e == "jpg" || e == "jpeg")
}

fn decode_jpeg(path: &Path, bytes: &[u8]) -> Result<DynamicImage, LoadError> {
    let options = DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGB);
    let mut decoder = JpegDecoder::new_with_options(bytes, options);

    let pixels = decoder.decode().map_err(|e| LoadError::Decode {
        path: path.to_path_buf(),
        reason: format!("zune-jpeg decode failed: {:?}", e),
    })?;

    let info = decoder.info().ok_or_else(|| LoadError::Decode {
        path: path.to_path_buf(),
        reason: "missing JPEG header info".to_string(),
    })?;
    let (width, height) = (info.width as u32, info.height as u32);

    let buffer_error = || LoadError::Decode {
        path: path.to_path_buf(),
        reason: "decoded buffer does not match the image dimensions".to_string(),
    };

    let image = match decoder.get_output_colorspace().unwrap_or(ColorSpace::RGB) {
        ColorSpace::RGB => DynamicImage::ImageRgb8(
            ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, pixels).ok_or_else(buffer_error)?,
        ),
        ColorSpace::RGBA => DynamicImage::ImageRgba8(
            ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, pixels).ok_or_else(buffer_error)?,
        ),
        ColorSpace::Luma => DynamicImage::ImageLuma8(
            ImageBuffer::<Luma<u8>, _>::from_raw(width, height, pixels).ok_or_else(buffer_error)?,
        ),
        other => {
            return Err(LoadError::Decode {
                path: path.to_path_buf(),
                reason: format!("unsupported JPEG colorspace {:?}", other),
            })
        }
    };

    Ok(image)
}

fn decode_generic(path: &Path, bytes: &[u8]) -> Result<DynamicImage, LoadError> {
    image::load_from_memory(bytes).map_err(|e| LoadError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use tempfile::TempDir;

    #[test]
    fn jpeg_detection_is_case_insensitive() {
        assert!(is_jpeg(Path::new("face.jpg")));
        assert!(is_jpeg(Path::new("face.JPEG")));
        assert!(!is_jpeg(Path::new("face.png")));
    }

    #[test]
    fn decodes_png() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("face.png");
        RgbImage::from_pixel(5, 3, Rgb([10, 20, 30])).save(&path).unwrap();

        let image = decode(&path).unwrap();
        assert_eq!((image.width(), image.height()), (5, 3));
    }

    #[test]
    fn decodes_jpeg() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("face.jpg");
        RgbImage::from_pixel(8, 8, Rgb([200, 100, 50])).save(&path).unwrap();

        let image = decode(&path).unwrap();
        assert_eq!((image.width(), image.height()), (8, 8));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = decode(Path::new("/nonexistent/face.png"));
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }

    #[test]
    fn garbage_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("face.png");
        fs::write(&path, b"definitely not a png").unwrap();

        assert!(matches!(decode(&path), Err(LoadError::Decode { .. })));
    }

    #[test]
    fn empty_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("face.jpg");
        fs::write(&path, b"").unwrap();

        assert!(matches!(decode(&path), Err(LoadError::EmptyImage { .. })));
    }
}
