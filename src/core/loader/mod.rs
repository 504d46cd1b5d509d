//! # Loader Module
//!
//! Turns image files into fixed-size, normalized pixel vectors.
//!
//! ## Steps
//! 1. Decode the file (zune-jpeg for JPEG, image crate otherwise)
//! 2. Stretch to `size x size` RGB (no cropping)
//! 3. Divide every channel by 255
//! 4. Lay the pixels out as a flat `3 * size * size` vector
//!
//! ## Example
//! ```rust,ignore
//! use face_verification::core::loader::{ImageLoader, LoaderConfig};
//!
//! let loader = ImageLoader::new(LoaderConfig::with_size(128))?;
//! let faces = loader.load_all(Path::new("test_images"))?;
//! ```

pub mod fast_decode;
pub mod fast_resize;
mod filter;
mod listing;

pub use fast_resize::FastResizer;
pub use filter::ImageFilter;
pub use listing::{list_all_entries, list_entries, EntryKind};

use crate::error::{LoadError, MatchError};
use crate::events::{Event, EventSender, LoadEvent};
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Memory layout of the two spatial axes in a [`FaceImage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AxisOrder {
    /// Column-major: `x` varies slowest. Rows and columns are swapped
    /// relative to the decoded raster, matching the layout the scorer
    /// was trained against.
    #[default]
    Transposed,
    /// Row-major: `y` varies slowest, the natural raster order.
    RowMajor,
}

impl AxisOrder {
    /// Offset of channel 0 of pixel `(x, y)` in a square image of `size`
    pub fn offset(self, x: u32, y: u32, size: u32) -> usize {
        let (outer, inner) = match self {
            AxisOrder::Transposed => (x, y),
            AxisOrder::RowMajor => (y, x),
        };
        (outer as usize * size as usize + inner as usize) * 3
    }
}

/// A loaded, normalized face image
#[derive(Debug, Clone, PartialEq)]
pub struct FaceImage {
    path: PathBuf,
    size: u32,
    axis_order: AxisOrder,
    pixels: Vec<f32>,
}

impl FaceImage {
    /// Build an image from raw normalized values.
    ///
    /// Returns `None` when `pixels` is not `3 * size * size` long.
    pub fn from_pixels(
        path: impl Into<PathBuf>,
        size: u32,
        axis_order: AxisOrder,
        pixels: Vec<f32>,
    ) -> Option<Self> {
        if pixels.len() != 3 * size as usize * size as usize {
            return None;
        }
        Some(Self {
            path: path.into(),
            size,
            axis_order,
            pixels,
        })
    }

    /// Source file of this image
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Side length in pixels
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Layout of the flat pixel vector
    pub fn axis_order(&self) -> AxisOrder {
        self.axis_order
    }

    /// The flat, normalized pixel vector
    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    /// Normalized RGB of pixel `(x, y)` in source orientation
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 3] {
        let offset = self.axis_order.offset(x, y, self.size);
        [
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
        ]
    }

    /// Render back to an upright 8-bit image, whatever the layout.
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.size, self.size, |x, y| {
            let [r, g, b] = self.pixel(x, y);
            Rgb([to_byte(r), to_byte(g), to_byte(b)])
        })
    }
}

fn to_byte(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Loader settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Side length every image is resized to
    pub size: u32,
    /// Output pixel layout
    pub axis_order: AxisOrder,
    /// Load files whose names start with '.'
    pub include_hidden: bool,
}

impl LoaderConfig {
    /// Defaults with a custom image size
    pub fn with_size(size: u32) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            size: 128,
            axis_order: AxisOrder::Transposed,
            include_hidden: false,
        }
    }
}

/// Reads and normalizes face images
#[derive(Debug, Clone)]
pub struct ImageLoader {
    config: LoaderConfig,
    filter: ImageFilter,
}

impl ImageLoader {
    /// Create a loader, rejecting a zero image size
    pub fn new(config: LoaderConfig) -> Result<Self, MatchError> {
        if config.size == 0 {
            return Err(MatchError::InvalidImageSize { size: config.size });
        }
        Ok(Self {
            config,
            filter: ImageFilter::new().with_hidden(config.include_hidden),
        })
    }

    /// The active configuration
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// The filter deciding which entries are images
    pub fn filter(&self) -> &ImageFilter {
        &self.filter
    }

    /// Load a single image. Every call re-reads the file.
    pub fn load(&self, path: &Path) -> Result<FaceImage, LoadError> {
        let decoded = fast_decode::decode(path)?;

        let mut resizer = FastResizer::new();
        let resized = resizer
            .resize_square(&decoded, self.config.size)
            .map_err(|reason| LoadError::Resize {
                path: path.to_path_buf(),
                reason,
            })?;

        Ok(self.normalize(path, &resized))
    }

    /// Load every image directly inside `dir`, sorted by file name.
    pub fn load_all(&self, dir: &Path) -> Result<Vec<FaceImage>, LoadError> {
        self.load_all_with_events(dir, &crate::events::null_sender())
    }

    /// [`load_all`](Self::load_all) with progress reporting
    pub fn load_all_with_events(
        &self,
        dir: &Path,
        events: &EventSender,
    ) -> Result<Vec<FaceImage>, LoadError> {
        let files = list_all_entries(dir, EntryKind::File)?;
        let mut images = Vec::with_capacity(files.len());

        for path in files {
            if !self.filter.should_include(&path) {
                tracing::debug!("Skipping {}", path.display());
                events.send(Event::Load(LoadEvent::Skipped { path }));
                continue;
            }

            let image = self.load(&path)?;
            events.send(Event::Load(LoadEvent::ImageLoaded { path }));
            images.push(image);
        }

        tracing::debug!("Loaded {} images from {}", images.len(), dir.display());
        Ok(images)
    }

    fn normalize(&self, path: &Path, resized: &RgbImage) -> FaceImage {
        let size = self.config.size;
        let mut pixels = vec![0.0f32; 3 * size as usize * size as usize];

        for (x, y, pixel) in resized.enumerate_pixels() {
            let offset = self.config.axis_order.offset(x, y, size);
            for (c, value) in pixel.0.iter().enumerate() {
                pixels[offset + c] = *value as f32 / 255.0;
            }
        }

        FaceImage {
            path: path.to_path_buf(),
            size,
            axis_order: self.config.axis_order,
            pixels,
        }
    }
}

/// Load one image with default settings at the given size
pub fn load(path: &Path, size: u32) -> crate::Result<FaceImage> {
    let loader = ImageLoader::new(LoaderConfig::with_size(size))?;
    Ok(loader.load(path)?)
}

/// Load a whole directory with default settings at the given size
pub fn load_all(dir: &Path, size: u32) -> crate::Result<Vec<FaceImage>> {
    let loader = ImageLoader::new(LoaderConfig::with_size(size))?;
    Ok(loader.load_all(dir)?)
}
