//! # Core Module
//!
//! The verification engine, independent of any front end.
//!
//! ## Modules
//! - `loader` - Decodes, resizes and normalizes face images
//! - `dataset` - Builds labeled image pairs from identity directories
//! - `scorer` - Trainable pairwise similarity scoring
//! - `matcher` - Identifies probes against a named gallery
//! - `pipeline` - Orchestrates the full workflow

pub mod dataset;
pub mod loader;
pub mod matcher;
pub mod pipeline;
pub mod scorer;

// Re-export commonly used types
pub use dataset::{build_pairs, Identity, PairDataset, PairSampling};
pub use loader::{AxisOrder, FaceImage, ImageLoader, LoaderConfig};
pub use matcher::{match_probe, Gallery, GalleryMode, MatchResult};
pub use scorer::{SiameseScorer, SimilarityScorer, TrainingConfig, TrainingReport};
