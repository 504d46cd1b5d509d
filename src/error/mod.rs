//! # Error Module
//!
//! Error types for the face verification tool.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, file names, what went wrong
//! - **Fail fast** - every error aborts the run, nothing is retried

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum VerifierError {
    #[error("Loading error: {0}")]
    Load(#[from] LoadError),

    #[error("Matching error: {0}")]
    Match(#[from] MatchError),

    #[error("Training error: {0}")]
    Train(#[from] TrainError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors that occur while reading images from disk
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open image file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Image is empty or corrupted: {path}")]
    EmptyImage { path: PathBuf },

    #[error("Failed to resize image {path}: {reason}")]
    Resize { path: PathBuf, reason: String },
}

/// Invalid arguments to the dataset builder or gallery matcher
#[derive(Error, Debug, PartialEq)]
pub enum MatchError {
    #[error("Gallery is empty, nothing to match against")]
    EmptyGallery,

    #[error("Got {names} names for {identities} identities")]
    NameCountMismatch { names: usize, identities: usize },

    #[error("Invalid image size: {size} (must be at least 1)")]
    InvalidImageSize { size: u32 },

    #[error("Probe has {actual} values but the gallery expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Scoring failed: {0}")]
    Tensor(String),
}

/// Errors raised while fitting a scorer
#[derive(Error, Debug, PartialEq)]
pub enum TrainError {
    #[error("No pairs to train on")]
    EmptyDataset,

    #[error("Scorer expects {expected}x{expected} images, got {actual}x{actual}")]
    SizeMismatch { expected: u32, actual: u32 },

    #[error("Invalid training parameter: {0}")]
    InvalidParameter(String),

    #[error("Tensor operation failed: {0}")]
    Tensor(String),
}

/// Errors reading or writing model checkpoints
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Failed to write checkpoint {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read checkpoint {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint {path} is corrupted: {reason}. Delete it and retrain.")]
    Corrupted { path: PathBuf, reason: String },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, VerifierError>;
