//! # Pipeline Module
//!
//! Orchestrates the full verification workflow.
//!
//! ## Pipeline Stages
//! 1. **Load** - Read `<identity>/<image>` training directories into pairs
//! 2. **Train** - Fit the scorer on the pairs (or restore a checkpoint)
//! 3. **Match** - Identify every probe image against the gallery
//!
//! ## Parallelism
//! Stages run in order. The built-in scorer uses rayon to extract image
//! features before training.

mod config;
mod executor;

pub use config::VerifierConfig;
pub use executor::{Pipeline, PipelineBuilder, PipelineResult};
