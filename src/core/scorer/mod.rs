//! # Scorer Module
//!
//! Trainable similarity scoring between two face images.
//!
//! ## Built-in Model
//! [`SiameseScorer`] is a small twin network built on candle: both images go
//! through the same embedding (3x3 convolution, average pooling, dense sigmoid
//! layer), the absolute difference of the two embeddings feeds a single
//! sigmoid unit.
//!
//! ## Training
//! - Binary cross-entropy on the same/different labels
//! - Adam, one update per batch (batch size 1 by default), gradients from
//!   candle autograd
//! - Pairs shuffled every epoch with a seeded RNG
//! - Learning rate `1e-5 * 10^(epoch / 20)` by default
//! - Best-loss checkpoint written as `model_<size>.json`
//!
//! ## Example
//! ```rust,ignore
//! let mut scorer = SiameseScorer::new(SiameseConfig::for_image_size(128))?;
//! let report = scorer.train(&dataset, &TrainingConfig::default(), &null_sender())?;
//! let score = scorer.score(&probe, &reference)?;
//! ```

pub mod checkpoint;
mod siamese;
mod traits;

pub use checkpoint::{checkpoint_file_name, Checkpoint};
pub use siamese::{SiameseConfig, SiameseScorer, SiameseWeights};
pub use traits::SimilarityScorer;

use crate::events::EpochProgress;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Learning rate as a function of the 0-based epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LearningRateSchedule {
    /// Same rate every epoch
    Constant(f64),
    /// `initial * 10^(epoch / epochs_per_decade)`
    Exponential {
        initial: f64,
        epochs_per_decade: f64,
    },
}

impl LearningRateSchedule {
    /// Rate for the given 0-based epoch
    pub fn rate(&self, epoch: usize) -> f64 {
        match *self {
            LearningRateSchedule::Constant(rate) => rate,
            LearningRateSchedule::Exponential {
                initial,
                epochs_per_decade,
            } => initial * 10f64.powf(epoch as f64 / epochs_per_decade),
        }
    }
}

impl Default for LearningRateSchedule {
    fn default() -> Self {
        LearningRateSchedule::Exponential {
            initial: 1e-5,
            epochs_per_decade: 20.0,
        }
    }
}

/// Training hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Passes over the pair dataset
    pub epochs: usize,
    /// Learning rate per epoch
    pub schedule: LearningRateSchedule,
    /// Pairs per optimizer step
    pub batch_size: usize,
    /// Visit pairs in a fresh random order every epoch
    pub shuffle: bool,
    /// Where to write the best checkpoint (None = don't save)
    pub checkpoint_path: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 60,
            schedule: LearningRateSchedule::default(),
            batch_size: 1,
            shuffle: true,
            checkpoint_path: None,
        }
    }
}

/// Outcome of a training run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Per-epoch loss and learning rate
    pub history: Vec<EpochProgress>,
    /// Pairs visited per epoch
    pub pairs_per_epoch: usize,
    /// Lowest mean epoch loss
    pub best_loss: f64,
    /// 1-based epoch that reached `best_loss`
    pub best_epoch: usize,
    /// Last checkpoint written, if any
    pub checkpoint: Option<PathBuf>,
}

impl TrainingReport {
    /// Mean loss of the last epoch
    pub fn final_loss(&self) -> Option<f64> {
        self.history.last().map(|epoch| epoch.loss)
    }
}
