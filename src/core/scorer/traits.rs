//! The trainable similarity function the dataset and matcher are built on.

use super::{TrainingConfig, TrainingReport};
use crate::core::dataset::PairDataset;
use crate::core::loader::FaceImage;
use crate::error::{MatchError, VerifierError};
use crate::events::EventSender;

/// A trainable function scoring how likely two images show the same person.
///
/// Implement this trait to plug in a different model (or a fixed stub in
/// tests). The dataset builder and gallery matcher only ever go through it.
pub trait SimilarityScorer: Send + Sync {
    /// Fit the scorer to the dataset's pairs, minimizing binary
    /// cross-entropy against the same/different labels.
    fn train(
        &mut self,
        dataset: &PairDataset,
        config: &TrainingConfig,
        events: &EventSender,
    ) -> Result<TrainingReport, VerifierError>;

    /// Probability in `[0, 1]` that `first` and `second` show the same identity
    fn score(&self, first: &FaceImage, second: &FaceImage) -> Result<f32, MatchError>;

    /// Short human-readable name for logs and reports
    fn name(&self) -> &'static str;
}
