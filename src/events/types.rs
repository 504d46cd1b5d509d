//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the verification pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Image loading events
    Load(LoadEvent),
    /// Pair dataset construction events
    Dataset(DatasetEvent),
    /// Scorer training events
    Train(TrainEvent),
    /// Gallery matching events
    Match(MatchEvent),
    /// Pipeline-level events
    Pipeline(PipelineEvent),
}

/// Events while images are read from disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoadEvent {
    /// Started loading an identity directory
    IdentityStarted { label: usize, name: String },
    /// A single image was loaded
    ImageLoaded { path: PathBuf },
    /// A file in an image directory was skipped (hidden or not an image)
    Skipped { path: PathBuf },
}

/// Events while building the pairwise dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DatasetEvent {
    /// The dataset is ready
    Built {
        identities: usize,
        images: usize,
        pairs: usize,
        positive_pairs: usize,
    },
}

/// Events during scorer training
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainEvent {
    /// Training has started
    Started { epochs: usize, pairs: usize },
    /// An epoch finished
    EpochCompleted(EpochProgress),
    /// A new best checkpoint was written
    CheckpointSaved { path: PathBuf, loss: f64 },
    /// Training completed
    Completed { final_loss: f64, best_loss: f64 },
}

/// Progress information after each epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochProgress {
    /// 1-based epoch number
    pub epoch: usize,
    /// Total epochs requested
    pub total_epochs: usize,
    /// Mean binary cross-entropy over the epoch
    pub loss: f64,
    /// Learning rate used during the epoch
    pub learning_rate: f64,
}

/// Events while matching probes against the gallery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MatchEvent {
    /// Matching has started
    Started { probes: usize, gallery_size: usize },
    /// A probe preview was rendered
    PreviewWritten { index: usize, path: PathBuf },
    /// A probe was matched
    ProbeMatched {
        index: usize,
        name: String,
        confidence: f32,
    },
    /// Matching completed
    Completed { total_matched: usize },
}

/// Pipeline-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// Pipeline has started
    Started,
    /// Moving to a new phase
    PhaseChanged { phase: PipelinePhase },
    /// Pipeline completed successfully
    Completed { summary: PipelineSummary },
    /// Pipeline encountered a fatal error
    Error { message: String },
}

/// Phases of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    Loading,
    Training,
    Matching,
}

/// Summary of pipeline results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Number of identities discovered
    pub identities: usize,
    /// Number of training images
    pub training_images: usize,
    /// Number of pairs trained on
    pub pairs: usize,
    /// Number of probes matched
    pub probes: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelinePhase::Loading => write!(f, "Loading"),
            PipelinePhase::Training => write!(f, "Training"),
            PipelinePhase::Matching => write!(f, "Matching"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::Train(TrainEvent::EpochCompleted(EpochProgress {
            epoch: 3,
            total_epochs: 60,
            loss: 0.25,
            learning_rate: 1e-5,
        }));

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Train(TrainEvent::EpochCompleted(p)) => {
                assert_eq!(p.epoch, 3);
                assert_eq!(p.total_epochs, 60);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn phase_display() {
        assert_eq!(PipelinePhase::Training.to_string(), "Training");
    }
}
