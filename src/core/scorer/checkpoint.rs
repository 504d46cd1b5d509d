//! JSON checkpoints for the built-in scorer.

use super::siamese::{SiameseConfig, SiameseWeights};
use crate::error::CheckpointError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Bumped when the on-disk layout changes
pub const FORMAT_VERSION: u32 = 2;

/// Conventional checkpoint file name for an image size
pub fn checkpoint_file_name(image_size: u32) -> String {
    format!("model_{}.json", image_size)
}

/// A saved model plus the training state it was saved at
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub format_version: u32,
    pub config: SiameseConfig,
    pub weights: SiameseWeights,
    /// 1-based epoch the weights come from
    pub epoch: usize,
    /// Mean training loss of that epoch
    pub loss: f64,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(config: SiameseConfig, weights: SiameseWeights, epoch: usize, loss: f64) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            config,
            weights,
            epoch,
            loss,
            saved_at: Utc::now(),
        }
    }

    /// Write to `path`, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        let write_error = |source| CheckpointError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_error)?;
        }

        let json = serde_json::to_vec_pretty(self).map_err(|e| CheckpointError::Corrupted {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        fs::write(path, json).map_err(write_error)
    }

    /// Read a checkpoint written by [`save`](Self::save)
    pub fn load(path: &Path) -> Result<Self, CheckpointError> {
        let bytes = fs::read(path).map_err(|source| CheckpointError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let checkpoint: Self =
            serde_json::from_slice(&bytes).map_err(|e| CheckpointError::Corrupted {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if checkpoint.format_version != FORMAT_VERSION {
            return Err(CheckpointError::Corrupted {
                path: path.to_path_buf(),
                reason: format!(
                    "format version {} is not supported (expected {})",
                    checkpoint.format_version, FORMAT_VERSION
                ),
            });
        }

        Ok(checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Checkpoint {
        let config = SiameseConfig {
            channels: 1,
            grid: 1,
            embedding_dim: 2,
            ..SiameseConfig::for_image_size(4)
        };
        let weights = SiameseWeights {
            conv: vec![0.01; 27],
            conv_bias: vec![0.0],
            embedding: vec![0.1, 0.2],
            embedding_bias: vec![0.0, 0.0],
            head: vec![-1.0, 1.0],
            head_bias: 0.5,
        };
        Checkpoint::new(config, weights, 7, 0.125)
    }

    #[test]
    fn file_name_follows_convention() {
        assert_eq!(checkpoint_file_name(128), "model_128.json");
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("models").join("model_4.json");

        sample().save(&path).unwrap();
        let loaded = Checkpoint::load(&path).unwrap();

        assert_eq!(loaded.epoch, 7);
        assert_eq!(loaded.weights.head_bias, 0.5);
        assert!(loaded.weights.fits(&loaded.config));
    }

    #[test]
    fn missing_file_is_read_error() {
        let result = Checkpoint::load(Path::new("/nonexistent/model_4.json"));
        assert!(matches!(result, Err(CheckpointError::Read { .. })));
    }

    #[test]
    fn garbage_is_reported_as_corrupted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model_4.json");
        fs::write(&path, b"{ not json").unwrap();

        assert!(matches!(
            Checkpoint::load(&path),
            Err(CheckpointError::Corrupted { .. })
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model_4.json");
        let mut checkpoint = sample();
        checkpoint.format_version = 99;
        checkpoint.save(&path).unwrap();

        assert!(matches!(
            Checkpoint::load(&path),
            Err(CheckpointError::Corrupted { .. })
        ));
    }
}
