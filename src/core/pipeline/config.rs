//! Run configuration passed explicitly into every stage.

use crate::core::dataset::PairSampling;
use crate::core::loader::LoaderConfig;
use crate::core::matcher::GalleryMode;
use crate::core::scorer::{checkpoint_file_name, SiameseConfig, TrainingConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything one verification run needs to know
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// `<identity>/<image>` training layout
    pub training_dir: PathBuf,
    /// Flat directory of probe images
    pub test_dir: PathBuf,
    /// Image size and layout
    pub loader: LoaderConfig,
    /// Epochs and learning rate
    pub training: TrainingConfig,
    /// Shape of the built-in scorer
    pub model: SiameseConfig,
    /// Display names per identity (None = directory names)
    pub names: Option<Vec<String>>,
    /// Which pairs to train on
    pub sampling: PairSampling,
    /// Which training images to match against
    pub gallery_mode: GalleryMode,
    /// Directory receiving `model_<size>.json` (None = don't save)
    pub checkpoint_dir: Option<PathBuf>,
    /// Directory receiving probe previews (None = don't render)
    pub preview_dir: Option<PathBuf>,
}

impl VerifierConfig {
    /// Where the best checkpoint goes, if saving is enabled
    pub fn checkpoint_path(&self) -> Option<PathBuf> {
        self.checkpoint_dir
            .as_ref()
            .map(|dir| dir.join(checkpoint_file_name(self.loader.size)))
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        let loader = LoaderConfig::default();
        Self {
            training_dir: PathBuf::from("people"),
            test_dir: PathBuf::from("test_images"),
            model: SiameseConfig::for_image_size(loader.size),
            loader,
            training: TrainingConfig::default(),
            names: None,
            sampling: PairSampling::Full,
            gallery_mode: GalleryMode::AllImages,
            checkpoint_dir: None,
            preview_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_constants() {
        let config = VerifierConfig::default();
        assert_eq!(config.loader.size, 128);
        assert_eq!(config.training.epochs, 60);
        assert_eq!(config.training_dir, PathBuf::from("people"));
        assert_eq!(config.model.image_size, config.loader.size);
    }

    #[test]
    fn checkpoint_path_uses_image_size() {
        let config = VerifierConfig {
            checkpoint_dir: Some(PathBuf::from("models")),
            ..VerifierConfig::default()
        };
        assert_eq!(
            config.checkpoint_path(),
            Some(PathBuf::from("models/model_128.json"))
        );
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = VerifierConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: VerifierConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, config);
    }
}
