//! Pipeline execution implementation.

use super::VerifierConfig;
use crate::core::dataset::{build_pairs_with_events, Identity, PairDataset, PairSampling};
use crate::core::loader::{AxisOrder, ImageLoader};
use crate::core::matcher::{identify_all, Gallery, GalleryMode, MatchResult};
use crate::core::scorer::{
    LearningRateSchedule, SiameseConfig, SiameseScorer, SimilarityScorer, TrainingReport,
};
use crate::error::VerifierError;
use crate::events::{
    null_sender, Event, EventSender, PipelineEvent, PipelinePhase, PipelineSummary,
};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Result of pipeline execution
#[derive(Debug)]
pub struct PipelineResult {
    /// Identities discovered in the training directory
    pub identities: Vec<Identity>,
    /// Number of training images
    pub training_images: usize,
    /// Pairs per training epoch
    pub pairs: usize,
    /// Pairs labeled "same identity"
    pub positive_pairs: usize,
    /// Training outcome (None when only identifying)
    pub training: Option<TrainingReport>,
    /// One result per probe image, in probe order
    pub matches: Vec<MatchResult>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

/// Builder for pipeline configuration
pub struct PipelineBuilder {
    config: VerifierConfig,
    scorer: Option<Box<dyn SimilarityScorer>>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            config: VerifierConfig::default(),
            scorer: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: VerifierConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the `<identity>/<image>` training directory
    pub fn training_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.training_dir = path.into();
        self
    }

    /// Set the flat probe directory
    pub fn test_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.test_dir = path.into();
        self
    }

    /// Set the side length images are resized to
    pub fn image_size(mut self, size: u32) -> Self {
        self.config.loader.size = size;
        self.config.model.image_size = size;
        self
    }

    /// Set the pixel layout
    pub fn axis_order(mut self, axis_order: AxisOrder) -> Self {
        self.config.loader.axis_order = axis_order;
        self
    }

    /// Set the number of training epochs
    pub fn epochs(mut self, epochs: usize) -> Self {
        self.config.training.epochs = epochs;
        self
    }

    /// Set the number of pairs per optimizer step
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.training.batch_size = batch_size;
        self
    }

    /// Set the learning rate schedule
    pub fn schedule(mut self, schedule: LearningRateSchedule) -> Self {
        self.config.training.schedule = schedule;
        self
    }

    /// Override identity display names
    pub fn names(mut self, names: Vec<String>) -> Self {
        self.config.names = Some(names);
        self
    }

    /// Set the pair sampling strategy
    pub fn sampling(mut self, sampling: PairSampling) -> Self {
        self.config.sampling = sampling;
        self
    }

    /// Set which training images form the gallery
    pub fn gallery_mode(mut self, mode: GalleryMode) -> Self {
        self.config.gallery_mode = mode;
        self
    }

    /// Save the best checkpoint into this directory
    pub fn checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.checkpoint_dir = Some(dir.into());
        self
    }

    /// Render probe previews into this directory
    pub fn preview_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.preview_dir = Some(dir.into());
        self
    }

    /// Use a custom scorer instead of the built-in siamese model
    pub fn scorer(mut self, scorer: Box<dyn SimilarityScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Pipeline {
        Pipeline {
            config: self.config,
            scorer: self.scorer,
        }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Load -> pair -> train -> match
pub struct Pipeline {
    config: VerifierConfig,
    scorer: Option<Box<dyn SimilarityScorer>>,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// The scorer, once one was supplied, trained or restored
    pub fn scorer(&self) -> Option<&dyn SimilarityScorer> {
        self.scorer.as_deref()
    }

    fn loader(&self) -> Result<ImageLoader, VerifierError> {
        Ok(ImageLoader::new(self.config.loader)?)
    }

    /// Load the training directory into a pair dataset
    pub fn load_dataset(&self, events: &EventSender) -> Result<PairDataset, VerifierError> {
        let loader = self.loader()?;
        let dataset = build_pairs_with_events(&self.config.training_dir, &loader, events)?
            .with_sampling(self.config.sampling);

        tracing::info!(
            "Loaded {} images across {} identities from {} ({} pairs, {} positive)",
            dataset.len(),
            dataset.identities().len(),
            self.config.training_dir.display(),
            dataset.pair_count(),
            dataset.positive_pair_count()
        );

        Ok(dataset)
    }

    /// Train the scorer (creating the built-in one if none was supplied)
    pub fn train(
        &mut self,
        dataset: &PairDataset,
        events: &EventSender,
    ) -> Result<TrainingReport, VerifierError> {
        let mut training = self.config.training.clone();
        training.checkpoint_path = self.config.checkpoint_path();

        let scorer = match self.scorer.take() {
            Some(scorer) => scorer,
            None => {
                let model = SiameseConfig {
                    image_size: self.config.loader.size,
                    ..self.config.model
                };
                Box::new(SiameseScorer::new(model)?)
            }
        };
        let scorer = self.scorer.insert(scorer);

        scorer.train(dataset, &training, events)
    }

    /// Run the full workflow without events
    pub fn run(&mut self) -> Result<PipelineResult, VerifierError> {
        self.run_with_events(&null_sender())
    }

    /// Run the full workflow with event reporting
    pub fn run_with_events(
        &mut self,
        events: &EventSender,
    ) -> Result<PipelineResult, VerifierError> {
        let start_time = Instant::now();
        events.send(Event::Pipeline(PipelineEvent::Started));

        let outcome = self.run_phases(events, None);
        self.finish(outcome, start_time, events)
    }

    /// Identify probes with a scorer restored from `checkpoint`, skipping training
    pub fn identify_with_events(
        &mut self,
        checkpoint: &Path,
        events: &EventSender,
    ) -> Result<PipelineResult, VerifierError> {
        let start_time = Instant::now();
        events.send(Event::Pipeline(PipelineEvent::Started));

        let outcome = self.run_phases(events, Some(checkpoint));
        self.finish(outcome, start_time, events)
    }

    fn run_phases(
        &mut self,
        events: &EventSender,
        checkpoint: Option<&Path>,
    ) -> Result<PipelineResult, VerifierError> {
        // Phase 1: Loading
        events.phase(PipelinePhase::Loading);
        let dataset = self.load_dataset(events)?;

        // Phase 2: Training (or restoring)
        events.phase(PipelinePhase::Training);
        let training = match checkpoint {
            Some(path) => {
                let scorer = SiameseScorer::from_checkpoint(path)?;
                if scorer.config().image_size != self.config.loader.size {
                    return Err(VerifierError::Config(format!(
                        "checkpoint {} was trained on {}px images but the loader is set to {}px",
                        path.display(),
                        scorer.config().image_size,
                        self.config.loader.size
                    )));
                }
                self.scorer = Some(Box::new(scorer));
                None
            }
            None => Some(self.train(&dataset, events)?),
        };

        // Phase 3: Matching
        events.phase(PipelinePhase::Matching);
        let gallery = Gallery::from_dataset(
            &dataset,
            self.config.names.as_deref(),
            self.config.gallery_mode,
        )?;
        let probes = self
            .loader()?
            .load_all_with_events(&self.config.test_dir, events)?;
        tracing::info!(
            "Matching {} probes against {} gallery images",
            probes.len(),
            gallery.len()
        );

        let scorer = self
            .scorer
            .as_deref()
            .ok_or_else(|| VerifierError::Config("no scorer available".to_string()))?;
        let matches = identify_all(
            scorer,
            &probes,
            &gallery,
            self.config.preview_dir.as_deref(),
            events,
        )?;

        Ok(PipelineResult {
            identities: dataset.identities().to_vec(),
            training_images: dataset.len(),
            pairs: dataset.pair_count(),
            positive_pairs: dataset.positive_pair_count(),
            training,
            matches,
            duration_ms: 0,
        })
    }

    fn finish(
        &self,
        outcome: Result<PipelineResult, VerifierError>,
        start_time: Instant,
        events: &EventSender,
    ) -> Result<PipelineResult, VerifierError> {
        let mut result = match outcome {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Pipeline failed: {}", e);
                events.send(Event::Pipeline(PipelineEvent::Error {
                    message: e.to_string(),
                }));
                return Err(e);
            }
        };

        result.duration_ms = start_time.elapsed().as_millis() as u64;
        events.send(Event::Pipeline(PipelineEvent::Completed {
            summary: PipelineSummary {
                identities: result.identities.len(),
                training_images: result.training_images,
                pairs: result.pairs,
                probes: result.matches.len(),
                duration_ms: result.duration_ms,
            },
        }));

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dataset::PairDataset;
    use crate::core::loader::FaceImage;
    use crate::core::scorer::TrainingConfig;
    use crate::error::{LoadError, MatchError, TrainError};
    use crate::events::EventChannel;
    use image::{Rgb, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    fn write_face(path: &Path, color: [u8; 3]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(6, 6, Rgb(color)).save(path).unwrap();
    }

    /// people/Angelina (2 reddish), people/Brad (1 bluish), test_images (1 each)
    fn fixture() -> TempDir {
        let root = TempDir::new().unwrap();
        let people = root.path().join("people");
        write_face(&people.join("Angelina").join("1.png"), [220, 30, 30]);
        write_face(&people.join("Angelina").join("2.png"), [200, 40, 30]);
        write_face(&people.join("Brad").join("1.png"), [30, 30, 220]);
        write_face(&root.path().join("test_images").join("a.png"), [210, 35, 30]);
        write_face(&root.path().join("test_images").join("b.png"), [35, 30, 210]);
        root
    }

    /// Prefers gallery images whose mean red channel is close to the probe's
    struct RednessScorer;

    impl SimilarityScorer for RednessScorer {
        fn train(
            &mut self,
            dataset: &PairDataset,
            _config: &TrainingConfig,
            _events: &EventSender,
        ) -> Result<TrainingReport, VerifierError> {
            Ok(TrainingReport {
                pairs_per_epoch: dataset.pair_count(),
                ..TrainingReport::default()
            })
        }

        fn score(&self, first: &FaceImage, second: &FaceImage) -> Result<f32, MatchError> {
            let red = |image: &FaceImage| {
                image.pixels().iter().step_by(3).sum::<f32>() / (image.pixels().len() / 3) as f32
            };
            Ok(1.0 - (red(first) - red(second)).abs())
        }

        fn name(&self) -> &'static str {
            "redness"
        }
    }

    fn pipeline(root: &TempDir) -> PipelineBuilder {
        Pipeline::builder()
            .training_dir(root.path().join("people"))
            .test_dir(root.path().join("test_images"))
            .image_size(4)
    }

    #[test]
    fn pipeline_builder_sets_config() {
        let pipeline = Pipeline::builder()
            .image_size(64)
            .epochs(3)
            .batch_size(4)
            .build();
        assert_eq!(pipeline.config().loader.size, 64);
        assert_eq!(pipeline.config().model.image_size, 64);
        assert_eq!(pipeline.config().training.epochs, 3);
        assert_eq!(pipeline.config().training.batch_size, 4);
    }

    #[test]
    fn run_identifies_probes_with_custom_scorer() {
        let root = fixture();
        let mut pipeline = pipeline(&root)
            .scorer(Box::new(RednessScorer))
            .build();

        let result = pipeline.run().unwrap();

        assert_eq!(result.identities.len(), 2);
        assert_eq!(result.training_images, 3);
        assert_eq!(result.pairs, 9);
        assert_eq!(result.positive_pairs, 5);
        assert_eq!(result.matches.len(), 2);
        assert_eq!(result.matches[0].name, "Angelina");
        assert_eq!(result.matches[1].name, "Brad");
        assert_eq!(result.training.unwrap().pairs_per_epoch, 9);
    }

    #[test]
    fn run_with_builtin_scorer_writes_checkpoint() {
        let root = fixture();
        let models = root.path().join("models");
        let mut pipeline = pipeline(&root)
            .epochs(3)
            .schedule(LearningRateSchedule::Constant(0.01))
            .checkpoint_dir(&models)
            .build();

        let result = pipeline.run().unwrap();

        assert_eq!(result.matches.len(), 2);
        assert!(models.join("model_4.json").exists());
        assert_eq!(result.training.unwrap().history.len(), 3);
    }

    #[test]
    fn identify_restores_checkpoint() {
        let root = fixture();
        let models = root.path().join("models");
        pipeline(&root)
            .epochs(2)
            .checkpoint_dir(&models)
            .build()
            .run()
            .unwrap();

        let mut identify = pipeline(&root).build();
        let result = identify
            .identify_with_events(&models.join("model_4.json"), &null_sender())
            .unwrap();

        assert!(result.training.is_none());
        assert_eq!(result.matches.len(), 2);
    }

    #[test]
    fn identify_rejects_size_mismatch() {
        let root = fixture();
        let models = root.path().join("models");
        pipeline(&root)
            .epochs(1)
            .checkpoint_dir(&models)
            .build()
            .run()
            .unwrap();

        let mut identify = pipeline(&root).image_size(8).build();
        let result = identify.identify_with_events(&models.join("model_4.json"), &null_sender());
        assert!(matches!(result, Err(VerifierError::Config(_))));
    }

    #[test]
    fn name_count_mismatch_is_fatal() {
        let root = fixture();
        let mut pipeline = pipeline(&root)
            .names(vec!["Only".to_string()])
            .scorer(Box::new(RednessScorer))
            .build();

        assert!(matches!(
            pipeline.run(),
            Err(VerifierError::Match(MatchError::NameCountMismatch { .. }))
        ));
    }

    #[test]
    fn empty_training_directory_fails_training() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("people")).unwrap();
        let mut pipeline = pipeline(&root).epochs(1).build();

        assert!(matches!(
            pipeline.run(),
            Err(VerifierError::Train(TrainError::EmptyDataset))
        ));
    }

    #[test]
    fn missing_training_directory_is_reported() {
        let root = TempDir::new().unwrap();
        let (sender, receiver) = EventChannel::new();
        let mut pipeline = pipeline(&root).build();

        let result = pipeline.run_with_events(&sender);
        assert!(matches!(
            result,
            Err(VerifierError::Load(LoadError::DirectoryNotFound { .. }))
        ));

        drop(sender);
        let saw_error = receiver
            .iter()
            .any(|e| matches!(e, Event::Pipeline(PipelineEvent::Error { .. })));
        assert!(saw_error);
    }

    #[test]
    fn previews_are_written() {
        let root = fixture();
        let previews = root.path().join("previews");
        let mut pipeline = pipeline(&root)
            .preview_dir(&previews)
            .scorer(Box::new(RednessScorer))
            .build();

        pipeline.run().unwrap();

        assert!(previews.join("probe_0.png").exists());
        assert!(previews.join("probe_1.png").exists());
    }

    #[test]
    fn representatives_gallery_is_used() {
        let root = fixture();
        let mut pipeline = pipeline(&root)
            .gallery_mode(GalleryMode::Representatives)
            .sampling(PairSampling::EveryNthNegative(2))
            .scorer(Box::new(RednessScorer))
            .build();

        let result = pipeline.run().unwrap();
        // 5 positives, 4 negatives -> 2 kept
        assert_eq!(result.pairs, 7);
        assert_eq!(result.matches[1].name, "Brad");
    }
}
