//! Twin-embedding scorer with an absolute-difference head, built on candle.

use super::checkpoint::Checkpoint;
use super::{SimilarityScorer, TrainingConfig, TrainingReport};
use crate::core::dataset::PairDataset;
use crate::core::loader::FaceImage;
use crate::error::{CheckpointError, MatchError, TrainError, VerifierError};
use crate::events::{EpochProgress, Event, EventSender, TrainEvent};
use candle_core::{Device, Tensor, Var};
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Clamp applied to predictions before taking logs
const LOSS_EPSILON: f32 = 1e-7;

/// Side length of the convolution kernel
const KERNEL: usize = 3;

/// Shape of the twin network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiameseConfig {
    /// Side length of the images the model accepts
    pub image_size: u32,
    /// Feature maps produced by the convolution
    pub channels: usize,
    /// Cells per side after average pooling (clamped to `image_size`)
    pub grid: u32,
    /// Width of the shared embedding
    pub embedding_dim: usize,
    /// Seed for weight initialization and pair shuffling
    pub seed: u64,
}

impl SiameseConfig {
    /// Defaults for a given image size
    pub fn for_image_size(image_size: u32) -> Self {
        Self {
            image_size,
            channels: 8,
            grid: 8,
            embedding_dim: 32,
            seed: 42,
        }
    }

    /// Average-pooling window, chosen so the pooled map is about `grid` cells wide
    fn pool_window(&self) -> usize {
        let size = self.image_size.max(1);
        let grid = self.grid.clamp(1, size);
        (size / grid) as usize
    }

    /// Side length of the pooled feature map
    fn pooled_side(&self) -> usize {
        self.image_size as usize / self.pool_window()
    }

    /// Number of values the dense layer sees per image
    pub fn feature_len(&self) -> usize {
        let side = self.pooled_side();
        self.channels * side * side
    }

    fn conv_len(&self) -> usize {
        self.channels * 3 * KERNEL * KERNEL
    }
}

/// Learned parameters, flattened for checkpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiameseWeights {
    /// `channels x 3 x 3 x 3` convolution kernels
    pub conv: Vec<f32>,
    pub conv_bias: Vec<f32>,
    /// Row-major `embedding_dim x feature_len`
    pub embedding: Vec<f32>,
    pub embedding_bias: Vec<f32>,
    /// One weight per embedding unit
    pub head: Vec<f32>,
    pub head_bias: f32,
}

impl SiameseWeights {
    /// Glorot-uniform weights and zero biases
    fn initialize(config: &SiameseConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut glorot = |fan_in: usize, fan_out: usize, len: usize| -> Vec<f32> {
            let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
            (0..len).map(|_| rng.gen_range(-limit..limit)).collect()
        };

        let receptive = KERNEL * KERNEL;
        let units = config.embedding_dim;
        let conv = glorot(3 * receptive, config.channels * receptive, config.conv_len());
        let embedding = glorot(
            config.feature_len(),
            units,
            units * config.feature_len(),
        );
        let head = glorot(units, 1, units);

        Self {
            conv,
            conv_bias: vec![0.0; config.channels],
            embedding,
            embedding_bias: vec![0.0; units],
            head,
            head_bias: 0.0,
        }
    }

    /// Whether the tensor lengths fit `config`
    pub fn fits(&self, config: &SiameseConfig) -> bool {
        self.conv.len() == config.conv_len()
            && self.conv_bias.len() == config.channels
            && self.embedding.len() == config.embedding_dim * config.feature_len()
            && self.embedding_bias.len() == config.embedding_dim
            && self.head.len() == config.embedding_dim
    }
}

/// Trainable tensors
#[derive(Debug)]
struct Params {
    conv: Var,
    conv_bias: Var,
    embedding: Var,
    embedding_bias: Var,
    head: Var,
    head_bias: Var,
}

impl Params {
    fn from_weights(
        weights: &SiameseWeights,
        config: &SiameseConfig,
        device: &Device,
    ) -> candle_core::Result<Self> {
        let var = |values: &[f32], shape: &[usize]| -> candle_core::Result<Var> {
            Var::from_tensor(&Tensor::from_slice(values, shape, device)?)
        };
        let units = config.embedding_dim;
        Ok(Self {
            conv: var(&weights.conv, &[config.channels, 3, KERNEL, KERNEL])?,
            conv_bias: var(&weights.conv_bias, &[config.channels])?,
            embedding: var(&weights.embedding, &[units, config.feature_len()])?,
            embedding_bias: var(&weights.embedding_bias, &[units])?,
            head: var(&weights.head, &[units, 1])?,
            head_bias: var(&[weights.head_bias], &[1])?,
        })
    }

    fn to_weights(&self) -> candle_core::Result<SiameseWeights> {
        let flat = |var: &Var| var.as_tensor().flatten_all()?.to_vec1::<f32>();
        Ok(SiameseWeights {
            conv: flat(&self.conv)?,
            conv_bias: flat(&self.conv_bias)?,
            embedding: flat(&self.embedding)?,
            embedding_bias: flat(&self.embedding_bias)?,
            head: flat(&self.head)?,
            head_bias: flat(&self.head_bias)?.first().copied().unwrap_or(0.0),
        })
    }

    fn vars(&self) -> Vec<Var> {
        vec![
            self.conv.clone(),
            self.conv_bias.clone(),
            self.embedding.clone(),
            self.embedding_bias.clone(),
            self.head.clone(),
            self.head_bias.clone(),
        ]
    }
}

/// Twin network with shared weights and an absolute-difference head
#[derive(Debug)]
pub struct SiameseScorer {
    config: SiameseConfig,
    device: Device,
    params: Params,
}

impl SiameseScorer {
    /// Freshly initialized scorer
    pub fn new(config: SiameseConfig) -> Result<Self, TrainError> {
        if config.image_size == 0 {
            return Err(TrainError::InvalidParameter(
                "image size must be at least 1".to_string(),
            ));
        }
        if config.embedding_dim == 0 || config.channels == 0 {
            return Err(TrainError::InvalidParameter(
                "embedding width and channel count must be at least 1".to_string(),
            ));
        }
        let weights = SiameseWeights::initialize(&config);
        Self::with_weights(config, &weights).map_err(tensor_error)
    }

    fn with_weights(config: SiameseConfig, weights: &SiameseWeights) -> candle_core::Result<Self> {
        let device = Device::Cpu;
        let params = Params::from_weights(weights, &config, &device)?;
        Ok(Self {
            config,
            device,
            params,
        })
    }

    /// Restore a scorer saved by [`save`](Self::save) or by training
    pub fn from_checkpoint(path: &Path) -> Result<Self, CheckpointError> {
        let checkpoint = Checkpoint::load(path)?;
        let corrupted = |reason: String| CheckpointError::Corrupted {
            path: path.to_path_buf(),
            reason,
        };
        if checkpoint.config.image_size == 0 || !checkpoint.weights.fits(&checkpoint.config) {
            return Err(corrupted(
                "weight shapes do not match the stored model shape".to_string(),
            ));
        }
        let scorer = Self::with_weights(checkpoint.config, &checkpoint.weights)
            .map_err(|e| corrupted(e.to_string()))?;

        tracing::info!(
            "Loaded checkpoint {} (epoch {}, loss {:.4})",
            path.display(),
            checkpoint.epoch,
            checkpoint.loss
        );
        Ok(scorer)
    }

    /// Write the current weights
    pub fn save(&self, path: &Path, epoch: usize, loss: f64) -> Result<(), CheckpointError> {
        let weights = self.weights().map_err(|e| CheckpointError::Corrupted {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Checkpoint::new(self.config, weights, epoch, loss).save(path)
    }

    pub fn config(&self) -> &SiameseConfig {
        &self.config
    }

    /// Copy the current parameters out of the tensors
    pub fn weights(&self) -> candle_core::Result<SiameseWeights> {
        self.params.to_weights()
    }

    fn check_image(&self, image: &FaceImage) -> Result<(), MatchError> {
        let expected = 3 * self.config.image_size as usize * self.config.image_size as usize;
        if image.size() != self.config.image_size || image.pixels().len() != expected {
            return Err(MatchError::DimensionMismatch {
                expected,
                actual: image.pixels().len(),
            });
        }
        Ok(())
    }

    /// Stack images into an `N x 3 x size x size` tensor.
    ///
    /// The spatial axes follow each image's stored layout, so a transposed
    /// image is seen transposed by the convolution.
    fn batch(&self, images: &[&FaceImage]) -> candle_core::Result<Tensor> {
        let size = self.config.image_size as usize;
        let pixels: Vec<f32> = images
            .par_iter()
            .flat_map_iter(|image| image.pixels().iter().copied())
            .collect();
        Tensor::from_vec(pixels, (images.len(), size, size, 3), &self.device)?
            .permute((0, 3, 1, 2))?
            .contiguous()
    }

    /// Shared embedding: conv -> relu -> avg pool -> dense sigmoid
    fn embed(&self, images: &Tensor) -> candle_core::Result<Tensor> {
        let bias = self
            .params
            .conv_bias
            .as_tensor()
            .reshape((1, self.config.channels, 1, 1))?;
        let features = images
            .conv2d(self.params.conv.as_tensor(), 1, 1, 1, 1)?
            .broadcast_add(&bias)?
            .relu()?
            .avg_pool2d(self.config.pool_window())?
            .flatten_from(1)?;
        let dense = features
            .matmul(&self.params.embedding.as_tensor().t()?)?
            .broadcast_add(self.params.embedding_bias.as_tensor())?;
        candle_nn::ops::sigmoid(&dense)
    }

    /// Pre-sigmoid output for each row pair, shape `N`
    fn logits(&self, first: &Tensor, second: &Tensor) -> candle_core::Result<Tensor> {
        let distance = self.embed(first)?.sub(&self.embed(second)?)?.abs()?;
        distance
            .matmul(self.params.head.as_tensor())?
            .broadcast_add(self.params.head_bias.as_tensor())?
            .squeeze(1)
    }

    fn probability(&self, first: &FaceImage, second: &FaceImage) -> candle_core::Result<f32> {
        let logits = self.logits(&self.batch(&[first])?, &self.batch(&[second])?)?;
        let scores = candle_nn::ops::sigmoid(&logits)?.to_vec1::<f32>()?;
        Ok(scores.first().copied().unwrap_or(f32::NAN))
    }

    fn validate(&self, dataset: &PairDataset, config: &TrainingConfig) -> Result<(), TrainError> {
        if dataset.pair_count() == 0 {
            return Err(TrainError::EmptyDataset);
        }
        if config.epochs == 0 {
            return Err(TrainError::InvalidParameter(
                "epochs must be at least 1".to_string(),
            ));
        }
        if config.batch_size == 0 {
            return Err(TrainError::InvalidParameter(
                "batch size must be at least 1".to_string(),
            ));
        }
        for image in dataset.images() {
            if self.check_image(image).is_err() {
                return Err(TrainError::SizeMismatch {
                    expected: self.config.image_size,
                    actual: image.size(),
                });
            }
        }
        Ok(())
    }

    /// One pass over `pairs`; returns the mean loss
    fn train_epoch(
        &self,
        optimizer: &mut AdamW,
        images: &Tensor,
        pairs: &[(u32, u32, f32)],
        batch_size: usize,
    ) -> candle_core::Result<f64> {
        let mut total_loss = 0.0f64;

        for batch in pairs.chunks(batch_size) {
            let firsts: Vec<u32> = batch.iter().map(|p| p.0).collect();
            let seconds: Vec<u32> = batch.iter().map(|p| p.1).collect();
            let labels: Vec<f32> = batch.iter().map(|p| p.2).collect();

            let firsts = Tensor::from_vec(firsts, batch.len(), &self.device)?;
            let seconds = Tensor::from_vec(seconds, batch.len(), &self.device)?;
            let targets = Tensor::from_vec(labels, batch.len(), &self.device)?;

            let logits = self.logits(
                &images.index_select(&firsts, 0)?,
                &images.index_select(&seconds, 0)?,
            )?;
            let loss = binary_cross_entropy(&logits, &targets)?;
            optimizer.backward_step(&loss)?;

            total_loss += loss.to_scalar::<f32>()? as f64 * batch.len() as f64;
        }

        Ok(total_loss / pairs.len() as f64)
    }
}

impl SimilarityScorer for SiameseScorer {
    fn train(
        &mut self,
        dataset: &PairDataset,
        config: &TrainingConfig,
        events: &EventSender,
    ) -> Result<TrainingReport, VerifierError> {
        self.validate(dataset, config)?;

        let images: Vec<&FaceImage> = dataset.images().iter().collect();
        let images = self.batch(&images).map_err(tensor_error)?;
        let mut pairs: Vec<(u32, u32, f32)> = dataset
            .pairs()
            .map(|p| (p.first_index as u32, p.second_index as u32, p.label as f32))
            .collect();
        let pairs_per_epoch = pairs.len();

        events.send(Event::Train(TrainEvent::Started {
            epochs: config.epochs,
            pairs: pairs_per_epoch,
        }));
        tracing::info!(
            "Training {} for {} epochs on {} pairs (batch size {})",
            self.name(),
            config.epochs,
            pairs_per_epoch,
            config.batch_size
        );

        let params = ParamsAdamW {
            lr: config.schedule.rate(0),
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-7,
            weight_decay: 0.0,
        };
        let mut optimizer = AdamW::new(self.params.vars(), params).map_err(tensor_error)?;
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut report = TrainingReport {
            pairs_per_epoch,
            best_loss: f64::INFINITY,
            ..TrainingReport::default()
        };

        for epoch in 0..config.epochs {
            let learning_rate = config.schedule.rate(epoch);
            optimizer.set_learning_rate(learning_rate);
            if config.shuffle {
                pairs.shuffle(&mut rng);
            }

            let loss = self
                .train_epoch(&mut optimizer, &images, &pairs, config.batch_size)
                .map_err(tensor_error)?;

            let progress = EpochProgress {
                epoch: epoch + 1,
                total_epochs: config.epochs,
                loss,
                learning_rate,
            };
            tracing::debug!(
                "Epoch {}/{}: loss {:.6}, lr {:.2e}",
                progress.epoch,
                progress.total_epochs,
                progress.loss,
                learning_rate
            );

            if progress.loss < report.best_loss {
                report.best_loss = progress.loss;
                report.best_epoch = progress.epoch;

                if let Some(path) = &config.checkpoint_path {
                    self.save(path, progress.epoch, progress.loss)?;
                    tracing::info!(
                        "Epoch {}: loss improved to {:.6}, saved {}",
                        progress.epoch,
                        progress.loss,
                        path.display()
                    );
                    events.send(Event::Train(TrainEvent::CheckpointSaved {
                        path: path.clone(),
                        loss: progress.loss,
                    }));
                    report.checkpoint = Some(path.clone());
                }
            }

            events.send(Event::Train(TrainEvent::EpochCompleted(progress.clone())));
            report.history.push(progress);
        }

        events.send(Event::Train(TrainEvent::Completed {
            final_loss: report.final_loss().unwrap_or(f64::NAN),
            best_loss: report.best_loss,
        }));

        Ok(report)
    }

    fn score(&self, first: &FaceImage, second: &FaceImage) -> Result<f32, MatchError> {
        self.check_image(first)?;
        self.check_image(second)?;
        self.probability(first, second)
            .map_err(|e| MatchError::Tensor(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "siamese"
    }
}

/// Mean binary cross-entropy of `sigmoid(logits)` against 0/1 targets
fn binary_cross_entropy(logits: &Tensor, targets: &Tensor) -> candle_core::Result<Tensor> {
    let p = candle_nn::ops::sigmoid(logits)?.clamp(LOSS_EPSILON, 1.0 - LOSS_EPSILON)?;
    let positive = targets.mul(&p.log()?)?;
    let negative = targets
        .affine(-1.0, 1.0)?
        .mul(&p.affine(-1.0, 1.0)?.log()?)?;
    positive.add(&negative)?.neg()?.mean_all()
}

fn tensor_error(e: candle_core::Error) -> TrainError {
    TrainError::Tensor(e.to_string())
}
