//! # CLI Module
//!
//! Command-line interface for siamese face verification.
//!
//! ## Usage
//! ```bash
//! # Train on people/ and identify test_images/
//! face-verify run
//!
//! # Override directory names and keep the best checkpoint
//! face-verify run --names Angelina,Brad --checkpoint-dir models
//!
//! # Identify with a saved model, JSON output
//! face-verify identify --checkpoint models/model_128.json --output json
//!
//! # Inspect the pair dataset
//! face-verify pairs --train people --size 64
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use console::{style, Term};
use face_verification::core::dataset::{PairDataset, PairSampling};
use face_verification::core::loader::AxisOrder;
use face_verification::core::matcher::{GalleryMode, MatchResult};
use face_verification::core::pipeline::{Pipeline, PipelineResult, VerifierConfig};
use face_verification::core::scorer::{LearningRateSchedule, TrainingReport};
use face_verification::error::{Result, VerifierError};
use face_verification::events::{
    Event, EventChannel, EventSender, LoadEvent, MatchEvent, PipelineEvent, TrainEvent,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::thread;

/// Face Verification - Learn who is who from a folder per person
#[derive(Parser, Debug)]
#[command(name = "face-verify")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train on the training directory, then identify every probe
    Run {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        training: TrainingArgs,

        /// Write upright probe previews into this directory
        #[arg(long)]
        preview_dir: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Train only and keep the best checkpoint
    Train {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        training: TrainingArgs,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Identify probes with a saved checkpoint
    Identify {
        #[command(flatten)]
        data: DataArgs,

        /// Checkpoint written by `train` or `run`
        #[arg(long)]
        checkpoint: PathBuf,

        /// Write upright probe previews into this directory
        #[arg(long)]
        preview_dir: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Summarize the pair dataset without training
    Pairs {
        #[command(flatten)]
        data: DataArgs,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },
}

/// Where the images are and how to read them
#[derive(Args, Debug)]
struct DataArgs {
    /// JSON configuration file; flags given on the command line win
    #[arg(long)]
    config: Option<PathBuf>,

    /// Training directory (one subdirectory per person)
    #[arg(long = "train")]
    training_dir: Option<PathBuf>,

    /// Directory of probe images
    #[arg(long = "test")]
    test_dir: Option<PathBuf>,

    /// Side length images are resized to
    #[arg(short, long)]
    size: Option<u32>,

    /// Display names, one per identity in sorted directory order
    #[arg(long, value_delimiter = ',')]
    names: Option<Vec<String>>,

    /// Pixel layout of loaded images
    #[arg(long)]
    axis_order: Option<Axis>,

    /// Which training images probes are matched against
    #[arg(long)]
    gallery: Option<GalleryArg>,

    /// Keep only every n-th different-person pair
    #[arg(long, value_name = "N")]
    negative_every: Option<usize>,

    /// Include hidden files and directories
    #[arg(long)]
    include_hidden: bool,
}

#[derive(Args, Debug)]
struct TrainingArgs {
    /// Passes over the pair dataset
    #[arg(short, long)]
    epochs: Option<usize>,

    /// Pairs per optimizer step
    #[arg(long)]
    batch_size: Option<usize>,

    /// Use a constant learning rate instead of the exponential schedule
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Save the best checkpoint into this directory [default: models]
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Do not write checkpoints
    #[arg(long)]
    no_checkpoint: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Axis {
    /// Spatial axes swapped (default)
    Transposed,
    /// Row-major, `y` outer
    RowMajor,
}

impl From<Axis> for AxisOrder {
    fn from(axis: Axis) -> Self {
        match axis {
            Axis::Transposed => AxisOrder::Transposed,
            Axis::RowMajor => AxisOrder::RowMajor,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GalleryArg {
    /// Every training image (default)
    All,
    /// First image of each person
    Representatives,
}

impl From<GalleryArg> for GalleryMode {
    fn from(gallery: GalleryArg) -> Self {
        match gallery {
            GalleryArg::All => GalleryMode::AllImages,
            GalleryArg::Representatives => GalleryMode::Representatives,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
    /// Minimal output (report lines only)
    Minimal,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data,
            training,
            preview_dir,
            output,
        } => {
            let mut config = data.to_config()?;
            training.apply(&mut config)?;
            config.preview_dir = preview_dir;
            run_full(config, output)
        }
        Commands::Train {
            data,
            training,
            output,
        } => {
            let mut config = data.to_config()?;
            training.apply(&mut config)?;
            run_train(config, output)
        }
        Commands::Identify {
            data,
            checkpoint,
            preview_dir,
            output,
        } => {
            let mut config = data.to_config()?;
            config.preview_dir = preview_dir;
            run_identify(config, &checkpoint, output)
        }
        Commands::Pairs { data, output } => run_pairs(data.to_config()?, output),
    }
}

impl DataArgs {
    fn to_config(&self) -> Result<VerifierConfig> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => VerifierConfig::default(),
        };

        if let Some(dir) = &self.training_dir {
            config.training_dir = dir.clone();
        }
        if let Some(dir) = &self.test_dir {
            config.test_dir = dir.clone();
        }
        if let Some(size) = self.size {
            config.loader.size = size;
        }
        config.model.image_size = config.loader.size;
        if let Some(names) = &self.names {
            config.names = Some(names.clone());
        }
        if let Some(axis) = self.axis_order {
            config.loader.axis_order = axis.into();
        }
        if let Some(gallery) = self.gallery {
            config.gallery_mode = gallery.into();
        }
        match self.negative_every {
            Some(0) => {
                return Err(VerifierError::Config(
                    "--negative-every must be at least 1".to_string(),
                ))
            }
            Some(n) => config.sampling = PairSampling::EveryNthNegative(n),
            None => {}
        }
        if self.include_hidden {
            config.loader.include_hidden = true;
        }

        Ok(config)
    }
}

impl TrainingArgs {
    fn apply(&self, config: &mut VerifierConfig) -> Result<()> {
        if let Some(epochs) = self.epochs {
            config.training.epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            config.training.batch_size = batch_size;
        }
        if let Some(rate) = self.learning_rate {
            if rate.is_nan() || rate <= 0.0 {
                return Err(VerifierError::Config(format!(
                    "learning rate must be positive, got {}",
                    rate
                )));
            }
            config.training.schedule = LearningRateSchedule::Constant(rate);
        }
        config.checkpoint_dir = if self.no_checkpoint {
            None
        } else {
            self.checkpoint_dir
                .clone()
                .or_else(|| config.checkpoint_dir.take())
                .or_else(|| Some(PathBuf::from("models")))
        };
        Ok(())
    }
}

fn read_config(path: &Path) -> Result<VerifierConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        VerifierError::Config(format!("cannot read config {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&text)
        .map_err(|e| VerifierError::Config(format!("invalid config {}: {}", path.display(), e)))
}

fn print_header(term: &Term, output: OutputFormat) {
    if matches!(output, OutputFormat::Pretty) {
        term.write_line(&format!(
            "{} {}",
            style("Face Verification").bold().cyan(),
            style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line("").ok();
    }
}

/// Run `work` while a background thread turns events into a progress bar.
fn with_progress<T>(
    output: OutputFormat,
    work: impl FnOnce(&EventSender) -> Result<T>,
) -> Result<T> {
    let (sender, receiver) = EventChannel::new();

    // Progress bar for pretty output
    let progress = if matches!(output, OutputFormat::Pretty) {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        Some(pb)
    } else {
        None
    };

    let progress_clone = progress.clone();

    // Handle events in a separate thread
    let event_thread = thread::spawn(move || {
        let Some(pb) = progress_clone else {
            return;
        };

        for event in receiver.iter() {
            match event {
                Event::Pipeline(PipelineEvent::PhaseChanged { phase }) => {
                    pb.set_message(format!("{}", phase));
                }
                Event::Load(LoadEvent::IdentityStarted { name, .. }) => {
                    pb.set_message(format!("Loading {}", name));
                }
                Event::Load(LoadEvent::ImageLoaded { .. }) => pb.tick(),
                Event::Train(TrainEvent::Started { epochs, .. }) => {
                    pb.set_length(epochs as u64);
                    pb.set_position(0);
                }
                Event::Train(TrainEvent::EpochCompleted(p)) => {
                    pb.set_position(p.epoch as u64);
                    pb.set_message(format!("loss {:.4}, lr {:.1e}", p.loss, p.learning_rate));
                }
                Event::Match(MatchEvent::Started { probes, .. }) => {
                    pb.set_length(probes as u64);
                    pb.set_position(0);
                    pb.set_message("Matching");
                }
                Event::Match(MatchEvent::ProbeMatched { .. }) => pb.inc(1),
                Event::Pipeline(PipelineEvent::Completed { .. })
                | Event::Pipeline(PipelineEvent::Error { .. }) => pb.finish_and_clear(),
                _ => {}
            }
        }
    });

    let result = work(&sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    result
}

fn run_full(config: VerifierConfig, output: OutputFormat) -> Result<()> {
    let term = Term::stderr();
    print_header(&term, output);

    let mut pipeline = Pipeline::builder().config(config).build();
    let result = with_progress(output, |events| pipeline.run_with_events(events))?;

    print_results(&term, &result, output);
    Ok(())
}

fn run_identify(config: VerifierConfig, checkpoint: &Path, output: OutputFormat) -> Result<()> {
    let term = Term::stderr();
    print_header(&term, output);

    let mut pipeline = Pipeline::builder().config(config).build();
    let result = with_progress(output, |events| {
        pipeline.identify_with_events(checkpoint, events)
    })?;

    print_results(&term, &result, output);
    Ok(())
}

fn run_train(config: VerifierConfig, output: OutputFormat) -> Result<()> {
    let term = Term::stderr();
    print_header(&term, output);

    let mut pipeline = Pipeline::builder().config(config).build();
    let (dataset, report) = with_progress(output, |events| {
        let dataset = pipeline.load_dataset(events)?;
        let report = pipeline.train(&dataset, events)?;
        Ok((dataset, report))
    })?;

    match output {
        OutputFormat::Pretty => {
            term.write_line(&format!(
                "{} Training Complete",
                style("✓").green().bold()
            ))
            .ok();
            print_dataset_summary(&term, &dataset);
            print_training_summary(&term, &report);
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "identities": dataset.identities(),
            "training_images": dataset.len(),
            "pairs": dataset.pair_count(),
            "training": report,
        })),
        OutputFormat::Minimal => {
            if let Some(path) = &report.checkpoint {
                println!("{}", path.display());
            }
        }
    }

    Ok(())
}

fn run_pairs(config: VerifierConfig, output: OutputFormat) -> Result<()> {
    let term = Term::stderr();
    print_header(&term, output);

    let pipeline = Pipeline::builder().config(config).build();
    let dataset = with_progress(output, |events| pipeline.load_dataset(events))?;

    match output {
        OutputFormat::Pretty => print_dataset_summary(&term, &dataset),
        OutputFormat::Json => print_json(&serde_json::json!({
            "identities": dataset.identities(),
            "training_images": dataset.len(),
            "pairs": dataset.pair_count(),
            "positive_pairs": dataset.positive_pair_count(),
        })),
        OutputFormat::Minimal => println!(
            "{} {} {}",
            dataset.len(),
            dataset.pair_count(),
            dataset.positive_pair_count()
        ),
    }

    Ok(())
}

fn print_results(term: &Term, result: &PipelineResult, output: OutputFormat) {
    match output {
        OutputFormat::Pretty => print_pretty_results(term, result),
        OutputFormat::Json => print_json_results(result),
        OutputFormat::Minimal => print_minimal_results(&result.matches),
    }
}

fn print_dataset_summary(term: &Term, dataset: &PairDataset) {
    term.write_line("").ok();
    for identity in dataset.identities() {
        term.write_line(&format!(
            "  {} {} ({} images)",
            style(format!("[{}]", identity.label)).dim(),
            style(&identity.name).bold(),
            identity.image_count
        ))
        .ok();
    }
    term.write_line(&format!(
        "  {} images, {} pairs ({} same person)",
        style(dataset.len()).cyan(),
        style(dataset.pair_count()).cyan(),
        style(dataset.positive_pair_count()).cyan()
    ))
    .ok();
}

fn print_training_summary(term: &Term, report: &TrainingReport) {
    if let Some(loss) = report.final_loss() {
        term.write_line(&format!(
            "  {} epochs, final loss {}, best {} at epoch {}",
            style(report.history.len()).cyan(),
            style(format!("{:.4}", loss)).yellow(),
            style(format!("{:.4}", report.best_loss)).yellow(),
            report.best_epoch
        ))
        .ok();
    }
    if let Some(path) = &report.checkpoint {
        term.write_line(&format!(
            "  {} {}",
            style("Checkpoint:").dim(),
            path.display()
        ))
        .ok();
    }
}

fn print_pretty_results(term: &Term, result: &PipelineResult) {
    term.write_line(&format!(
        "{} Identification Complete",
        style("✓").green().bold()
    ))
    .ok();
    term.write_line("").ok();

    // Summary
    term.write_line(&format!(
        "  {} people, {} training images, {} pairs",
        style(result.identities.len()).cyan(),
        style(result.training_images).cyan(),
        style(result.pairs).cyan()
    ))
    .ok();
    if let Some(report) = &result.training {
        print_training_summary(term, report);
    }
    term.write_line(&format!(
        "  {} probes in {:.1}s",
        style(result.matches.len()).cyan(),
        result.duration_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line("").ok();

    if result.matches.is_empty() {
        term.write_line(&format!("  {}", style("No probe images found.").yellow()))
            .ok();
    }

    // Report lines go to stdout so they can be piped
    for m in &result.matches {
        println!("{}", m);
    }
}

fn print_json_results(result: &PipelineResult) {
    print_json(&serde_json::json!({
        "identities": result.identities,
        "training_images": result.training_images,
        "pairs": result.pairs,
        "positive_pairs": result.positive_pairs,
        "duration_ms": result.duration_ms,
        "training": result.training,
        "matches": result.matches.iter().map(|m| {
            serde_json::json!({
                "index": m.probe_index,
                "path": m.probe_path,
                "name": m.name,
                "confidence": m.confidence,
                "percentage": format!("{:.2}", m.percentage()),
            })
        }).collect::<Vec<_>>()
    }));
}

fn print_minimal_results(matches: &[MatchResult]) {
    for m in matches {
        println!("{}", m);
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::warn!("Failed to render JSON output: {}", e),
    }
}
