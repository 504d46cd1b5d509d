//! # Matcher Module
//!
//! Identifies probe images by scoring them against a gallery.
//!
//! ## How It Works
//! 1. Score the probe against every gallery entry
//! 2. Pick the highest score (the earliest entry wins a tie)
//! 3. Report that entry's name with the raw score as confidence
//!
//! ## Example
//! ```rust,ignore
//! let gallery = Gallery::from_dataset(&dataset, None, GalleryMode::AllImages)?;
//! let (name, confidence) = match_probe(&scorer, &probe, &gallery)?;
//! ```

mod gallery;

pub use gallery::{resolve_names, Gallery, GalleryEntry, GalleryMode};

use crate::core::loader::FaceImage;
use crate::core::scorer::SimilarityScorer;
use crate::error::{LoadError, MatchError, VerifierError};
use crate::events::{Event, EventSender, MatchEvent};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Identification of one probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Position of the probe in the probe list
    pub probe_index: usize,
    pub probe_path: PathBuf,
    /// Name of the best-scoring gallery entry
    pub name: String,
    /// Score of that entry, in `[0, 1]`
    pub confidence: f32,
}

impl MatchResult {
    /// Confidence as a percentage
    pub fn percentage(&self) -> f64 {
        self.confidence as f64 * 100.0
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IMAGE {} is {} with confidence of {:.2}%",
            self.probe_index,
            self.name,
            self.percentage()
        )
    }
}

/// Index of the maximum score; the first occurrence wins ties.
///
/// NaN scores never win.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        match best {
            Some((_, best_score)) if !(score > best_score) => {}
            _ if score.is_nan() => {}
            _ => best = Some((index, score)),
        }
    }
    best.map(|(index, _)| index)
}

/// Score `probe` against every entry and return the best name and score.
pub fn match_probe(
    scorer: &dyn SimilarityScorer,
    probe: &FaceImage,
    gallery: &Gallery,
) -> Result<(String, f32), MatchError> {
    if gallery.is_empty() {
        return Err(MatchError::EmptyGallery);
    }

    let scores = gallery
        .entries()
        .iter()
        .map(|entry| scorer.score(probe, &entry.image))
        .collect::<Result<Vec<_>, _>>()?;

    // Every score NaN: fall back to the first entry like a plain argmax would
    let index = argmax(&scores).unwrap_or(0);
    let entry = &gallery.entries()[index];

    tracing::debug!(
        "{} -> {} ({:.4}) over {} entries",
        probe.path().display(),
        entry.name,
        scores[index],
        scores.len()
    );

    Ok((entry.name.clone(), scores[index]))
}

/// Match every probe in order.
///
/// When `preview_dir` is set, each probe is first written there as an
/// upright `probe_<index>.png` for visual inspection.
pub fn identify_all(
    scorer: &dyn SimilarityScorer,
    probes: &[FaceImage],
    gallery: &Gallery,
    preview_dir: Option<&Path>,
    events: &EventSender,
) -> Result<Vec<MatchResult>, VerifierError> {
    if gallery.is_empty() {
        return Err(MatchError::EmptyGallery.into());
    }

    events.send(Event::Match(MatchEvent::Started {
        probes: probes.len(),
        gallery_size: gallery.len(),
    }));

    let mut results = Vec::with_capacity(probes.len());
    for (index, probe) in probes.iter().enumerate() {
        if let Some(dir) = preview_dir {
            let path = write_preview(probe, index, dir)?;
            events.send(Event::Match(MatchEvent::PreviewWritten { index, path }));
        }

        let (name, confidence) = match_probe(scorer, probe, gallery)?;
        events.send(Event::Match(MatchEvent::ProbeMatched {
            index,
            name: name.clone(),
            confidence,
        }));

        results.push(MatchResult {
            probe_index: index,
            probe_path: probe.path().to_path_buf(),
            name,
            confidence,
        });
    }

    events.send(Event::Match(MatchEvent::Completed {
        total_matched: results.len(),
    }));

    Ok(results)
}

fn write_preview(probe: &FaceImage, index: usize, dir: &Path) -> Result<PathBuf, LoadError> {
    std::fs::create_dir_all(dir).map_err(|source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(format!("probe_{}.png", index));
    probe
        .to_rgb_image()
        .save(&path)
        .map_err(|e| LoadError::Decode {
            path: path.clone(),
            reason: format!("failed to encode preview: {}", e),
        })?;

    Ok(path)
}
