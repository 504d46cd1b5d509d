//! # Dataset Module
//!
//! Builds the pairwise training set from a directory of identities.
//!
//! ## Layout
//! ```text
//! people/
//!   Angelina/  1.jpg 2.jpg
//!   Brad/      1.jpg
//! ```
//! Each subdirectory is one identity. Labels are assigned `0, 1, 2, ...`
//! in sorted directory-name order.
//!
//! ## Pairs
//! Every ordered pair `(i, j)` of loaded images is a training example,
//! `i == j` included, labeled 1 when both images share an identity. With
//! N images that is N^2 pairs; they are produced lazily by
//! [`PairDataset::pairs`] rather than copied.

mod pairs;

pub use pairs::{Pair, PairSampling, Pairs};

use crate::core::loader::{list_entries, EntryKind, FaceImage, ImageLoader};
use crate::error::LoadError;
use crate::events::{DatasetEvent, Event, EventSender, LoadEvent};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One person in the training set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Integer label used in pair labels
    pub label: usize,
    /// Subdirectory name
    pub name: String,
    /// Source directory
    pub directory: PathBuf,
    /// Number of images loaded for this identity
    pub image_count: usize,
}

/// Loaded training images plus the identity of each
#[derive(Debug, Clone, Default)]
pub struct PairDataset {
    images: Vec<FaceImage>,
    labels: Vec<usize>,
    identities: Vec<Identity>,
    sampling: PairSampling,
}

impl PairDataset {
    /// Assemble a dataset from already-loaded identities, labeled in the
    /// order given.
    pub fn from_identities(groups: Vec<(String, Vec<FaceImage>)>) -> Self {
        let mut dataset = Self::default();
        for (label, (name, images)) in groups.into_iter().enumerate() {
            dataset.push_identity(label, name, PathBuf::new(), images);
        }
        dataset
    }

    fn push_identity(
        &mut self,
        label: usize,
        name: String,
        directory: PathBuf,
        images: Vec<FaceImage>,
    ) {
        self.identities.push(Identity {
            label,
            name,
            directory,
            image_count: images.len(),
        });
        self.labels.extend(std::iter::repeat(label).take(images.len()));
        self.images.extend(images);
    }

    /// Use a different pair sampling strategy
    pub fn with_sampling(mut self, sampling: PairSampling) -> Self {
        self.sampling = sampling;
        self
    }

    /// The active pair sampling strategy
    pub fn sampling(&self) -> PairSampling {
        self.sampling
    }

    /// Number of loaded images
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// All images in label order
    pub fn images(&self) -> &[FaceImage] {
        &self.images
    }

    /// Identity label of each image, parallel to [`images`](Self::images)
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Discovered identities in label order
    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    /// Side length of the images, if any were loaded
    pub fn image_size(&self) -> Option<u32> {
        self.images.first().map(FaceImage::size)
    }

    /// Label of the ordered pair `(i, j)`
    pub fn pair_label(&self, i: usize, j: usize) -> u8 {
        u8::from(self.labels[i] == self.labels[j])
    }

    /// Iterate pairs in row-major order. Restart by calling again.
    pub fn pairs(&self) -> Pairs<'_> {
        Pairs::new(self, self.sampling)
    }

    /// Number of pairs [`pairs`](Self::pairs) yields
    pub fn pair_count(&self) -> usize {
        let total = self.len() * self.len();
        match self.sampling {
            PairSampling::Full => total,
            PairSampling::EveryNthNegative(n) => {
                let negatives = total - self.positive_pair_count();
                self.positive_pair_count() + negatives.div_ceil(n.max(1))
            }
        }
    }

    /// Number of label-1 pairs: the sum of squared identity sizes
    pub fn positive_pair_count(&self) -> usize {
        self.identities
            .iter()
            .map(|identity| identity.image_count * identity.image_count)
            .sum()
    }

    /// Copy the pairs out as `(firsts, seconds, labels)` columns.
    pub fn materialize(&self) -> (Vec<FaceImage>, Vec<FaceImage>, Vec<u8>) {
        let count = self.pair_count();
        let mut firsts = Vec::with_capacity(count);
        let mut seconds = Vec::with_capacity(count);
        let mut labels = Vec::with_capacity(count);

        for pair in self.pairs() {
            firsts.push(pair.first.clone());
            seconds.push(pair.second.clone());
            labels.push(pair.label);
        }

        (firsts, seconds, labels)
    }
}

/// Load `root/<identity>/<image>` and build the pair dataset.
pub fn build_pairs(root: &Path, loader: &ImageLoader) -> Result<PairDataset, LoadError> {
    build_pairs_with_events(root, loader, &crate::events::null_sender())
}

/// [`build_pairs`] with progress reporting
pub fn build_pairs_with_events(
    root: &Path,
    loader: &ImageLoader,
    events: &EventSender,
) -> Result<PairDataset, LoadError> {
    let directories = list_entries(root, EntryKind::Directory, loader.filter())?;
    let mut dataset = PairDataset::default();

    for (label, directory) in directories.into_iter().enumerate() {
        let name = directory
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        events.send(Event::Load(LoadEvent::IdentityStarted {
            label,
            name: name.clone(),
        }));

        let images = loader.load_all_with_events(&directory, events)?;
        tracing::info!("Identity {} '{}': {} images", label, name, images.len());

        dataset.push_identity(label, name, directory, images);
    }

    events.send(Event::Dataset(DatasetEvent::Built {
        identities: dataset.identities.len(),
        images: dataset.len(),
        pairs: dataset.pair_count(),
        positive_pairs: dataset.positive_pair_count(),
    }));

    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loader::AxisOrder;

    fn face(tag: &str) -> FaceImage {
        FaceImage::from_pixels(tag, 1, AxisOrder::Transposed, vec![0.5; 3]).unwrap()
    }

    fn dataset(counts: &[usize]) -> PairDataset {
        PairDataset::from_identities(
            counts
                .iter()
                .enumerate()
                .map(|(k, &count)| {
                    let images = (0..count).map(|i| face(&format!("{}-{}", k, i))).collect();
                    (format!("person{}", k), images)
                })
                .collect(),
        )
    }

    #[test]
    fn angelina_and_brad_scenario() {
        let dataset = dataset(&[2, 1]);
        let labels: Vec<u8> = dataset.pairs().map(|p| p.label).collect();

        assert_eq!(labels.len(), 9);
        assert_eq!(labels.iter().filter(|&&l| l == 1).count(), 5);
        assert_eq!(labels.iter().filter(|&&l| l == 0).count(), 4);
    }

    #[test]
    fn pair_count_is_n_squared() {
        for counts in [&[3usize, 4, 1][..], &[5], &[1, 1, 1, 1]] {
            let dataset = dataset(counts);
            let n: usize = counts.iter().sum();
            let expected_positive: usize = counts.iter().map(|c| c * c).sum();

            let pairs: Vec<_> = dataset.pairs().collect();
            assert_eq!(pairs.len(), n * n);
            assert_eq!(pairs.iter().filter(|p| p.label == 1).count(), expected_positive);
            assert_eq!(dataset.positive_pair_count(), expected_positive);
        }
    }

    #[test]
    fn self_pairs_are_positive() {
        let dataset = dataset(&[2, 3]);
        assert!(dataset
            .pairs()
            .filter(|p| p.is_self_pair())
            .all(|p| p.label == 1));
        assert_eq!(dataset.pairs().filter(|p| p.is_self_pair()).count(), 5);
    }

    #[test]
    fn labels_are_symmetric() {
        let dataset = dataset(&[2, 2, 1]);
        let n = dataset.len();
        let labels: Vec<u8> = dataset.pairs().map(|p| p.label).collect();

        for i in 0..n {
            for j in 0..n {
                assert_eq!(labels[i * n + j], labels[j * n + i]);
            }
        }
    }

    #[test]
    fn first_index_varies_slowest() {
        let dataset = dataset(&[2, 1]);
        let order: Vec<(usize, usize)> = dataset
            .pairs()
            .map(|p| (p.first_index, p.second_index))
            .collect();

        assert_eq!(order[..3], [(0, 0), (0, 1), (0, 2)]);
        assert_eq!(order[8], (2, 2));
    }

    #[test]
    fn pairs_restart() {
        let dataset = dataset(&[2, 2]);
        assert_eq!(dataset.pairs().count(), dataset.pairs().count());
    }

    #[test]
    fn empty_dataset_has_no_pairs() {
        let dataset = PairDataset::default();
        assert_eq!(dataset.pairs().count(), 0);
        assert_eq!(dataset.pair_count(), 0);
    }

    #[test]
    fn single_image_yields_one_self_pair() {
        let dataset = dataset(&[1]);
        let pairs: Vec<_> = dataset.pairs().collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].label, 1);
    }

    #[test]
    fn negative_sampling_keeps_all_positives() {
        let dataset = dataset(&[2, 2, 2]).with_sampling(PairSampling::EveryNthNegative(3));
        let pairs: Vec<_> = dataset.pairs().collect();

        // 12 positives, 24 negatives -> 8 kept
        assert_eq!(pairs.iter().filter(|p| p.label == 1).count(), 12);
        assert_eq!(pairs.iter().filter(|p| p.label == 0).count(), 8);
        assert_eq!(dataset.pair_count(), pairs.len());
    }

    #[test]
    fn sampling_every_negative_equals_full() {
        let full = dataset(&[3, 1]);
        let sampled = dataset(&[3, 1]).with_sampling(PairSampling::EveryNthNegative(1));

        let a: Vec<_> = full.pairs().map(|p| (p.first_index, p.second_index)).collect();
        let b: Vec<_> = sampled.pairs().map(|p| (p.first_index, p.second_index)).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn materialize_matches_iteration() {
        let dataset = dataset(&[2, 1]);
        let (firsts, seconds, labels) = dataset.materialize();

        assert_eq!(firsts.len(), 9);
        assert_eq!(seconds.len(), 9);
        assert_eq!(labels, vec![1, 1, 0, 1, 1, 0, 0, 0, 1]);
        assert_eq!(firsts[0].path(), Path::new("0-0"));
        assert_eq!(seconds[2].path(), Path::new("1-0"));
    }
}
