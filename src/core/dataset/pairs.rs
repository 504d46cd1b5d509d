//! Lazy enumeration of labeled image pairs.

use super::PairDataset;
use crate::core::loader::FaceImage;
use serde::{Deserialize, Serialize};

/// How much of the `N x N` product to enumerate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PairSampling {
    /// Every ordered pair, self-pairs included
    #[default]
    Full,
    /// Every positive pair plus every n-th negative pair (in product order)
    EveryNthNegative(usize),
}

impl PairSampling {
    fn stride(self) -> usize {
        match self {
            PairSampling::Full => 1,
            PairSampling::EveryNthNegative(n) => n.max(1),
        }
    }
}

/// One ordered training pair
#[derive(Debug, Clone, Copy)]
pub struct Pair<'a> {
    /// Index of the first image in the dataset
    pub first_index: usize,
    /// Index of the second image in the dataset
    pub second_index: usize,
    pub first: &'a FaceImage,
    pub second: &'a FaceImage,
    /// 1 when both images share an identity, else 0
    pub label: u8,
}

impl Pair<'_> {
    /// Whether this pairs an image with itself
    pub fn is_self_pair(&self) -> bool {
        self.first_index == self.second_index
    }
}

/// Iterator over the pairs of a [`PairDataset`], in row-major product
/// order: position `p` is `(p / N, p % N)`.
///
/// Cheap to create; call [`PairDataset::pairs`] again to restart.
pub struct Pairs<'a> {
    dataset: &'a PairDataset,
    position: usize,
    negatives_seen: usize,
    stride: usize,
    remaining: usize,
}

impl<'a> Pairs<'a> {
    pub(super) fn new(dataset: &'a PairDataset, sampling: PairSampling) -> Self {
        Self {
            dataset,
            position: 0,
            negatives_seen: 0,
            stride: sampling.stride(),
            remaining: dataset.pair_count(),
        }
    }
}

impl<'a> Iterator for Pairs<'a> {
    type Item = Pair<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.dataset.len();
        let total = n * n;

        while self.position < total {
            let first_index = self.position / n;
            let second_index = self.position % n;
            self.position += 1;

            let label = self.dataset.pair_label(first_index, second_index);
            if label == 0 {
                let keep = self.negatives_seen % self.stride == 0;
                self.negatives_seen += 1;
                if !keep {
                    continue;
                }
            }

            self.remaining = self.remaining.saturating_sub(1);
            let images = self.dataset.images();
            return Some(Pair {
                first_index,
                second_index,
                first: &images[first_index],
                second: &images[second_index],
                label,
            });
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Pairs<'_> {}
