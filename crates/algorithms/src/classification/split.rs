//! Best-split search for one tree node
//!
//! For each band the node's samples are sorted once and the boundaries
//! between consecutive distinct values are swept left to right while the
//! class counts of both sides are updated incrementally. The candidate
//! threshold is the midpoint of the two values around the boundary.

use rayon::prelude::*;
use landcart_core::sample::LabeledSample;

use super::tree::Impurity;

/// Minimum node size × band count before bands are searched in parallel
const PARALLEL_MIN_WORK: usize = 1 << 15;

/// Splits must lower impurity by more than this to be kept
const MIN_IMPURITY_DECREASE: f64 = 1e-12;

/// A scored (band, threshold) candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SplitCandidate {
    pub band: usize,
    pub threshold: f64,
    /// Size-weighted mean impurity of the two children
    pub score: f64,
}

/// Inputs shared by every node search of one training run
pub(crate) struct SplitSearch<'a> {
    pub samples: &'a [LabeledSample],
    pub n_bands: usize,
    pub n_classes: usize,
    pub impurity: Impurity,
    pub min_samples_leaf: usize,
    pub parallel: bool,
}

impl SplitSearch<'_> {
    /// Lowest-scoring split of `indices`, if it improves on the node impurity.
    ///
    /// Ties go to the lowest band index, then the lowest threshold.
    pub fn best(&self, indices: &[usize], counts: &[usize]) -> Option<SplitCandidate> {
        let n = indices.len();
        let parent = self.impurity.of(counts, n);

        let per_band: Vec<Option<SplitCandidate>> =
            if self.parallel && n * self.n_bands >= PARALLEL_MIN_WORK {
                (0..self.n_bands)
                    .into_par_iter()
                    .map(|band| self.best_for_band(band, indices, counts))
                    .collect()
            } else {
                (0..self.n_bands)
                    .map(|band| self.best_for_band(band, indices, counts))
                    .collect()
            };

        per_band
            .into_iter()
            .flatten()
            .fold(None, |best: Option<SplitCandidate>, c| match best {
                Some(b) if b.score <= c.score => Some(b),
                _ => Some(c),
            })
            .filter(|best| parent - best.score > MIN_IMPURITY_DECREASE)
    }

    fn best_for_band(&self, band: usize, indices: &[usize], counts: &[usize]) -> Option<SplitCandidate> {
        let n = indices.len();
        let mut sorted: Vec<(f64, usize)> = indices
            .iter()
            .map(|&i| {
                let s = &self.samples[i];
                (s.values()[band], s.class())
            })
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left = vec![0usize; self.n_classes];
        let mut right = counts.to_vec();
        let mut best: Option<SplitCandidate> = None;

        for i in 0..n.saturating_sub(1) {
            let (value, class) = sorted[i];
            left[class] += 1;
            right[class] -= 1;

            let next = sorted[i + 1].0;
            if value == next {
                continue;
            }
            let n_left = i + 1;
            let n_right = n - n_left;
            if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                continue;
            }

            let score = (n_left as f64 * self.impurity.of(&left, n_left)
                + n_right as f64 * self.impurity.of(&right, n_right))
                / n as f64;

            if best.map_or(true, |b| score < b.score) {
                best = Some(SplitCandidate {
                    band,
                    threshold: midpoint(value, next),
                    score,
                });
            }
        }

        best
    }
}

/// Midpoint of `lo < hi` that still sends `lo` left and `hi` right
fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo + (hi - lo) / 2.0;
    if mid < hi {
        mid
    } else {
        lo
    }
}
