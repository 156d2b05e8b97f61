//! Sample selection over a rule batch.
//!
//! Verification cost must not grow with the batch, so only `k` random
//! indices are checked. The first and last index are always added so that
//! edge-of-batch behavior is exercised on every run.

use rand::Rng;
use serde::Serialize;
use std::collections::BTreeSet;

/// Default number of random indices drawn from a batch.
pub const DEFAULT_SAMPLE_SIZE: usize = 10;

/// Bounded, de-duplicated set of batch indices to verify.
///
/// Every index is `< n` for the `n` it was selected from. Iteration is in
/// ascending index order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SampleSet(BTreeSet<usize>);

impl SampleSet {
    /// Number of sampled indices.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if nothing was sampled (only for an empty batch).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `index` is part of the sample.
    pub fn contains(&self, index: usize) -> bool {
        self.0.contains(&index)
    }

    /// Iterate sampled indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }
}

impl<'a> IntoIterator for &'a SampleSet {
    type Item = usize;
    type IntoIter = std::iter::Copied<std::collections::btree_set::Iter<'a, usize>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().copied()
    }
}

/// Select `k` random indices from `[0, n)` plus both boundary indices.
///
/// Uses the thread-local RNG, so the random middle differs run to run.
pub fn select(n: usize, k: usize) -> SampleSet {
    select_with_rng(n, k, &mut rand::thread_rng())
}

/// Same as [`select`] with a caller-supplied entropy source.
///
/// - `n == 0` yields an empty set.
/// - `n <= k + 2` yields every index, never drawing more than exist.
/// - otherwise `k` distinct draws unioned with `{0, n - 1}`.
pub fn select_with_rng<R: Rng + ?Sized>(n: usize, k: usize, rng: &mut R) -> SampleSet {
    if n == 0 {
        return SampleSet(BTreeSet::new());
    }

    if n <= k.saturating_add(2) {
        return SampleSet((0..n).collect());
    }

    let mut indices: BTreeSet<usize> = rand::seq::index::sample(rng, n, k).into_iter().collect();
    indices.insert(0);
    indices.insert(n - 1);
    SampleSet(indices)
}
