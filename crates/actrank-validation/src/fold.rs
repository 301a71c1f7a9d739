//! Deterministic contiguous k-fold partitioning.
//!
//! The sample index range `0..total` is cut once into `k` contiguous blocks whose sizes
//! differ by at most one (the first `total % k` blocks get the extra sample). Fold `i`
//! tests on block `i` and trains on every other block, so:
//!
//! - the test blocks of all folds are pairwise disjoint and cover `0..total` exactly once
//! - within a fold, train and test are disjoint and together cover `0..total`
//!
//! There is no shuffling: fold membership depends only on `total` and `k`.

use std::{iter, ops::Range};

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum FoldError {
    #[display("cross-validation needs at least 2 folds, got {folds}")]
    TooFewFolds { folds: usize },
    #[display("cannot split {total} samples into {folds} folds")]
    TooManyFolds { folds: usize, total: usize },
}

/// Precomputed block boundaries for `k` folds over `total` samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldPartition {
    total: usize,
    blocks: Vec<Range<usize>>,
}

impl FoldPartition {
    pub fn new(total: usize, folds: usize) -> Result<Self, FoldError> {
        if folds < 2 {
            return Err(FoldError::TooFewFolds { folds });
        }
        if folds > total {
            return Err(FoldError::TooManyFolds { folds, total });
        }
        let base = total / folds;
        let extra = total % folds;
        let mut start = 0;
        let blocks = (0..folds)
            .map(|i| {
                let len = base + usize::from(i < extra);
                let block = start..start + len;
                start += len;
                block
            })
            .collect();
        Ok(Self { total, blocks })
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[must_use]
    pub fn fold(&self, index: usize) -> Option<Fold> {
        let test = self.blocks.get(index)?.clone();
        Some(Fold {
            index,
            test,
            total: self.total,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Fold> + '_ {
        (0..self.blocks.len()).filter_map(|i| self.fold(i))
    }
}

/// One train/test split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    index: usize,
    test: Range<usize>,
    total: usize,
}

impl Fold {
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn test_indices(&self) -> Range<usize> {
        self.test.clone()
    }

    /// Every index outside the test block, in ascending order.
    pub fn train_indices(&self) -> iter::Chain<Range<usize>, Range<usize>> {
        (0..self.test.start).chain(self.test.end..self.total)
    }

    #[must_use]
    pub fn test_len(&self) -> usize {
        self.test.len()
    }

    #[must_use]
    pub fn train_len(&self) -> usize {
        self.total - self.test.len()
    }
}
