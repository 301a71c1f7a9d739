//! The capability surface the cross-validation harness consumes.
//!
//! The harness never inspects a scorer's internals. It needs exactly three things:
//!
//! - a fresh untrained instance per fold ([`ScorerBuilder::build`]),
//! - one optimization update per batch ([`Scorer::train_step`]),
//! - side-effect-free scoring of a decision's legal actions ([`Scorer::predict`]).

use std::fmt;

use crate::matrix::FeatureMatrix;

/// A decision transformed for training: one feature row and one target per legal action.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub features: FeatureMatrix,
    pub targets: Vec<f32>,
}

impl TrainingExample {
    /// # Panics
    ///
    /// Panics if the number of targets differs from the number of feature rows.
    #[must_use]
    pub fn new(features: FeatureMatrix, targets: Vec<f32>) -> Self {
        assert_eq!(
            features.rows(),
            targets.len(),
            "one target per feature row is required"
        );
        Self { features, targets }
    }

    #[must_use]
    pub fn legal_actions(&self) -> usize {
        self.targets.len()
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ScorerError {
    #[display("feature width {actual} does not match scorer input width {expected}")]
    InputWidthMismatch { expected: usize, actual: usize },
    #[display("training batch is empty")]
    EmptyBatch,
    #[display("training produced a non-finite loss")]
    Diverged,
}

/// A trainable function from per-action feature rows to per-action scores.
pub trait Scorer: fmt::Debug {
    /// Number of features per row this scorer accepts.
    fn input_width(&self) -> usize;

    /// Performs one optimization update over every row of the batch.
    fn train_step(&mut self, batch: &[TrainingExample]) -> Result<(), ScorerError>;

    /// Scores every row of `features`; the result has exactly one entry per row.
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f32>, ScorerError>;
}

/// Produces fresh, untrained scorers.
///
/// The builder owns the architecture and hyperparameters; `build` is called once per
/// fold so folds never share learned state. Two calls with the same seed must produce
/// scorers that behave identically.
pub trait ScorerBuilder: fmt::Debug {
    type Scorer: Scorer;

    fn build(&self, seed: u64) -> Self::Scorer;
}

pub(crate) fn check_width(expected: usize, features: &FeatureMatrix) -> Result<(), ScorerError> {
    if features.cols() == expected {
        Ok(())
    } else {
        Err(ScorerError::InputWidthMismatch {
            expected,
            actual: features.cols(),
        })
    }
}

/// Binary cross-entropy of a sigmoid output against a target in `[0, 1]`.
pub(crate) fn binary_cross_entropy(output: f32, target: f32) -> f32 {
    const EPS: f32 = 1e-7;
    let p = output.clamp(EPS, 1.0 - EPS);
    -(target * p.ln() + (1.0 - target) * (1.0 - p).ln())
}
