//! Rank-based evaluation of a scorer against recorded decisions.
//!
//! # Per-Sample Scoring
//!
//! For every sample the scorer produces one raw score per legal action. From these:
//!
//! 1. **Selection** - the [`SelectionPolicy`] turns raw scores into the compared vector:
//!    a softmax distribution, or a one-hot vector at the arg-max
//! 2. **Loss** - cross-entropy of the selected vector against the reference target
//!    (the training target normalized to a distribution)
//! 3. **Accuracy** - the sample is correct when the highest raw score is at the
//!    reference's top action
//! 4. **Rank** - 1-based position of the reference's top action when legal actions are
//!    ordered by descending raw score
//!
//! Ties are always broken by the lowest action index, both for the arg-max and for
//! ranking. A sample with a single legal action therefore always has rank 1 and is
//! always correct; it is counted like any other sample.
//!
//! # Aggregation
//!
//! [`evaluate`] folds per-sample outcomes into a fresh [`EvaluationTally`] and
//! finishes it into an [`EvaluationSummary`]: mean loss (`score`), accuracy, and mean
//! rank. The tally is a value, never reset or shared between passes.

use actrank_data::{sample::Sample, transform::SampleTransform};
use actrank_model::{Scorer, ScorerError};
use serde::{Deserialize, Serialize};

const MIN_PROBABILITY: f32 = 1e-7;

/// How raw scores are turned into the vector compared against the reference.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, derive_more::FromStr,
)]
#[serde(rename_all = "lowercase")]
pub enum SelectionPolicy {
    /// Softmax over the legal actions.
    #[default]
    Distribution,
    /// One-hot at the highest-scoring legal action.
    ArgMax,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum EvaluationError {
    #[display("scorer failed on sample {sample}")]
    Scorer { sample: usize, source: ScorerError },
    #[display(
        "sample {sample} has {legal_actions} legal actions but the scorer returned {scores} scores"
    )]
    ScoreWidthMismatch {
        sample: usize,
        legal_actions: usize,
        scores: usize,
    },
    #[display("scorer returned a non-finite score for sample {sample}")]
    NonFiniteScore { sample: usize },
    #[display("cannot evaluate an empty set of samples")]
    Empty,
}

/// Result of one evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct EvaluationSummary {
    pub samples: usize,
    /// Mean per-sample cross-entropy (lower is better).
    pub score: f32,
    /// Fraction of samples whose top-scored action is the reference action.
    pub accuracy: f32,
    /// Mean rank of the reference action (1 is best).
    pub mean_rank: f32,
}

/// Contribution of one sample to an evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleOutcome {
    pub loss: f32,
    pub correct: bool,
    pub rank: usize,
}

/// Running totals of an evaluation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EvaluationTally {
    samples: usize,
    loss: f64,
    correct: usize,
    rank_sum: usize,
}

impl EvaluationTally {
    #[must_use]
    pub fn add(self, outcome: SampleOutcome) -> Self {
        Self {
            samples: self.samples + 1,
            loss: self.loss + f64::from(outcome.loss),
            correct: self.correct + usize::from(outcome.correct),
            rank_sum: self.rank_sum + outcome.rank,
        }
    }

    /// `None` when no sample was added.
    #[expect(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    #[must_use]
    pub fn finish(self) -> Option<EvaluationSummary> {
        if self.samples == 0 {
            return None;
        }
        let n = self.samples as f64;
        Some(EvaluationSummary {
            samples: self.samples,
            score: (self.loss / n) as f32,
            accuracy: (self.correct as f64 / n) as f32,
            mean_rank: (self.rank_sum as f64 / n) as f32,
        })
    }
}

/// Index of the highest value; the lowest index wins ties.
///
/// # Panics
///
/// Panics if `values` is empty.
#[must_use]
pub fn arg_max(values: &[f32]) -> usize {
    assert!(!values.is_empty(), "arg_max of an empty slice");
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// 1-based rank of `index` when values are sorted descending, ties by lowest index.
#[expect(clippy::float_cmp)]
#[must_use]
pub fn rank_of(values: &[f32], index: usize) -> usize {
    let target = values[index];
    1 + values
        .iter()
        .enumerate()
        .filter(|&(j, v)| *v > target || (*v == target && j < index))
        .count()
}

/// Numerically stable softmax.
#[must_use]
pub fn softmax(values: &[f32]) -> Vec<f32> {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps = values.iter().map(|v| (v - max).exp()).collect::<Vec<_>>();
    let sum = exps.iter().sum::<f32>();
    exps.into_iter().map(|e| e / sum).collect()
}

impl SelectionPolicy {
    #[must_use]
    pub fn select(self, scores: &[f32]) -> Vec<f32> {
        match self {
            Self::Distribution => softmax(scores),
            Self::ArgMax => {
                let mut one_hot = vec![0.0; scores.len()];
                one_hot[arg_max(scores)] = 1.0;
                one_hot
            }
        }
    }
}

/// Normalizes the training target into a distribution over legal actions.
///
/// Negative entries count as zero; a target with no positive mass falls back to the
/// one-hot of the taken action.
fn reference_distribution(target: &[f32], taken: usize) -> Vec<f32> {
    let sum = target.iter().map(|t| t.max(0.0)).sum::<f32>();
    if sum > 0.0 {
        target.iter().map(|t| t.max(0.0) / sum).collect()
    } else {
        let mut one_hot = vec![0.0; target.len()];
        one_hot[taken] = 1.0;
        one_hot
    }
}

fn cross_entropy(reference: &[f32], predicted: &[f32]) -> f32 {
    -reference
        .iter()
        .zip(predicted)
        .filter(|&(r, _)| *r > 0.0)
        .map(|(r, p)| r * p.clamp(MIN_PROBABILITY, 1.0).ln())
        .sum::<f32>()
}

/// Scores one decision given the scorer's raw output and the sample's training target.
///
/// # Panics
///
/// Panics if `scores` and `target` differ in length or are empty, or `taken` is out of
/// range.
#[must_use]
pub fn score_sample(
    scores: &[f32],
    target: &[f32],
    taken: usize,
    policy: SelectionPolicy,
) -> SampleOutcome {
    assert_eq!(scores.len(), target.len(), "one score per legal action");
    let reference = reference_distribution(target, taken);
    let reference_top = arg_max(&reference);
    let selected = policy.select(scores);
    SampleOutcome {
        loss: cross_entropy(&reference, &selected),
        correct: arg_max(scores) == reference_top,
        rank: rank_of(scores, reference_top),
    }
}

/// Evaluates `scorer` over `samples`, transforming each exactly as for training.
///
/// A scorer that returns a different number of scores than the sample has legal
/// actions, or any NaN or infinite score, fails the pass.
pub fn evaluate<'a, S, I>(
    scorer: &S,
    samples: I,
    transform: &SampleTransform,
    policy: SelectionPolicy,
) -> Result<EvaluationSummary, EvaluationError>
where
    S: Scorer + ?Sized,
    I: IntoIterator<Item = &'a Sample>,
{
    samples
        .into_iter()
        .enumerate()
        .try_fold(EvaluationTally::default(), |tally, (index, sample)| {
            let example = transform.example(sample);
            let scores = scorer
                .predict(&example.features)
                .map_err(|source| EvaluationError::Scorer {
                    sample: index,
                    source,
                })?;
            if scores.len() != sample.legal_actions() {
                return Err(EvaluationError::ScoreWidthMismatch {
                    sample: index,
                    legal_actions: sample.legal_actions(),
                    scores: scores.len(),
                });
            }
            if !scores.iter().all(|s| s.is_finite()) {
                return Err(EvaluationError::NonFiniteScore { sample: index });
            }
            Ok(tally.add(score_sample(
                &scores,
                &example.targets,
                sample.taken,
                policy,
            )))
        })?
        .finish()
        .ok_or(EvaluationError::Empty)
}
