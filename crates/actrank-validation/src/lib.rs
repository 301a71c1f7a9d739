//! K-fold cross-validation of action scorers on recorded decisions.
//!
//! # Overview
//!
//! A dataset of decision points (a state, the legal actions, and the action actually
//! taken) is split into contiguous folds. For every fold a fresh scorer is trained on
//! the other folds for a fixed number of epochs; after each epoch both the training and
//! the test part are evaluated. The resulting per-epoch metrics are persisted per fold
//! and summarized across folds at the end.
//!
//! # Modules
//!
//! - [`fold`] - Deterministic contiguous k-fold partitioning
//! - [`evaluation`] - Loss, accuracy and rank of a scorer over a set of samples
//! - [`metrics`] - Per-epoch metric tuples and per-fold series
//! - [`driver`] - The fold/epoch loop
//! - [`results`] - Fold artifact files, their relocation, and the final report
//!
//! # Metrics
//!
//! Every epoch of every fold yields six values:
//!
//! | Metric | Meaning | Range |
//! |--------|---------|-------|
//! | `train_score`, `test_score` | Mean cross-entropy against the reference target | `>= 0` |
//! | `train_accuracy`, `test_accuracy` | Fraction of samples whose top-scored action is the reference action | `[0, 1]` |
//! | `train_rank`, `test_rank` | Mean 1-based rank of the reference action | `[1, max_actions]` |

pub mod driver;
pub mod evaluation;
pub mod fold;
pub mod metrics;
pub mod results;

pub use self::{
    driver::{CrossValidation, CrossValidationConfig, CrossValidationError, ResultSink},
    evaluation::{EvaluationSummary, SelectionPolicy},
    fold::{Fold, FoldPartition},
    metrics::{EpochMetrics, MetricSeries},
    results::ResultStore,
};
