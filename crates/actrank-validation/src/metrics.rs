use serde::{Deserialize, Serialize};

use crate::evaluation::EvaluationSummary;

/// Train and test evaluation of one fold after one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct EpochMetrics {
    /// 1-based epoch number.
    pub epoch: usize,
    pub train_score: f32,
    pub test_score: f32,
    pub train_accuracy: f32,
    pub test_accuracy: f32,
    pub train_rank: f32,
    pub test_rank: f32,
}

impl EpochMetrics {
    #[must_use]
    pub fn new(epoch: usize, train: &EvaluationSummary, test: &EvaluationSummary) -> Self {
        Self {
            epoch,
            train_score: train.score,
            test_score: test.score,
            train_accuracy: train.accuracy,
            test_accuracy: test.accuracy,
            train_rank: train.mean_rank,
            test_rank: test.mean_rank,
        }
    }

    /// Values in [`MetricSeries::CSV_HEADER`] order, without the epoch.
    #[must_use]
    pub fn values(&self) -> [f32; 6] {
        [
            self.train_score,
            self.test_score,
            self.train_accuracy,
            self.test_accuracy,
            self.train_rank,
            self.test_rank,
        ]
    }
}

/// Per-epoch metrics of one fold, in epoch order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MetricSeries {
    pub fold: usize,
    pub epochs: Vec<EpochMetrics>,
}

impl MetricSeries {
    pub const CSV_HEADER: &str =
        "epoch,train_score,test_score,train_accuracy,test_accuracy,train_rank,test_rank";

    #[must_use]
    pub fn new(fold: usize) -> Self {
        Self {
            fold,
            epochs: vec![],
        }
    }

    /// # Panics
    ///
    /// Panics if `metrics` does not continue the epoch sequence.
    pub fn push(&mut self, metrics: EpochMetrics) {
        assert_eq!(
            metrics.epoch,
            self.epochs.len() + 1,
            "epochs must be recorded in order"
        );
        self.epochs.push(metrics);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    #[must_use]
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();
        csv.push_str(Self::CSV_HEADER);
        csv.push('\n');
        for m in &self.epochs {
            let values = m.values().map(|v| v.to_string());
            csv.push_str(&m.epoch.to_string());
            for v in values {
                csv.push(',');
                csv.push_str(&v);
            }
            csv.push('\n');
        }
        csv
    }
}
