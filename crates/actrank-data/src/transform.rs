use actrank_model::{FeatureMatrix, TrainingExample};
use serde::{Deserialize, Serialize};

use crate::{normalization::NormalizationParams, sample::Sample};

/// Weights combining the taken-action indicator and the per-action quality metric.
///
/// `target[a] = label · [a == taken] + metric · metric[a]`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct TargetWeights {
    pub label: f32,
    pub metric: f32,
}

impl Default for TargetWeights {
    fn default() -> Self {
        Self {
            label: 1.0,
            metric: 0.0,
        }
    }
}

impl TargetWeights {
    #[must_use]
    pub fn target(&self, sample: &Sample) -> Vec<f32> {
        (0..sample.legal_actions())
            .map(|a| {
                let indicator = if a == sample.taken { 1.0 } else { 0.0 };
                self.label * indicator + self.metric * sample.metric(a)
            })
            .collect()
    }
}

/// Turns samples into scorer inputs; used identically for training and evaluation.
#[derive(Debug, Clone)]
pub struct SampleTransform {
    weights: TargetWeights,
    normalization: Option<NormalizationParams>,
}

impl SampleTransform {
    #[must_use]
    pub fn new(weights: TargetWeights, normalization: Option<NormalizationParams>) -> Self {
        Self {
            weights,
            normalization,
        }
    }

    #[must_use]
    pub fn weights(&self) -> TargetWeights {
        self.weights
    }

    /// One row per legal action: the state features followed by that action's features.
    #[must_use]
    pub fn features(&self, sample: &Sample) -> FeatureMatrix {
        let cols = sample.state.len() + sample.actions.first().map_or(0, Vec::len);
        let mut features = FeatureMatrix::with_capacity(sample.legal_actions(), cols);
        for action in &sample.actions {
            features.push_concat(&sample.state, action);
        }
        if let Some(params) = &self.normalization {
            params.normalize(&mut features);
        }
        features
    }

    #[must_use]
    pub fn example(&self, sample: &Sample) -> TrainingExample {
        TrainingExample::new(self.features(sample), self.weights.target(sample))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalization::NormalizationSource;

    fn sample() -> Sample {
        Sample {
            state: vec![1.0, 2.0],
            actions: vec![vec![10.0], vec![20.0], vec![30.0]],
            taken: 2,
            metrics: Some(vec![0.5, 0.0, 1.0]),
        }
    }

    #[test]
    fn test_target_combines_label_and_metric() {
        let weights = TargetWeights {
            label: 0.6,
            metric: 0.4,
        };
        let target = weights.target(&sample());
        assert_eq!(target.len(), 3);
        assert!((target[0] - 0.2).abs() < 1e-6);
        assert_eq!(target[1], 0.0);
        assert!((target[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_metrics_are_zero() {
        let mut s = sample();
        s.metrics = None;
        assert_eq!(TargetWeights::default().target(&s), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_example_rows_are_state_action_pairs() {
        let transform = SampleTransform::new(TargetWeights::default(), None);
        let example = transform.example(&sample());
        assert_eq!(example.legal_actions(), 3);
        assert_eq!(example.features.cols(), 3);
        assert_eq!(example.features.row(1), &[1.0, 2.0, 20.0]);
    }

    #[test]
    fn test_normalization_applies() {
        let params = NormalizationParams {
            source: NormalizationSource::default(),
            rows: 3,
            means: vec![1.0, 2.0, 20.0],
            std_devs: vec![0.0, 0.0, 10.0],
        };
        let transform = SampleTransform::new(TargetWeights::default(), Some(params));
        let features = transform.features(&sample());
        assert_eq!(features.row(0), &[0.0, 0.0, -1.0]);
        assert_eq!(features.row(2), &[0.0, 0.0, 1.0]);
    }
}
