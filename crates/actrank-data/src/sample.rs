//! A single recorded human decision.
//!
//! # Serialization
//!
//! Samples are stored one per line as JSON:
//!
//! ```json
//! {"state":[0.0,1.0,3.0],"actions":[[1.0,0.0],[0.0,1.0]],"taken":1,"metrics":[0.2,0.7]}
//! ```
//!
//! - `state`: features of the game state (shared by every legal action)
//! - `actions`: one feature vector per legal action; its length is the legal action count
//! - `taken`: index of the action the human chose
//! - `metrics`: optional continuous quality value per legal action

use serde::{Deserialize, Serialize};

use crate::{mask::FeatureMask, metadata::DatasetMetadata};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Sample {
    pub state: Vec<f32>,
    pub actions: Vec<Vec<f32>>,
    pub taken: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum SampleError {
    #[display("state has {actual} features, expected {expected}")]
    StateWidth { expected: usize, actual: usize },
    #[display("action {action} has {actual} features, expected {expected}")]
    ActionWidth {
        action: usize,
        expected: usize,
        actual: usize,
    },
    #[display("sample has no legal actions")]
    NoLegalActions,
    #[display("sample has {count} legal actions, more than the maximum {max}")]
    TooManyActions { count: usize, max: usize },
    #[display("taken action {taken} is not one of the {legal} legal actions")]
    TakenOutOfRange { taken: usize, legal: usize },
    #[display("sample has {actual} action metrics for {expected} legal actions")]
    MetricsLength { expected: usize, actual: usize },
    #[display("sample has a non-finite {part} value")]
    NonFinite { part: &'static str },
}

impl Sample {
    /// Size of the legal-action set at this decision point.
    #[must_use]
    pub fn legal_actions(&self) -> usize {
        self.actions.len()
    }

    /// Quality metric of action `index`, `0.0` when the sample carries no metrics.
    #[must_use]
    pub fn metric(&self, index: usize) -> f32 {
        self.metrics
            .as_ref()
            .and_then(|m| m.get(index).copied())
            .unwrap_or(0.0)
    }

    pub fn validate(&self, metadata: &DatasetMetadata) -> Result<(), SampleError> {
        if self.state.len() != metadata.state_width {
            return Err(SampleError::StateWidth {
                expected: metadata.state_width,
                actual: self.state.len(),
            });
        }
        let legal = self.legal_actions();
        if legal == 0 {
            return Err(SampleError::NoLegalActions);
        }
        if legal > metadata.max_actions {
            return Err(SampleError::TooManyActions {
                count: legal,
                max: metadata.max_actions,
            });
        }
        if let Some((action, row)) = self
            .actions
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != metadata.action_width)
        {
            return Err(SampleError::ActionWidth {
                action,
                expected: metadata.action_width,
                actual: row.len(),
            });
        }
        if self.taken >= legal {
            return Err(SampleError::TakenOutOfRange {
                taken: self.taken,
                legal,
            });
        }
        if let Some(metrics) = &self.metrics
            && metrics.len() != legal
        {
            return Err(SampleError::MetricsLength {
                expected: legal,
                actual: metrics.len(),
            });
        }
        let all_finite = |values: &[f32]| values.iter().all(|v| v.is_finite());
        if !all_finite(&self.state) {
            return Err(SampleError::NonFinite { part: "state" });
        }
        if !self.actions.iter().all(|row| all_finite(row)) {
            return Err(SampleError::NonFinite { part: "action" });
        }
        if self.metrics.as_deref().is_some_and(|m| !all_finite(m)) {
            return Err(SampleError::NonFinite { part: "metric" });
        }
        Ok(())
    }

    #[must_use]
    pub fn masked(&self, mask: &FeatureMask) -> Self {
        Self {
            state: mask.apply_state(&self.state),
            actions: self
                .actions
                .iter()
                .map(|row| mask.apply_action(row))
                .collect(),
            taken: self.taken,
            metrics: self.metrics.clone(),
        }
    }
}
