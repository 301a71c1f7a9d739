//! Hidden-feature masking.
//!
//! Some recorded features describe information the decision-maker could not observe
//! (e.g. opponents' hidden hands). A [`FeatureMask`] drops the same number of columns
//! from the state part and from the action part of every sample, so a masked dataset
//! keeps a fixed, known shape (see [`DatasetMetadata::masked`]).

use std::collections::BTreeSet;

use crate::metadata::DatasetMetadata;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureMask {
    state: BTreeSet<usize>,
    action: BTreeSet<usize>,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum MaskError {
    #[display("hidden-feature mask is empty")]
    Empty,
    #[display(
        "hidden-feature mask drops {state} state features but {action} action features; counts must match"
    )]
    CountMismatch { state: usize, action: usize },
    #[display("hidden {part} feature index {index} is out of range for width {width}")]
    OutOfRange {
        part: &'static str,
        index: usize,
        width: usize,
    },
}

impl FeatureMask {
    /// Duplicate indices are collapsed before the counts are compared.
    pub fn new<S, A>(state: S, action: A) -> Result<Self, MaskError>
    where
        S: IntoIterator<Item = usize>,
        A: IntoIterator<Item = usize>,
    {
        let state = state.into_iter().collect::<BTreeSet<_>>();
        let action = action.into_iter().collect::<BTreeSet<_>>();
        if state.is_empty() && action.is_empty() {
            return Err(MaskError::Empty);
        }
        if state.len() != action.len() {
            return Err(MaskError::CountMismatch {
                state: state.len(),
                action: action.len(),
            });
        }
        Ok(Self { state, action })
    }

    /// Number of columns removed from each of the state and action parts.
    #[must_use]
    pub fn dropped_count(&self) -> usize {
        self.state.len()
    }

    /// Checks that every index exists in the unmasked shape and that something is left.
    pub fn check(&self, metadata: &DatasetMetadata) -> Result<(), MaskError> {
        for (part, indices, width) in [
            ("state", &self.state, metadata.state_width),
            ("action", &self.action, metadata.action_width),
        ] {
            if let Some(&index) = indices.iter().find(|&&i| i >= width) {
                return Err(MaskError::OutOfRange { part, index, width });
            }
            if indices.len() >= width {
                return Err(MaskError::OutOfRange {
                    part,
                    index: width,
                    width,
                });
            }
        }
        Ok(())
    }

    /// Dropped state column indices, ascending.
    pub fn hidden_state(&self) -> impl Iterator<Item = usize> + '_ {
        self.state.iter().copied()
    }

    /// Dropped action column indices, ascending.
    pub fn hidden_action(&self) -> impl Iterator<Item = usize> + '_ {
        self.action.iter().copied()
    }

    #[must_use]
    pub fn apply_state(&self, values: &[f32]) -> Vec<f32> {
        drop_indices(values, &self.state)
    }

    #[must_use]
    pub fn apply_action(&self, values: &[f32]) -> Vec<f32> {
        drop_indices(values, &self.action)
    }
}

fn drop_indices(values: &[f32], dropped: &BTreeSet<usize>) -> Vec<f32> {
    values
        .iter()
        .enumerate()
        .filter(|(i, _)| !dropped.contains(i))
        .map(|(_, v)| *v)
        .collect()
}
