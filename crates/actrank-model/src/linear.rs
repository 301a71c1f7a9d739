//! Logistic regression over state-action rows.
//!
//! Every legal action is scored independently as `sigmoid(w · x + b)`; the weights are
//! shared across actions, so the model learns which combinations of state and action
//! features tend to be chosen.

use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg64;

use crate::{
    activation::sigmoid,
    matrix::FeatureMatrix,
    scorer::{self, Scorer, ScorerBuilder, ScorerError, TrainingExample},
};

#[derive(Debug, Clone)]
pub struct LinearScorerBuilder {
    pub input_width: usize,
    pub learning_rate: f32,
    /// Weights start uniformly in `[-init_range, init_range]`.
    pub init_range: f32,
}

impl LinearScorerBuilder {
    #[must_use]
    pub fn new(input_width: usize, learning_rate: f32) -> Self {
        Self {
            input_width,
            learning_rate,
            init_range: 0.01,
        }
    }
}

impl ScorerBuilder for LinearScorerBuilder {
    type Scorer = LinearScorer;

    fn build(&self, seed: u64) -> LinearScorer {
        let mut rng = Pcg64::seed_from_u64(seed);
        let range = self.init_range.abs();
        let weights = (0..self.input_width)
            .map(|_| {
                if range > 0.0 {
                    rng.random_range(-range..=range)
                } else {
                    0.0
                }
            })
            .collect();
        LinearScorer {
            weights,
            bias: 0.0,
            learning_rate: self.learning_rate,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinearScorer {
    weights: Vec<f32>,
    bias: f32,
    learning_rate: f32,
}

impl LinearScorer {
    #[must_use]
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    fn score_row(&self, row: &[f32]) -> f32 {
        let z = self.bias
            + self
                .weights
                .iter()
                .zip(row)
                .map(|(w, x)| w * x)
                .sum::<f32>();
        sigmoid(z)
    }
}

impl Scorer for LinearScorer {
    fn input_width(&self) -> usize {
        self.weights.len()
    }

    #[expect(clippy::cast_precision_loss)]
    fn train_step(&mut self, batch: &[TrainingExample]) -> Result<(), ScorerError> {
        let mut grad_w = vec![0.0; self.weights.len()];
        let mut grad_b = 0.0;
        let mut rows = 0usize;
        let mut loss = 0.0;
        for example in batch {
            scorer::check_width(self.weights.len(), &example.features)?;
            for (row, target) in example.features.iter_rows().zip(&example.targets) {
                let output = self.score_row(row);
                loss += scorer::binary_cross_entropy(output, *target);
                // d(BCE ∘ sigmoid)/dz
                let delta = output - target;
                for (g, x) in grad_w.iter_mut().zip(row) {
                    *g += delta * x;
                }
                grad_b += delta;
                rows += 1;
            }
        }
        if rows == 0 {
            return Err(ScorerError::EmptyBatch);
        }
        if !loss.is_finite() {
            return Err(ScorerError::Diverged);
        }

        let step = self.learning_rate / rows as f32;
        for (w, g) in self.weights.iter_mut().zip(&grad_w) {
            *w -= step * g;
        }
        self.bias -= step * grad_b;
        log::trace!("linear step: rows={rows} loss={:.5}", loss / rows as f32);
        Ok(())
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f32>, ScorerError> {
        scorer::check_width(self.weights.len(), features)?;
        Ok(features.iter_rows().map(|row| self.score_row(row)).collect())
    }
}
