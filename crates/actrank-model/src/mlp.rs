//! Multi-layer perceptron scorer.
//!
//! Each state-action row is pushed through a stack of dense layers and a single sigmoid
//! output unit. Training minimizes binary cross-entropy between that output and the row
//! target, with RMSProp-scaled gradient steps.
//!
//! ```text
//! row (state ++ action) ─▶ dense(h₁, act₁) ─▶ … ─▶ dense(hₙ, actₙ) ─▶ dense(1, sigmoid) ─▶ score
//! ```
//!
//! Weights use Xavier-normal initialization (`σ² = 2 / (fan_in + fan_out)`) drawn from a
//! [`Pcg64`] seeded by [`ScorerBuilder::build`], so the same seed always yields the same
//! network.

use rand::{Rng as _, SeedableRng as _};
use rand_distr::StandardNormal;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::{
    activation::Activation,
    matrix::FeatureMatrix,
    scorer::{self, Scorer, ScorerBuilder, ScorerError, TrainingExample},
};

const RMS_EPSILON: f32 = 1e-8;

/// One hidden layer of the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct HiddenLayer {
    pub units: usize,
    pub activation: Activation,
}

#[derive(Debug, Clone)]
pub struct MlpScorerBuilder {
    pub input_width: usize,
    pub hidden_layers: Vec<HiddenLayer>,
    pub learning_rate: f32,
    /// RMSProp decay of the squared-gradient average.
    pub rms_decay: f32,
}

impl ScorerBuilder for MlpScorerBuilder {
    type Scorer = MlpScorer;

    fn build(&self, seed: u64) -> MlpScorer {
        let mut rng = Pcg64::seed_from_u64(seed);
        let mut layers = Vec::with_capacity(self.hidden_layers.len() + 1);
        let mut fan_in = self.input_width;
        for hidden in &self.hidden_layers {
            layers.push(DenseLayer::xavier(
                fan_in,
                hidden.units,
                hidden.activation,
                &mut rng,
            ));
            fan_in = hidden.units;
        }
        layers.push(DenseLayer::xavier(fan_in, 1, Activation::Sigmoid, &mut rng));
        MlpScorer {
            input_width: self.input_width,
            layers,
            learning_rate: self.learning_rate,
            rms_decay: self.rms_decay,
        }
    }
}

#[derive(Debug, Clone)]
struct DenseLayer {
    inputs: usize,
    outputs: usize,
    activation: Activation,
    /// Row-major `outputs × inputs`.
    weights: Vec<f32>,
    biases: Vec<f32>,
    weight_cache: Vec<f32>,
    bias_cache: Vec<f32>,
}

impl DenseLayer {
    #[expect(clippy::cast_precision_loss)]
    fn xavier(inputs: usize, outputs: usize, activation: Activation, rng: &mut Pcg64) -> Self {
        let std_dev = (2.0 / (inputs + outputs).max(1) as f32).sqrt();
        let weights = (0..inputs * outputs)
            .map(|_| rng.sample::<f32, _>(StandardNormal) * std_dev)
            .collect();
        Self {
            inputs,
            outputs,
            activation,
            weights,
            biases: vec![0.0; outputs],
            weight_cache: vec![0.0; inputs * outputs],
            bias_cache: vec![0.0; outputs],
        }
    }

    fn forward(&self, input: &[f32]) -> Vec<f32> {
        self.weights
            .chunks_exact(self.inputs.max(1))
            .zip(&self.biases)
            .map(|(w_row, b)| {
                let z = b + w_row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>();
                self.activation.apply(z)
            })
            .collect()
    }
}

/// Gradient buffers matching the shapes of a network's layers.
#[derive(Debug)]
struct Gradients {
    weights: Vec<Vec<f32>>,
    biases: Vec<Vec<f32>>,
}

impl Gradients {
    fn zeros(layers: &[DenseLayer]) -> Self {
        Self {
            weights: layers.iter().map(|l| vec![0.0; l.weights.len()]).collect(),
            biases: layers.iter().map(|l| vec![0.0; l.biases.len()]).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MlpScorer {
    input_width: usize,
    layers: Vec<DenseLayer>,
    learning_rate: f32,
    rms_decay: f32,
}

impl MlpScorer {
    /// Activations of every layer for one row; `[0]` is the input itself.
    fn forward_trace(&self, row: &[f32]) -> Vec<Vec<f32>> {
        let mut trace = Vec::with_capacity(self.layers.len() + 1);
        trace.push(row.to_vec());
        for layer in &self.layers {
            let next = layer.forward(&trace[trace.len() - 1]);
            trace.push(next);
        }
        trace
    }

    fn score_row(&self, row: &[f32]) -> f32 {
        let mut activations = row.to_vec();
        for layer in &self.layers {
            activations = layer.forward(&activations);
        }
        activations[0]
    }

    /// Accumulates gradients of BCE loss for one row; returns the row loss.
    fn backward(&self, row: &[f32], target: f32, grads: &mut Gradients) -> f32 {
        let trace = self.forward_trace(row);
        let output = trace[trace.len() - 1][0];
        // sigmoid output + BCE collapses to (y - t) at the pre-activation
        let mut delta = vec![output - target];

        for (index, layer) in self.layers.iter().enumerate().rev() {
            let input = &trace[index];
            let grad_w = &mut grads.weights[index];
            let grad_b = &mut grads.biases[index];
            for (o, d) in delta.iter().enumerate() {
                grad_b[o] += d;
                let offset = o * layer.inputs;
                for (i, x) in input.iter().enumerate() {
                    grad_w[offset + i] += d * x;
                }
            }
            if index == 0 {
                break;
            }
            let below = &self.layers[index - 1];
            delta = (0..layer.inputs)
                .map(|i| {
                    let back = (0..layer.outputs)
                        .map(|o| layer.weights[o * layer.inputs + i] * delta[o])
                        .sum::<f32>();
                    back * below.activation.derivative_from_output(input[i])
                })
                .collect();
        }
        scorer::binary_cross_entropy(output, target)
    }

    fn apply_rmsprop(&mut self, grads: &Gradients, rows: usize) {
        #[expect(clippy::cast_precision_loss)]
        let scale = 1.0 / rows as f32;
        let (lr, decay) = (self.learning_rate, self.rms_decay);
        let update = |param: &mut f32, cache: &mut f32, grad: f32| {
            let g = grad * scale;
            *cache = decay * *cache + (1.0 - decay) * g * g;
            *param -= lr * g / (cache.sqrt() + RMS_EPSILON);
        };
        for (index, layer) in self.layers.iter_mut().enumerate() {
            for ((w, c), g) in layer
                .weights
                .iter_mut()
                .zip(&mut layer.weight_cache)
                .zip(&grads.weights[index])
            {
                update(w, c, *g);
            }
            for ((b, c), g) in layer
                .biases
                .iter_mut()
                .zip(&mut layer.bias_cache)
                .zip(&grads.biases[index])
            {
                update(b, c, *g);
            }
        }
    }
}

impl Scorer for MlpScorer {
    fn input_width(&self) -> usize {
        self.input_width
    }

    fn train_step(&mut self, batch: &[TrainingExample]) -> Result<(), ScorerError> {
        let mut grads = Gradients::zeros(&self.layers);
        let mut rows = 0;
        let mut loss = 0.0;
        for example in batch {
            scorer::check_width(self.input_width, &example.features)?;
            for (row, target) in example.features.iter_rows().zip(&example.targets) {
                loss += self.backward(row, *target, &mut grads);
                rows += 1;
            }
        }
        if rows == 0 {
            return Err(ScorerError::EmptyBatch);
        }
        if !loss.is_finite() {
            return Err(ScorerError::Diverged);
        }
        self.apply_rmsprop(&grads, rows);
        Ok(())
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f32>, ScorerError> {
        scorer::check_width(self.input_width, features)?;
        Ok(features.iter_rows().map(|row| self.score_row(row)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(hidden: &[HiddenLayer]) -> MlpScorerBuilder {
        MlpScorerBuilder {
            input_width: 3,
            hidden_layers: hidden.to_vec(),
            learning_rate: 0.01,
            rms_decay: 0.9,
        }
    }

    fn one_hot_example(rows: &[[f32; 3]], taken: usize) -> TrainingExample {
        let targets = (0..rows.len())
            .map(|i| if i == taken { 1.0 } else { 0.0 })
            .collect();
        TrainingExample::new(FeatureMatrix::from_rows(3, rows), targets)
    }

    const HIDDEN: [HiddenLayer; 2] = [
        HiddenLayer {
            units: 8,
            activation: Activation::Sigmoid,
        },
        HiddenLayer {
            units: 8,
            activation: Activation::Relu,
        },
    ];

    #[test]
    fn test_scores_are_probabilities() {
        let scorer = builder(&HIDDEN).build(123);
        let m = FeatureMatrix::from_rows(3, [[0.5_f32, -1.0, 2.0], [0.0, 0.0, 0.0]]);
        let scores = scorer.predict(&m).unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_seeded_build_is_deterministic() {
        let b = builder(&HIDDEN);
        let m = FeatureMatrix::from_rows(3, [[0.1_f32, 0.2, 0.3]]);
        let batch = [one_hot_example(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], 0)];

        let mut s1 = b.build(9);
        let mut s2 = b.build(9);
        for _ in 0..5 {
            s1.train_step(&batch).unwrap();
            s2.train_step(&batch).unwrap();
        }
        assert_eq!(s1.predict(&m).unwrap(), s2.predict(&m).unwrap());
    }

    #[test]
    fn test_training_reduces_loss() {
        let mut net = builder(&HIDDEN).build(5);
        let batch = [
            one_hot_example(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], 0),
            one_hot_example(&[[0.0, 0.0, 1.0], [1.0, 0.0, 0.0]], 1),
        ];
        let loss = |s: &MlpScorer| -> f32 {
            batch
                .iter()
                .flat_map(|ex| {
                    let out = s.predict(&ex.features).unwrap();
                    out.into_iter()
                        .zip(ex.targets.clone())
                        .map(|(o, t)| scorer::binary_cross_entropy(o, t))
                        .collect::<Vec<_>>()
                })
                .sum()
        };
        let before = loss(&net);
        for _ in 0..100 {
            net.train_step(&batch).unwrap();
        }
        assert!(loss(&net) < before);
    }

    #[test]
    fn test_no_hidden_layers_is_logistic() {
        let scorer = builder(&[]).build(0);
        assert_eq!(scorer.layers.len(), 1);
        assert_eq!(scorer.input_width(), 3);
    }
}
