//! Trainable action scorers.
//!
//! A scorer maps a feature matrix with one row per legal action (state features
//! followed by that action's features) to one score per row. The cross-validation
//! harness only ever talks to scorers through the [`scorer::Scorer`] and
//! [`scorer::ScorerBuilder`] traits, so any learning algorithm that implements them can
//! be evaluated without touching the harness.
//!
//! # Architecture
//!
//! ```text
//! ScorerBuilder (architecture + hyperparameters)
//!     ↓ build(seed)        one fresh instance per fold
//! Scorer
//!     ├─ train_step(&[TrainingExample])   one optimization update
//!     └─ predict(&FeatureMatrix)          one score per legal action
//! ```
//!
//! # Provided Scorers
//!
//! - [`linear::LinearScorer`] - Logistic regression over state-action rows, plain SGD
//! - [`mlp::MlpScorer`] - Dense network with sigmoid output, RMSProp updates
//!
//! Both are trained with binary cross-entropy between the sigmoid output of each row and
//! that row's target value, averaged over every row of a batch.

pub mod activation;
pub mod linear;
pub mod matrix;
pub mod mlp;
pub mod scorer;

pub use self::{
    matrix::FeatureMatrix,
    scorer::{Scorer, ScorerBuilder, ScorerError, TrainingExample},
};
