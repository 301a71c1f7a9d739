use std::path::{Path, PathBuf};

use actrank_data::{dataset::DatasetPaths, mask::FeatureMask, transform::TargetWeights};
use actrank_model::{activation::Activation, mlp::HiddenLayer};
use actrank_validation::{CrossValidationConfig, SelectionPolicy};
use anyhow::Context;
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::util;

#[derive(
    Default, Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, derive_more::FromStr,
)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ModelKind {
    Linear,
    #[default]
    Mlp,
}

/// Feature indices removed when hidden-feature masking is on.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct HiddenFeatures {
    pub state: Vec<usize>,
    pub action: Vec<usize>,
}

/// Settings of one experiment, read once at startup.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ExperimentConfig {
    pub task: u32,
    pub data_type: String,
    pub data_dir: PathBuf,
    /// Use only the first `samples` samples of the dataset.
    pub samples: Option<usize>,
    pub folds: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub label_weight: f32,
    pub metric_weight: f32,
    pub learning_rate: f32,
    pub rms_decay: f32,
    pub normalization: bool,
    pub mask_hidden_features: bool,
    pub hidden_features: HiddenFeatures,
    pub selection: SelectionPolicy,
    pub model: ModelKind,
    pub hidden_layers: Vec<HiddenLayer>,
    pub seed: u64,
    pub output_dir: PathBuf,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            task: 0,
            data_type: "human".to_owned(),
            data_dir: PathBuf::from("data"),
            samples: None,
            folds: 10,
            epochs: 10,
            batch_size: 32,
            label_weight: 1.0,
            metric_weight: 0.0,
            learning_rate: 0.01,
            rms_decay: 0.9,
            normalization: true,
            mask_hidden_features: false,
            hidden_features: HiddenFeatures::default(),
            selection: SelectionPolicy::Distribution,
            model: ModelKind::Mlp,
            hidden_layers: vec![
                HiddenLayer {
                    units: 256,
                    activation: Activation::Sigmoid,
                },
                HiddenLayer {
                    units: 256,
                    activation: Activation::Relu,
                },
            ],
            seed: 123,
            output_dir: PathBuf::from("cv-output"),
        }
    }
}

impl ExperimentConfig {
    #[must_use]
    pub fn dataset_paths(&self) -> DatasetPaths {
        DatasetPaths::new(&self.data_dir, &self.data_type, self.task)
    }

    /// The feature mask to apply at load time, if masking is enabled.
    pub fn feature_mask(&self) -> anyhow::Result<Option<FeatureMask>> {
        if !self.mask_hidden_features {
            return Ok(None);
        }
        let HiddenFeatures { state, action } = &self.hidden_features;
        let mask = FeatureMask::new(state.iter().copied(), action.iter().copied())
            .context("Invalid hidden_features")?;
        Ok(Some(mask))
    }

    #[must_use]
    pub fn target_weights(&self) -> TargetWeights {
        TargetWeights {
            label: self.label_weight,
            metric: self.metric_weight,
        }
    }

    #[must_use]
    pub fn cross_validation(&self) -> CrossValidationConfig {
        CrossValidationConfig {
            folds: self.folds,
            epochs: self.epochs,
            batch_size: self.batch_size,
            seed: self.seed,
            selection: self.selection,
        }
    }
}

/// Config file and per-field overrides shared by every command.
#[derive(Default, Debug, Clone, Args)]
pub(crate) struct ConfigArg {
    /// JSON experiment configuration; fields not given keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Task identifier
    #[arg(long)]
    task: Option<u32>,
    /// Data type tag (dataset directory prefix)
    #[arg(long)]
    data_type: Option<String>,
    /// Root directory of the datasets
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Use only the first N samples
    #[arg(long)]
    samples: Option<usize>,
    /// Number of folds
    #[arg(long)]
    folds: Option<usize>,
    /// Training epochs per fold
    #[arg(long)]
    epochs: Option<usize>,
    /// Samples per training step
    #[arg(long)]
    batch_size: Option<usize>,
    /// Weight of the taken-action label in the training target
    #[arg(long)]
    label_weight: Option<f32>,
    /// Weight of the per-action metric in the training target
    #[arg(long)]
    metric_weight: Option<f32>,
    #[arg(long)]
    learning_rate: Option<f32>,
    /// Normalize features (true/false)
    #[arg(long)]
    normalization: Option<bool>,
    /// Drop the configured hidden features (true/false)
    #[arg(long)]
    mask_hidden_features: Option<bool>,
    /// Selection policy: distribution or argmax
    #[arg(long)]
    selection: Option<SelectionPolicy>,
    /// Scorer: linear or mlp
    #[arg(long)]
    model: Option<ModelKind>,
    #[arg(long)]
    seed: Option<u64>,
    /// Directory receiving per-fold results and the final report
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

macro_rules! override_fields {
    ($arg:expr, $config:expr, $($field:ident),* $(,)?) => {
        $(
            if let Some(value) = $arg.$field.clone() {
                $config.$field = value;
            }
        )*
    };
}

impl ConfigArg {
    pub fn resolve(&self) -> anyhow::Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => read_config_file(path)?,
            None => ExperimentConfig::default(),
        };
        override_fields!(
            self,
            config,
            task,
            data_type,
            data_dir,
            folds,
            epochs,
            batch_size,
            label_weight,
            metric_weight,
            learning_rate,
            normalization,
            mask_hidden_features,
            selection,
            model,
            seed,
            output_dir,
        );
        if self.samples.is_some() {
            config.samples = self.samples;
        }
        Ok(config)
    }
}

fn read_config_file(path: &Path) -> anyhow::Result<ExperimentConfig> {
    util::read_json_file("experiment config", path)
}
