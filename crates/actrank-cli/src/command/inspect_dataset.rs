use std::path::PathBuf;

use actrank_data::dataset::Dataset;
use actrank_stats::descriptive::DescriptiveStats;
use anyhow::Context;
use serde::Serialize;

use crate::{config::ConfigArg, util};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct InspectDatasetArg {
    #[clap(flatten)]
    config: ConfigArg,
    /// Output file path (stdout if omitted)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
struct DatasetReport {
    task: u32,
    samples: usize,
    state_width: usize,
    action_width: usize,
    max_actions: usize,
    input_width: usize,
    /// Samples with a single legal action.
    forced_decisions: usize,
    /// Samples carrying per-action metrics.
    with_metrics: usize,
    legal_actions: DescriptiveStats,
    /// Histogram of legal-action counts; index `i` counts samples with `i + 1` actions.
    legal_action_histogram: Vec<usize>,
}

impl DatasetReport {
    #[expect(clippy::cast_precision_loss)]
    fn new(task: u32, dataset: &Dataset) -> Option<Self> {
        let metadata = dataset.metadata();
        let samples = dataset.samples();
        let mut histogram = vec![0; metadata.max_actions];
        for sample in samples {
            histogram[sample.legal_actions() - 1] += 1;
        }
        Some(Self {
            task,
            samples: samples.len(),
            state_width: metadata.state_width,
            action_width: metadata.action_width,
            max_actions: metadata.max_actions,
            input_width: metadata.input_width(),
            forced_decisions: histogram.first().copied().unwrap_or(0),
            with_metrics: samples.iter().filter(|s| s.metrics.is_some()).count(),
            legal_actions: DescriptiveStats::new(
                samples.iter().map(|s| s.legal_actions() as f32),
            )?,
            legal_action_histogram: histogram,
        })
    }
}

pub(crate) fn run(arg: &InspectDatasetArg) -> anyhow::Result<()> {
    let config = arg.config.resolve()?;
    let paths = config.dataset_paths();
    let mask = config.feature_mask()?;
    let dataset = Dataset::load(&paths, config.samples, mask.as_ref())
        .with_context(|| format!("Failed to load dataset {}", paths.samples.display()))?;
    let report = DatasetReport::new(config.task, &dataset)
        .ok_or_else(|| anyhow::anyhow!("Dataset {} is empty", paths.samples.display()))?;
    util::save_json(&report, arg.output.as_deref())
}

#[cfg(test)]
mod tests {
    use actrank_data::{metadata::DatasetMetadata, sample::Sample};

    use super::*;

    fn sample(legal: usize, metrics: bool) -> Sample {
        Sample {
            state: vec![0.0],
            actions: vec![vec![1.0]; legal],
            taken: 0,
            metrics: metrics.then(|| vec![0.5; legal]),
        }
    }

    #[test]
    fn test_report_counts_legal_actions() {
        let metadata = DatasetMetadata {
            state_width: 1,
            action_width: 1,
            max_actions: 4,
        };
        let dataset = Dataset::from_samples(
            metadata,
            vec![
                sample(1, false),
                sample(3, true),
                sample(4, false),
                sample(4, true),
            ],
        )
        .unwrap();
        let report = DatasetReport::new(9, &dataset).unwrap();
        assert_eq!(report.samples, 4);
        assert_eq!(report.input_width, 2);
        assert_eq!(report.forced_decisions, 1);
        assert_eq!(report.with_metrics, 2);
        assert_eq!(report.legal_action_histogram, vec![1, 0, 1, 2]);
        assert_eq!(report.legal_actions.mean, 3.0);
        assert_eq!(report.legal_actions.max, 4.0);
    }
}
