use actrank_data::{
    dataset::Dataset, normalization::NormalizationParams, transform::SampleTransform,
};
use actrank_model::{ScorerBuilder, linear::LinearScorerBuilder, mlp::MlpScorerBuilder};
use actrank_validation::{CrossValidation, ResultStore};
use anyhow::Context;

use crate::config::{ConfigArg, ExperimentConfig, ModelKind};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct CrossValidateArg {
    #[clap(flatten)]
    config: ConfigArg,
}

pub(crate) fn run(arg: &CrossValidateArg) -> anyhow::Result<()> {
    let config = arg.config.resolve()?;
    log::info!(
        "Task {}: {}-fold cross-validation of the {:?} scorer, {} epochs, {:?} selection",
        config.task,
        config.folds,
        config.model,
        config.epochs,
        config.selection
    );

    let mut store = ResultStore::new(&config.output_dir, config.task)
        .with_config(serde_json::to_value(&config)?);
    for fold in 0..config.folds {
        let dir = store.fold_dir(fold);
        anyhow::ensure!(
            !dir.exists(),
            "Results of a previous run found in {}; choose another output directory",
            dir.display()
        );
    }

    let paths = config.dataset_paths();
    let mask = config.feature_mask()?;
    let dataset = Dataset::load(&paths, config.samples, mask.as_ref())
        .with_context(|| format!("Failed to load dataset {}", paths.samples.display()))?;
    if let Some(mask) = &mask {
        log::info!(
            "Masked {} state and {} action features",
            mask.dropped_count(),
            mask.dropped_count()
        );
    }

    let normalization = if config.normalization {
        log::info!("Checking normalization parameters...");
        let params = NormalizationParams::load_or_compute(
            &paths.normalization,
            dataset.metadata(),
            dataset.samples(),
            mask.as_ref(),
        )?;
        Some(params)
    } else {
        None
    };
    let transform = SampleTransform::new(config.target_weights(), normalization);

    let input_width = dataset.metadata().input_width();
    match config.model {
        ModelKind::Linear => {
            let builder = LinearScorerBuilder::new(input_width, config.learning_rate);
            cross_validate(builder, &config, &dataset, &transform, &mut store)?;
        }
        ModelKind::Mlp => {
            let builder = MlpScorerBuilder {
                input_width,
                hidden_layers: config.hidden_layers.clone(),
                learning_rate: config.learning_rate,
                rms_decay: config.rms_decay,
            };
            cross_validate(builder, &config, &dataset, &transform, &mut store)?;
        }
    }

    eprintln!(
        "Cross-validation of task {} completed: {}",
        config.task,
        store.report_path().display()
    );
    Ok(())
}

fn cross_validate<B>(
    builder: B,
    config: &ExperimentConfig,
    dataset: &Dataset,
    transform: &SampleTransform,
    store: &mut ResultStore,
) -> anyhow::Result<()>
where
    B: ScorerBuilder,
{
    let cv = CrossValidation::new(builder, config.cross_validation(), dataset, transform)
        .context("Invalid cross-validation configuration")?;
    cv.run(store).context("Cross-validation failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use actrank_data::{dataset::DatasetPaths, metadata::DatasetMetadata};
    use actrank_validation::results::CrossValidationReport;
    use clap::Parser;

    use super::*;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[clap(flatten)]
        arg: CrossValidateArg,
    }

    fn write_dataset(dir: &std::path::Path) {
        let paths = DatasetPaths::new(dir, "human", 5);
        fs::create_dir_all(paths.samples.parent().unwrap()).unwrap();
        DatasetMetadata {
            state_width: 2,
            action_width: 1,
            max_actions: 3,
        }
        .write(&paths.metadata)
        .unwrap();
        let lines = (0..8)
            .map(|i| {
                let legal = 1 + i % 3;
                let actions = (0..legal)
                    .map(|a| if a == 0 { "[1]" } else { "[0]" })
                    .collect::<Vec<_>>()
                    .join(",");
                format!(r#"{{"state":[{i},1],"actions":[{actions}],"taken":0}}"#)
            })
            .collect::<Vec<_>>();
        fs::write(&paths.samples, lines.join("\n")).unwrap();
    }

    #[test]
    fn test_cross_validate_writes_fold_results_and_report() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path());
        let output = dir.path().join("out");
        let data_dir = dir.path().to_str().unwrap();
        let output_dir = output.to_str().unwrap();
        let cli = TestCli::parse_from([
            "test",
            "--task",
            "5",
            "--data-dir",
            data_dir,
            "--output-dir",
            output_dir,
            "--folds",
            "2",
            "--epochs",
            "2",
            "--batch-size",
            "3",
            "--model",
            "linear",
        ]);
        run(&cli.arg).unwrap();

        for fold in ["0", "1"] {
            assert!(output.join(fold).join("metrics.json").exists());
            assert!(output.join(fold).join("metrics.csv").exists());
        }
        let report: CrossValidationReport =
            crate::util::read_json_file("report", output.join("cv-results-5.json")).unwrap();
        assert_eq!(report.folds, 2);
        assert_eq!(report.epochs.len(), 2);
        assert!(
            dir.path()
                .join("humanCV")
                .join("normalisation-5.json")
                .exists()
        );

        // a second run into the same directory is refused before any work
        assert!(run(&cli.arg).is_err());
    }
}
