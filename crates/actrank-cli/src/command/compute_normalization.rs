use actrank_data::{dataset::Dataset, normalization::NormalizationParams};
use anyhow::Context;

use crate::config::ConfigArg;

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct ComputeNormalizationArg {
    #[clap(flatten)]
    config: ConfigArg,
    /// Recompute even if cached parameters exist
    #[arg(long)]
    force: bool,
}

pub(crate) fn run(arg: &ComputeNormalizationArg) -> anyhow::Result<()> {
    let config = arg.config.resolve()?;
    let paths = config.dataset_paths();
    let mask = config.feature_mask()?;
    let dataset = Dataset::load(&paths, config.samples, mask.as_ref())
        .with_context(|| format!("Failed to load dataset {}", paths.samples.display()))?;

    let params = if arg.force {
        let params = NormalizationParams::from_samples(
            dataset.metadata(),
            dataset.samples(),
            mask.as_ref(),
        );
        params.save(&paths.normalization)?;
        params
    } else {
        NormalizationParams::load_or_compute(
            &paths.normalization,
            dataset.metadata(),
            dataset.samples(),
            mask.as_ref(),
        )?
    };

    let constant = params.std_devs.iter().filter(|s| **s <= f32::EPSILON).count();
    eprintln!(
        "Normalization parameters for {} columns ({} rows, {constant} constant) saved to {}",
        params.width(),
        params.rows,
        paths.normalization.display()
    );
    Ok(())
}
