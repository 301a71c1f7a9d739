use clap::{Parser, Subcommand};

use self::{
    compute_normalization::ComputeNormalizationArg, cross_validate::CrossValidateArg,
    inspect_dataset::InspectDatasetArg,
};

mod compute_normalization;
mod cross_validate;
mod inspect_dataset;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Run k-fold cross-validation and write per-fold and summary results
    CrossValidate(#[clap(flatten)] CrossValidateArg),
    /// Compute and cache feature normalization parameters
    ComputeNormalization(#[clap(flatten)] ComputeNormalizationArg),
    /// Print dataset metadata and legal-action statistics
    InspectDataset(#[clap(flatten)] InspectDatasetArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::CrossValidate(arg) => cross_validate::run(&arg)?,
        Mode::ComputeNormalization(arg) => compute_normalization::run(&arg)?,
        Mode::InspectDataset(arg) => inspect_dataset::run(&arg)?,
    }
    Ok(())
}
