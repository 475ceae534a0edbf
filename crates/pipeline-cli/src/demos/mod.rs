//! Bundled demo pipelines, one module each, wired as subcommands instead
//! of standalone binaries.

mod balance_compare;
mod balance_simple;
mod scale_compare;
mod scale_simple;

use pipeline::{RunReport, RuntimeConfig};

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum Demo {
    ScaleSimple,
    ScaleCompare,
    BalanceSimple,
    BalanceCompare,
}

impl Demo {
    pub async fn run(self, config: RuntimeConfig) -> RunReport {
        match self {
            Demo::ScaleSimple => scale_simple::run(config).await,
            Demo::ScaleCompare => scale_compare::run(config).await,
            Demo::BalanceSimple => balance_simple::run(config).await,
            Demo::BalanceCompare => balance_compare::run(config).await,
        }
    }
}
