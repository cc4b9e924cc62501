use clap::Args;

use portfolio_mc_core::config::shard_index_from_env;
use portfolio_mc_core::pipeline::{invoke_pipeline, invoke_shard};
use portfolio_mc_core::storage::{CsvPriceSource, PriceSource};
use portfolio_mc_core::types::InvocationResult;

use super::Workspace;

/// Arguments for simulating one shard
#[derive(Args)]
pub struct SimulateArgs {
    /// Shard to simulate (defaults to AWS_BATCH_JOB_ARRAY_INDEX, then 0)
    #[arg(long)]
    pub shard_index: Option<usize>,
}

/// Arguments for a full local run
#[derive(Args)]
pub struct RunArgs {
    /// CSV of closing prices to ingest first; skipped when the raw table is
    /// already stored
    #[arg(long)]
    pub prices: Option<String>,
}

pub fn run_simulate(
    ws: &Workspace,
    args: SimulateArgs,
) -> Result<InvocationResult, Box<dyn std::error::Error>> {
    let shard_index = match args.shard_index {
        Some(index) => index,
        None => shard_index_from_env()?,
    };
    Ok(invoke_shard(&ws.objects, &ws.metadata, &ws.config, shard_index))
}

pub fn run_all(ws: &Workspace, args: RunArgs) -> Result<InvocationResult, Box<dyn std::error::Error>> {
    let source = args.prices.map(CsvPriceSource::new);
    Ok(invoke_pipeline(
        source.as_ref().map(|s| s as &dyn PriceSource),
        &ws.objects,
        &ws.metadata,
        &ws.config,
    ))
}
