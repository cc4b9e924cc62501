use clap::Args;

use portfolio_mc_core::pipeline::{invoke_ingest, invoke_statistics};
use portfolio_mc_core::storage::CsvPriceSource;
use portfolio_mc_core::types::InvocationResult;

use super::Workspace;

/// Arguments for loading raw prices
#[derive(Args)]
pub struct FetchArgs {
    /// CSV of closing prices: a Date column followed by one column per ticker
    #[arg(long)]
    pub prices: String,
}

pub fn run_fetch(
    ws: &Workspace,
    args: FetchArgs,
) -> Result<InvocationResult, Box<dyn std::error::Error>> {
    let source = CsvPriceSource::new(args.prices);
    Ok(invoke_ingest(&source, &ws.objects, &ws.config))
}

pub fn run_preprocess(ws: &Workspace) -> Result<InvocationResult, Box<dyn std::error::Error>> {
    Ok(invoke_statistics(&ws.objects, &ws.config))
}
