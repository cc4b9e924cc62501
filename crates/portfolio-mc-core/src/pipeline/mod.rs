//! Externally triggered stages of a run.
//!
//! Each stage has a `*_job` style function returning a typed summary and an
//! `invoke_*` wrapper that reports the outcome as an [`InvocationResult`].

pub mod aggregate;
pub mod batch;
pub mod ingest;
pub mod preprocess;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use crate::config::SimulationConfig;
use crate::storage::{MetadataStore, ObjectStore, PriceSource};
use crate::types::InvocationResult;
use crate::PortfolioMcResult;

pub use aggregate::{aggregate_results, invoke_aggregate, select_optimal, AggregateSummary};
pub use batch::{invoke_shard, run_shard, ShardSummary};
pub use ingest::{ingest_prices, invoke_ingest, IngestSummary};
pub use preprocess::{compute_statistics_job, invoke_statistics, StatisticsSummary};

/// Summary of a full single-machine run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingest: Option<IngestSummary>,
    pub statistics: StatisticsSummary,
    pub shards: Vec<ShardSummary>,
    pub aggregate: AggregateSummary,
}

/// Ingest (when a source is given), preprocess, run every shard in parallel
/// and aggregate. Stops at the first failing stage.
pub fn run_pipeline(
    source: Option<&dyn PriceSource>,
    objects: &dyn ObjectStore,
    metadata: &dyn MetadataStore,
    config: &SimulationConfig,
) -> PortfolioMcResult<PipelineSummary> {
    config.validate()?;
    let config = config.pinned();
    let seeds = config.seed_sequence();
    info!(
        run_date = %config.run_date(),
        shards = config.expected_shards,
        seed = seeds.seed(),
        "Starting pipeline"
    );

    let ingest = source
        .map(|s| ingest_prices(s, objects, &config))
        .transpose()?;
    let statistics = compute_statistics_job(objects, &config)?;
    let shards = (0..config.expected_shards)
        .into_par_iter()
        .map(|shard| run_shard(objects, metadata, &config, shard, seeds))
        .collect::<PortfolioMcResult<Vec<_>>>()?;
    let aggregate = aggregate_results(objects, metadata, &config)?;

    Ok(PipelineSummary {
        ingest,
        statistics,
        shards,
        aggregate,
    })
}

pub fn invoke_pipeline(
    source: Option<&dyn PriceSource>,
    objects: &dyn ObjectStore,
    metadata: &dyn MetadataStore,
    config: &SimulationConfig,
) -> InvocationResult {
    let started = Instant::now();
    let outcome = run_pipeline(source, objects, metadata, config);
    InvocationResult::from_outcome("run", started, outcome, |s| {
        format!(
            "Evaluated {} portfolios across {} shards; results saved to {}",
            s.aggregate.portfolios,
            s.shards.len(),
            s.aggregate.location
        )
    })
}
