//! One shard: a fixed number of candidate portfolios, each simulated and
//! reduced, then persisted together.

use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Builder;

use crate::config::SimulationConfig;
use crate::decimal::Quantizer;
use crate::error::PortfolioMcError;
use crate::metrics::reduce_returns;
use crate::records::PortfolioResult;
use crate::simulation::{PathSimulator, SeedSequence, SimulationHorizon};
use crate::statistics::covariance_from_returns;
use crate::storage::{put_record, MetadataStore, ObjectStore};
use crate::table::{read_rows, write_rows, AssetStatisticsRow, ReturnsTable};
use crate::types::{InvocationResult, SimulationStatus, Symbol};
use crate::weights::generate_weights;
use crate::PortfolioMcResult;

/// Child stream of a candidate's seed that drives its trials.
const TRIAL_STREAM: u64 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardSummary {
    pub shard_index: usize,
    pub simulation_ids: Vec<String>,
    pub location: String,
}

/// Simulator and asset order rebuilt from the processed tables.
struct ShardModel {
    symbols: Vec<Symbol>,
    simulator: PathSimulator,
}

fn load_model(store: &dyn ObjectStore, config: &SimulationConfig) -> PortfolioMcResult<ShardModel> {
    let stats: Vec<AssetStatisticsRow> =
        read_rows(&store.get(&config.bucket, &config.keys.stats)?)?;
    let returns = ReturnsTable::from_csv(&store.get(&config.bucket, &config.keys.returns)?)?;
    let covariance = covariance_from_returns(&returns, config.trading_days)?;

    let means = covariance
        .symbols()
        .iter()
        .map(|symbol| {
            stats
                .iter()
                .find(|row| &row.symbol == symbol)
                .map(|row| row.mean_return)
                .ok_or_else(|| {
                    PortfolioMcError::MalformedRecord(format!(
                        "No annual statistics for asset '{symbol}'"
                    ))
                })
        })
        .collect::<PortfolioMcResult<Vec<f64>>>()?;

    let horizon = SimulationHorizon::new(config.trading_days, config.horizon_years);
    let simulator = PathSimulator::new(&means, &covariance, horizon)?;
    Ok(ShardModel {
        symbols: covariance.symbols().to_vec(),
        simulator,
    })
}

/// Draw weights, simulate and reduce one candidate. Everything random is
/// derived from `seeds`.
fn simulate_candidate(
    model: &ShardModel,
    config: &SimulationConfig,
    run_date: NaiveDate,
    seeds: SeedSequence,
) -> PortfolioMcResult<PortfolioResult> {
    let mut rng = seeds.rng();
    let weights = generate_weights(&model.symbols, &mut rng)?;
    let simulation_id = format!("sim_{}", Builder::from_random_bytes(rng.gen()).into_uuid());

    let returns = model.simulator.simulate_terminal_returns(
        &weights,
        config.num_simulations,
        seeds.child(TRIAL_STREAM),
    )?;
    let metrics = reduce_returns(&returns, config.risk_free_rate)?;
    debug!(
        id = %simulation_id,
        expected_return = metrics.expected_return,
        volatility = metrics.volatility,
        sharpe = metrics.sharpe_ratio,
        "Simulated candidate"
    );

    Ok(PortfolioResult {
        simulation_id,
        run_date,
        initial_value: config.initial_value,
        num_simulations: config.num_simulations,
        time_horizon_days: config.time_horizon_days(),
        metrics,
        weights: weights.to_map(),
        status: SimulationStatus::Completed,
    })
}

/// Evaluate every candidate of shard `shard_index`, upsert one record per
/// candidate and write the shard artifact.
///
/// Nothing is persisted unless every candidate succeeded.
pub fn run_shard(
    objects: &dyn ObjectStore,
    metadata: &dyn MetadataStore,
    config: &SimulationConfig,
    shard_index: usize,
    seeds: SeedSequence,
) -> PortfolioMcResult<ShardSummary> {
    config.validate()?;
    if shard_index >= config.expected_shards {
        warn!(
            shard_index,
            expected_shards = config.expected_shards,
            "Shard index outside the range the aggregator reads"
        );
    }
    let run_date = config.run_date();
    info!(
        shard_index,
        portfolios = config.portfolios_per_shard,
        trials = config.num_simulations,
        "Starting shard"
    );

    let model = load_model(objects, config)?;
    let shard_seeds = seeds.child(shard_index as u64);
    let results = (0..config.portfolios_per_shard)
        .map(|p| simulate_candidate(&model, config, run_date, shard_seeds.child(p as u64)))
        .collect::<PortfolioMcResult<Vec<_>>>()?;

    let quantizer = Quantizer::new(config.decimal_places);
    for result in &results {
        put_record(metadata, &config.tables.simulations, &result.to_record(&quantizer))?;
    }
    let rows = results
        .iter()
        .map(|r| r.to_artifact_row(&quantizer))
        .collect::<PortfolioMcResult<Vec<_>>>()?;
    let location = objects.put(&config.bucket, &config.shard_key(shard_index), write_rows(&rows)?)?;
    info!(shard_index, %location, "Shard results saved");

    Ok(ShardSummary {
        shard_index,
        simulation_ids: results.into_iter().map(|r| r.simulation_id).collect(),
        location,
    })
}

pub fn invoke_shard(
    objects: &dyn ObjectStore,
    metadata: &dyn MetadataStore,
    config: &SimulationConfig,
    shard_index: usize,
) -> InvocationResult {
    let started = Instant::now();
    let outcome = run_shard(objects, metadata, config, shard_index, config.seed_sequence());
    InvocationResult::from_outcome("simulate", started, outcome, |s| {
        format!(
            "Completed {} simulations. Results saved to {}",
            s.simulation_ids.len(),
            s.location
        )
    })
}
