use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::SimulationConfig;
use crate::decimal::Quantizer;
use crate::error::PortfolioMcError;
use crate::records::{OptimalCandidate, OptimalPortfolioResult, ShardArtifactRow};
use crate::storage::{put_record, MetadataStore, ObjectStore};
use crate::table::{read_rows, write_rows};
use crate::types::{InvocationResult, SimulationStatus, Symbol};
use crate::PortfolioMcResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub shards: usize,
    pub portfolios: usize,
    pub optimal: OptimalPortfolioResult,
    pub location: String,
}

/// Global max-Sharpe and min-volatility candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimalSelection {
    pub max_sharpe: OptimalCandidate,
    pub min_volatility: OptimalCandidate,
}

/// Pick the max-Sharpe and min-volatility rows of a merged result set.
///
/// Non-finite values are never selected; on ties the first row wins. Every
/// weights cell must parse, selected or not.
pub fn select_optimal(
    rows: &[ShardArtifactRow],
    initial_value: u64,
) -> PortfolioMcResult<OptimalSelection> {
    if rows.is_empty() {
        return Err(PortfolioMcError::InsufficientData(
            "No simulation results to aggregate".into(),
        ));
    }
    let weights = rows
        .iter()
        .map(ShardArtifactRow::parse_weights)
        .collect::<PortfolioMcResult<Vec<_>>>()?;

    let mut max_sharpe: Option<usize> = None;
    let mut min_volatility: Option<usize> = None;
    for (i, row) in rows.iter().enumerate() {
        if row.sharpe_ratio.is_finite()
            && max_sharpe.map_or(true, |b| row.sharpe_ratio > rows[b].sharpe_ratio)
        {
            max_sharpe = Some(i);
        }
        if row.volatility.is_finite()
            && min_volatility.map_or(true, |b| row.volatility < rows[b].volatility)
        {
            min_volatility = Some(i);
        }
    }

    let candidate = |i: usize, weights: BTreeMap<Symbol, f64>| {
        let row = &rows[i];
        OptimalCandidate {
            simulation_id: row.simulation_id.clone(),
            expected_return: row.returns,
            volatility: row.volatility,
            sharpe_ratio: row.sharpe_ratio,
            expected_value: initial_value as f64 * row.returns.exp(),
            weights,
        }
    };
    match (max_sharpe, min_volatility) {
        (Some(s), Some(v)) => Ok(OptimalSelection {
            max_sharpe: candidate(s, weights[s].clone()),
            min_volatility: candidate(v, weights[v].clone()),
        }),
        _ => Err(PortfolioMcError::DataQuality(format!(
            "None of the {} results has a finite Sharpe ratio and volatility",
            rows.len()
        ))),
    }
}

/// The run date shared by every merged row, if they agree.
fn merged_run_date(rows: &[ShardArtifactRow]) -> Option<NaiveDate> {
    let first = rows.first()?.run_date;
    if rows.iter().all(|r| r.run_date == first) {
        Some(first)
    } else {
        warn!("Shard results span several run dates; using the configured run date");
        None
    }
}

/// Merge every expected shard artifact, persist the optimal-portfolio record
/// and the combined table.
pub fn aggregate_results(
    objects: &dyn ObjectStore,
    metadata: &dyn MetadataStore,
    config: &SimulationConfig,
) -> PortfolioMcResult<AggregateSummary> {
    config.validate()?;
    let keys: Vec<String> = (0..config.expected_shards)
        .map(|i| config.shard_key(i))
        .collect();

    let mut missing = Vec::new();
    for key in &keys {
        if !objects.contains(&config.bucket, key)? {
            missing.push(key.as_str());
        }
    }
    if !missing.is_empty() {
        warn!(missing = ?missing, "Shard artifacts missing");
        return Err(PortfolioMcError::IncompleteData {
            expected: keys.len(),
            found: keys.len() - missing.len(),
        });
    }

    let mut rows = Vec::new();
    for key in &keys {
        let mut shard: Vec<ShardArtifactRow> = read_rows(&objects.get(&config.bucket, key)?)?;
        rows.append(&mut shard);
    }
    info!(shards = keys.len(), portfolios = rows.len(), "Merged shard results");

    let selection = select_optimal(&rows, config.initial_value)?;
    let optimal = OptimalPortfolioResult {
        run_date: merged_run_date(&rows).unwrap_or_else(|| config.run_date()),
        initial_value: config.initial_value,
        time_horizon_days: config.time_horizon_days(),
        max_sharpe: selection.max_sharpe,
        min_volatility: selection.min_volatility,
        status: SimulationStatus::Completed,
    };
    info!(
        max_sharpe_id = %optimal.max_sharpe.simulation_id,
        max_sharpe = optimal.max_sharpe.sharpe_ratio,
        min_volatility_id = %optimal.min_volatility.simulation_id,
        min_volatility = optimal.min_volatility.volatility,
        "Selected optimal portfolios"
    );

    let quantizer = Quantizer::new(config.decimal_places);
    put_record(metadata, &config.tables.optimal, &optimal.to_record(&quantizer))?;
    let location = objects.put(&config.bucket, &config.keys.combined, write_rows(&rows)?)?;

    Ok(AggregateSummary {
        shards: keys.len(),
        portfolios: rows.len(),
        optimal,
        location,
    })
}

pub fn invoke_aggregate(
    objects: &dyn ObjectStore,
    metadata: &dyn MetadataStore,
    config: &SimulationConfig,
) -> InvocationResult {
    let started = Instant::now();
    let outcome = aggregate_results(objects, metadata, config);
    InvocationResult::from_outcome("combine", started, outcome, |s| {
        format!(
            "Combined {} results from {} shards. Optimal portfolios saved; results saved to {}",
            s.portfolios, s.shards, s.location
        )
    })
}
