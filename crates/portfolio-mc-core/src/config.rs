use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::PortfolioMcError;
use crate::simulation::SeedSequence;
use crate::types::{Rate, Symbol};
use crate::PortfolioMcResult;

/// Environment variable carrying the batch-array index of the current shard.
pub const SHARD_INDEX_ENV: &str = "AWS_BATCH_JOB_ARRAY_INDEX";

/// Object-store keys for every table the pipeline reads or writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectKeys {
    /// Raw price table. When unset, `raw_data/<YYYYMMDD>.csv` for the run date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_prices: Option<String>,
    pub stats: String,
    pub returns: String,
    /// Shard artifacts are stored at `<shard_prefix><index>.csv`.
    pub shard_prefix: String,
    pub combined: String,
}

impl Default for ObjectKeys {
    fn default() -> Self {
        ObjectKeys {
            raw_prices: None,
            stats: "processed_data/portfolio_stats.csv".into(),
            returns: "processed_data/portfolio_returns.csv".into(),
            shard_prefix: "processed_data/sim_results_".into(),
            combined: "processed_data/sim_results_combined.csv".into(),
        }
    }
}

/// Metadata-store table names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub simulations: String,
    pub optimal: String,
}

impl Default for TableNames {
    fn default() -> Self {
        TableNames {
            simulations: "MonteCarloSimulations".into(),
            optimal: "OptimalPortfolios".into(),
        }
    }
}

/// Explicit configuration passed into every pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub bucket: String,
    pub keys: ObjectKeys,
    pub tables: TableNames,
    /// Asset universe requested from the price source.
    pub assets: Vec<Symbol>,
    pub start_date: NaiveDate,
    /// Exclusive end of the price history window.
    pub end_date: NaiveDate,
    /// Monte Carlo trials per candidate portfolio.
    pub num_simulations: usize,
    /// Candidate portfolios evaluated by one shard.
    pub portfolios_per_shard: usize,
    /// Number of shard artifacts the aggregator requires.
    pub expected_shards: usize,
    pub trading_days: usize,
    pub horizon_years: usize,
    pub risk_free_rate: Rate,
    /// Initial notional in dollars.
    pub initial_value: u64,
    /// Fixed decimal places used for every persisted numeric field.
    pub decimal_places: u32,
    /// Base seed; drawn from entropy when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Pinned run date; today when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_date: Option<NaiveDate>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            bucket: "monte-carlo-raw-data".into(),
            keys: ObjectKeys::default(),
            tables: TableNames::default(),
            assets: ["META", "GM", "NVDA", "JPM", "GAP", "GLD", "PLTR", "SPY"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2025, 5, 23).unwrap_or_default(),
            num_simulations: 1_000,
            portfolios_per_shard: 10,
            expected_shards: 10,
            trading_days: 252,
            horizon_years: 1,
            risk_free_rate: 0.01,
            initial_value: 100_000,
            decimal_places: 8,
            seed: None,
            run_date: None,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> PortfolioMcResult<()> {
        if self.bucket.trim().is_empty() {
            return Err(invalid("bucket", "Must not be empty"));
        }
        if self.num_simulations == 0 {
            return Err(invalid("num_simulations", "Must be at least 1"));
        }
        if self.portfolios_per_shard == 0 {
            return Err(invalid("portfolios_per_shard", "Must be at least 1"));
        }
        if self.expected_shards == 0 {
            return Err(invalid("expected_shards", "Must be at least 1"));
        }
        if self.trading_days == 0 {
            return Err(invalid("trading_days", "Must be at least 1"));
        }
        if self.horizon_years == 0 {
            return Err(invalid("horizon_years", "Must be at least 1"));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(invalid("risk_free_rate", "Must be finite"));
        }
        if self.decimal_places > 20 {
            return Err(invalid("decimal_places", "Must be at most 20"));
        }
        if self.start_date >= self.end_date {
            return Err(invalid("end_date", "Must be after start_date"));
        }
        Ok(())
    }

    /// Simulation horizon in trading days.
    pub fn time_horizon_days(&self) -> usize {
        self.trading_days * self.horizon_years
    }

    pub fn run_date(&self) -> NaiveDate {
        self.run_date.unwrap_or_else(|| Local::now().date_naive())
    }

    /// `raw_data/<YYYYMMDD>.csv` for the run date.
    pub fn dated_raw_prices_key(&self) -> String {
        format!("raw_data/{}.csv", self.run_date().format("%Y%m%d"))
    }

    /// Key the statistics job reads the raw table from.
    pub fn raw_prices_key(&self) -> String {
        match &self.keys.raw_prices {
            Some(key) => key.clone(),
            None => self.dated_raw_prices_key(),
        }
    }

    /// Same configuration with the run date fixed, so every stage of one run
    /// agrees on it.
    pub fn pinned(&self) -> SimulationConfig {
        SimulationConfig {
            run_date: Some(self.run_date()),
            ..self.clone()
        }
    }

    pub fn shard_key(&self, shard_index: usize) -> String {
        format!("{}{}.csv", self.keys.shard_prefix, shard_index)
    }

    /// Root of the per-run seed tree. Shards, portfolios and trials derive
    /// their own streams from it.
    pub fn seed_sequence(&self) -> SeedSequence {
        match self.seed {
            Some(seed) => SeedSequence::new(seed),
            None => SeedSequence::from_entropy(),
        }
    }
}

/// Read the shard index from `AWS_BATCH_JOB_ARRAY_INDEX`, defaulting to 0.
pub fn shard_index_from_env() -> PortfolioMcResult<usize> {
    match std::env::var(SHARD_INDEX_ENV) {
        Ok(raw) => raw.trim().parse::<usize>().map_err(|e| PortfolioMcError::InvalidInput {
            field: SHARD_INDEX_ENV.into(),
            reason: format!("'{raw}' is not a shard index: {e}"),
        }),
        Err(_) => Ok(0),
    }
}

fn invalid(field: &str, reason: &str) -> PortfolioMcError {
    PortfolioMcError::InvalidInput {
        field: field.into(),
        reason: reason.into(),
    }
}
