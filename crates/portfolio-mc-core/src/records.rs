use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::decimal::Quantizer;
use crate::error::PortfolioMcError;
use crate::metrics::PortfolioMetrics;
use crate::types::{Rate, SimulationStatus, Symbol};
use crate::PortfolioMcResult;

/// Key under which the optimal-portfolio record is upserted, so each
/// aggregation pass supersedes the previous one.
pub const OPTIMAL_RECORD_ID: &str = "Optimal_Portfolios";

/// Outcome of simulating one candidate portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioResult {
    pub simulation_id: String,
    pub run_date: NaiveDate,
    pub initial_value: u64,
    pub num_simulations: usize,
    pub time_horizon_days: usize,
    pub metrics: PortfolioMetrics,
    pub weights: BTreeMap<Symbol, f64>,
    pub status: SimulationStatus,
}

impl PortfolioResult {
    /// Fixed-precision record persisted to the metadata store.
    pub fn to_record(&self, quantizer: &Quantizer) -> PortfolioRecord {
        let m = &self.metrics;
        PortfolioRecord {
            simulation_id: self.simulation_id.clone(),
            run_date: self.run_date,
            initial_value: self.initial_value,
            num_simulations: self.num_simulations,
            expected_returns: quantizer.quantize("ExpectedReturns", m.expected_return),
            volatility: quantizer.quantize("Volatility", m.volatility),
            sharpe: quantizer.quantize("Sharpe", m.sharpe_ratio),
            var_95: quantizer.quantize("VaR_95", m.var_95),
            probability_loss: quantizer.quantize("ProbabilityLoss", m.probability_of_loss),
            weights: quantizer.quantize_weights(self.weights.iter().map(|(s, w)| (s, *w))),
            time_horizon: self.time_horizon_days,
            status: self.status,
        }
    }

    /// Row of the per-shard results artifact. Non-finite metrics are clamped
    /// the same way the persisted record clamps them.
    pub fn to_artifact_row(&self, quantizer: &Quantizer) -> PortfolioMcResult<ShardArtifactRow> {
        let m = &self.metrics;
        Ok(ShardArtifactRow {
            simulation_id: self.simulation_id.clone(),
            run_date: self.run_date,
            initial_portfolio_value: self.initial_value,
            num_simulations: self.num_simulations,
            returns: quantizer.clamp("ExpectedReturns", m.expected_return),
            volatility: quantizer.clamp("Volatility", m.volatility),
            sharpe_ratio: quantizer.clamp("Sharpe", m.sharpe_ratio),
            prob_loss: quantizer.clamp("ProbabilityLoss", m.probability_of_loss),
            var_95: quantizer.clamp("VaR_95", m.var_95),
            weights: serde_json::to_string(&self.weights)?,
        })
    }
}

/// Persisted simulation record. Every numeric field is a fixed-precision
/// decimal serialized as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRecord {
    #[serde(rename = "SimulationID")]
    pub simulation_id: String,
    #[serde(rename = "RunDate")]
    pub run_date: NaiveDate,
    #[serde(rename = "InitialValue")]
    pub initial_value: u64,
    #[serde(rename = "NumSimulations")]
    pub num_simulations: usize,
    #[serde(rename = "ExpectedReturns")]
    pub expected_returns: Decimal,
    #[serde(rename = "Volatility")]
    pub volatility: Decimal,
    #[serde(rename = "Sharpe")]
    pub sharpe: Decimal,
    #[serde(rename = "VaR_95")]
    pub var_95: Decimal,
    #[serde(rename = "ProbabilityLoss")]
    pub probability_loss: Decimal,
    #[serde(rename = "Weights")]
    pub weights: BTreeMap<Symbol, Decimal>,
    #[serde(rename = "TimeHorizon")]
    pub time_horizon: usize,
    #[serde(rename = "Status")]
    pub status: SimulationStatus,
}

/// One line of a shard artifact. `weights` holds a JSON object
/// `{"asset": weight}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardArtifactRow {
    pub simulation_id: String,
    pub run_date: NaiveDate,
    pub initial_portfolio_value: u64,
    pub num_simulations: usize,
    pub returns: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub prob_loss: f64,
    #[serde(rename = "VaR_95")]
    pub var_95: f64,
    pub weights: String,
}

impl ShardArtifactRow {
    /// Parse the weights cell back into a mapping.
    pub fn parse_weights(&self) -> PortfolioMcResult<BTreeMap<Symbol, f64>> {
        serde_json::from_str(&self.weights).map_err(|e| {
            PortfolioMcError::MalformedRecord(format!(
                "Weights of {} are not an asset→weight mapping: {e}",
                self.simulation_id
            ))
        })
    }
}

/// Selected candidate in an aggregation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalCandidate {
    pub simulation_id: String,
    pub expected_return: Rate,
    pub volatility: Rate,
    pub sharpe_ratio: f64,
    /// `initial_value × e^(expected_return)`
    pub expected_value: f64,
    pub weights: BTreeMap<Symbol, f64>,
}

/// Max-Sharpe and min-volatility candidates across every shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalPortfolioResult {
    pub run_date: NaiveDate,
    pub initial_value: u64,
    pub time_horizon_days: usize,
    pub max_sharpe: OptimalCandidate,
    pub min_volatility: OptimalCandidate,
    pub status: SimulationStatus,
}

impl OptimalPortfolioResult {
    pub fn to_record(&self, quantizer: &Quantizer) -> OptimalPortfolioRecord {
        let weights = |c: &OptimalCandidate| {
            quantizer.quantize_weights(c.weights.iter().map(|(s, w)| (s, *w)))
        };
        OptimalPortfolioRecord {
            simulation_id: OPTIMAL_RECORD_ID.to_string(),
            run_date: self.run_date,
            initial_value: self.initial_value,
            min_volatility_id: self.min_volatility.simulation_id.clone(),
            min_volatility: quantizer.quantize("MinVolatility", self.min_volatility.volatility),
            min_volatility_returns: quantizer
                .quantize("MinVolatilityReturns", self.min_volatility.expected_return),
            expected_portfolio_min_volatility: quantizer.quantize(
                "ExpectedPortfolio_MinVolatility",
                self.min_volatility.expected_value,
            ),
            volatility_weights: weights(&self.min_volatility),
            max_sharpe_id: self.max_sharpe.simulation_id.clone(),
            max_sharpe: quantizer.quantize("MaxSharpe", self.max_sharpe.sharpe_ratio),
            max_sharpe_returns: quantizer
                .quantize("MaxSharpeReturns", self.max_sharpe.expected_return),
            expected_portfolio_max_sharpe: quantizer.quantize(
                "ExpectedPortfolio_MaxSharpe",
                self.max_sharpe.expected_value,
            ),
            sharpe_weights: weights(&self.max_sharpe),
            time_horizon: self.time_horizon_days,
            status: self.status,
        }
    }
}

/// Persisted optimal-portfolio record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalPortfolioRecord {
    #[serde(rename = "SimulationID")]
    pub simulation_id: String,
    #[serde(rename = "RunDate")]
    pub run_date: NaiveDate,
    #[serde(rename = "InitialValue")]
    pub initial_value: u64,
    #[serde(rename = "MinVolatilityID")]
    pub min_volatility_id: String,
    #[serde(rename = "MinVolatility")]
    pub min_volatility: Decimal,
    #[serde(rename = "MinVolatilityReturns")]
    pub min_volatility_returns: Decimal,
    #[serde(rename = "ExpectedPortfolio_MinVolatility")]
    pub expected_portfolio_min_volatility: Decimal,
    #[serde(rename = "Volatility_Weights")]
    pub volatility_weights: BTreeMap<Symbol, Decimal>,
    #[serde(rename = "MaxSharpeID")]
    pub max_sharpe_id: String,
    #[serde(rename = "MaxSharpe")]
    pub max_sharpe: Decimal,
    #[serde(rename = "MaxSharpeReturns")]
    pub max_sharpe_returns: Decimal,
    #[serde(rename = "ExpectedPortfolio_MaxSharpe")]
    pub expected_portfolio_max_sharpe: Decimal,
    #[serde(rename = "Sharpe_Weights")]
    pub sharpe_weights: BTreeMap<Symbol, Decimal>,
    #[serde(rename = "TimeHorizon")]
    pub time_horizon: usize,
    #[serde(rename = "Status")]
    pub status: SimulationStatus,
}

/// Records stored in the metadata store are upserted by this key.
pub trait KeyedRecord: Serialize {
    fn key(&self) -> &str;
}

impl KeyedRecord for PortfolioRecord {
    fn key(&self) -> &str {
        &self.simulation_id
    }
}

impl KeyedRecord for OptimalPortfolioRecord {
    fn key(&self) -> &str {
        &self.simulation_id
    }
}
