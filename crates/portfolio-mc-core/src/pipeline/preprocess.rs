use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use crate::config::SimulationConfig;
use crate::statistics::compute_statistics;
use crate::storage::ObjectStore;
use crate::table::{write_rows, AssetStatisticsRow, PriceTable};
use crate::types::InvocationResult;
use crate::PortfolioMcResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSummary {
    pub observations: usize,
    pub assets: Vec<AssetStatisticsRow>,
    pub returns_location: String,
    pub stats_location: String,
}

/// Read the raw price table, derive daily returns and annualized statistics,
/// and store both processed tables.
pub fn compute_statistics_job(
    store: &dyn ObjectStore,
    config: &SimulationConfig,
) -> PortfolioMcResult<StatisticsSummary> {
    let raw_key = config.raw_prices_key();
    info!(bucket = %config.bucket, key = %raw_key, "Loading raw prices");
    let prices = PriceTable::from_csv(&store.get(&config.bucket, &raw_key)?)?;
    let stats = compute_statistics(&prices, config.trading_days)?;

    let rows: Vec<AssetStatisticsRow> = stats.assets.iter().map(AssetStatisticsRow::from).collect();
    let returns_location = store.put(
        &config.bucket,
        &config.keys.returns,
        stats.daily_returns.to_csv()?,
    )?;
    let stats_location = store.put(&config.bucket, &config.keys.stats, write_rows(&rows)?)?;

    Ok(StatisticsSummary {
        observations: stats.daily_returns.len(),
        assets: rows,
        returns_location,
        stats_location,
    })
}

pub fn invoke_statistics(store: &dyn ObjectStore, config: &SimulationConfig) -> InvocationResult {
    let started = Instant::now();
    let outcome = compute_statistics_job(store, config);
    InvocationResult::from_outcome("preprocess", started, outcome, |s| {
        format!(
            "Portfolio statistics saved to {} and daily returns to {}",
            s.stats_location, s.returns_location
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PortfolioMcError;
    use crate::storage::MemoryObjectStore;
    use crate::table::{read_rows, ReturnsTable};

    const RAW: &str = "Date,AAA,BBB\n\
        2024-01-02,100,50\n\
        2024-01-03,101,50.5\n\
        2024-01-04,,51\n\
        2024-01-05,102,51.5\n\
        2024-01-08,101,51\n";

    fn config() -> SimulationConfig {
        SimulationConfig {
            keys: crate::config::ObjectKeys {
                raw_prices: Some("raw_data/test.csv".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_writes_stats_and_returns() {
        let store = MemoryObjectStore::new();
        let config = config();
        store
            .put(&config.bucket, "raw_data/test.csv", RAW.as_bytes().to_vec())
            .unwrap();

        let summary = compute_statistics_job(&store, &config).unwrap();
        // Rows touching the gap on 01-04 are dropped on both sides.
        assert_eq!(summary.observations, 2);

        let rows: Vec<AssetStatisticsRow> =
            read_rows(&store.get(&config.bucket, &config.keys.stats).unwrap()).unwrap();
        assert_eq!(rows, summary.assets);
        assert_eq!(rows[0].symbol, "AAA");

        let returns =
            ReturnsTable::from_csv(&store.get(&config.bucket, &config.keys.returns).unwrap())
                .unwrap();
        assert_eq!(returns.len(), 2);
        let first: Vec<f64> = returns.complete_rows().next().unwrap();
        assert!((first[0] - 0.01).abs() < 1e-12);
        assert!((first[1] - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_missing_raw_table() {
        let store = MemoryObjectStore::new();
        let err = compute_statistics_job(&store, &config()).unwrap_err();
        assert!(matches!(err, PortfolioMcError::IoFailure { .. }));
        assert_eq!(invoke_statistics(&store, &config()).status_code, 500);
    }
}
