use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use crate::config::SimulationConfig;
use crate::error::PortfolioMcError;
use crate::storage::{ObjectStore, PriceSource};
use crate::types::{InvocationResult, Symbol};
use crate::PortfolioMcResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub assets: Vec<Symbol>,
    pub rows: usize,
    pub locations: Vec<String>,
}

/// Download `config.assets` over `[start_date, end_date)` and store the raw
/// price table under the dated raw key (and the configured key, if any).
pub fn ingest_prices(
    source: &dyn PriceSource,
    store: &dyn ObjectStore,
    config: &SimulationConfig,
) -> PortfolioMcResult<IngestSummary> {
    config.validate()?;
    info!(
        assets = ?config.assets,
        start = %config.start_date,
        end = %config.end_date,
        "Fetching price history"
    );
    let table = source.fetch(&config.assets, config.start_date, config.end_date)?;
    if table.is_empty() {
        return Err(PortfolioMcError::DataQuality(format!(
            "No price data returned for {} between {} and {}",
            config.assets.join(","),
            config.start_date,
            config.end_date
        )));
    }

    let body = table.to_csv()?;
    let mut keys = vec![config.dated_raw_prices_key()];
    let configured = config.raw_prices_key();
    if !keys.contains(&configured) {
        keys.push(configured);
    }
    let locations = keys
        .iter()
        .map(|key| store.put(&config.bucket, key, body.clone()))
        .collect::<PortfolioMcResult<Vec<_>>>()?;

    Ok(IngestSummary {
        assets: table.symbols().to_vec(),
        rows: table.len(),
        locations,
    })
}

pub fn invoke_ingest(
    source: &dyn PriceSource,
    store: &dyn ObjectStore,
    config: &SimulationConfig,
) -> InvocationResult {
    let started = Instant::now();
    let outcome = ingest_prices(source, store, config);
    InvocationResult::from_outcome("fetch", started, outcome, |s| {
        format!("Data successfully saved to {}", s.locations.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryObjectStore, StaticPriceSource};
    use crate::table::PriceTable;
    use chrono::NaiveDate;

    fn config() -> SimulationConfig {
        SimulationConfig {
            assets: vec!["AAA".into(), "BBB".into()],
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            run_date: NaiveDate::from_ymd_opt(2024, 2, 2),
            ..Default::default()
        }
    }

    fn source() -> StaticPriceSource {
        let mut table = PriceTable::new(vec!["AAA".into(), "BBB".into(), "CCC".into()]);
        for (day, a) in [(2, 10.0), (3, 10.5), (4, 10.2)] {
            table
                .push_row(
                    NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
                    vec![Some(a), Some(20.0), Some(1.0)],
                )
                .unwrap();
        }
        StaticPriceSource::new(table)
    }

    #[test]
    fn test_ingest_writes_dated_key() {
        let store = MemoryObjectStore::new();
        let summary = ingest_prices(&source(), &store, &config()).unwrap();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.assets, vec!["AAA".to_string(), "BBB".to_string()]);
        assert_eq!(
            store.keys("monte-carlo-raw-data").unwrap(),
            vec!["raw_data/20240202.csv".to_string()]
        );
        let stored = PriceTable::from_csv(
            &store.get("monte-carlo-raw-data", "raw_data/20240202.csv").unwrap(),
        )
        .unwrap();
        assert_eq!(stored.len(), 3);
    }

    #[test]
    fn test_ingest_also_writes_configured_key() {
        let store = MemoryObjectStore::new();
        let mut config = config();
        config.keys.raw_prices = Some("raw_data/latest.csv".into());
        let summary = ingest_prices(&source(), &store, &config).unwrap();
        assert_eq!(summary.locations.len(), 2);
        assert!(store.contains(&config.bucket, "raw_data/latest.csv").unwrap());
    }

    #[test]
    fn test_empty_download_is_data_quality() {
        let store = MemoryObjectStore::new();
        let mut config = config();
        config.start_date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        config.end_date = NaiveDate::from_ymd_opt(2023, 2, 1).unwrap();
        let err = ingest_prices(&source(), &store, &config).unwrap_err();
        assert!(matches!(err, PortfolioMcError::DataQuality(_)));

        let r = invoke_ingest(&source(), &store, &config);
        assert_eq!(r.status_code, 500);
        assert!(store.keys(&config.bucket).unwrap().is_empty());
    }
}
