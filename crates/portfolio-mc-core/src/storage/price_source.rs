use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use super::PriceSource;
use crate::error::PortfolioMcError;
use crate::table::PriceTable;
use crate::types::Symbol;
use crate::PortfolioMcResult;

/// Reads closing prices from a local CSV export (date column first, one
/// column per symbol).
#[derive(Debug, Clone)]
pub struct CsvPriceSource {
    path: PathBuf,
}

impl CsvPriceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvPriceSource { path: path.into() }
    }
}

impl PriceSource for CsvPriceSource {
    fn fetch(
        &self,
        assets: &[Symbol],
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortfolioMcResult<PriceTable> {
        let bytes = fs::read(&self.path)
            .map_err(|e| PortfolioMcError::io(format!("read {}", self.path.display()), e))?;
        let table = PriceTable::from_csv(&bytes)?;
        info!(
            path = %self.path.display(),
            rows = table.len(),
            "Loaded price history"
        );
        table.select(assets, start, end)
    }
}

/// Serves a fixed in-memory table.
#[derive(Debug, Clone)]
pub struct StaticPriceSource {
    table: PriceTable,
}

impl StaticPriceSource {
    pub fn new(table: PriceTable) -> Self {
        StaticPriceSource { table }
    }
}

impl PriceSource for StaticPriceSource {
    fn fetch(
        &self,
        assets: &[Symbol],
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortfolioMcResult<PriceTable> {
        self.table.select(assets, start, end)
    }
}
