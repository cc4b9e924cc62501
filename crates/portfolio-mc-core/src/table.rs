//! Declared-schema tabular codec for everything that crosses the object-store
//! boundary.
//!
//! A time-series table is a `date` index column (ISO `YYYY-MM-DD`; any time
//! suffix is ignored) followed by one numeric column per asset symbol. Empty
//! cells and `NaN` decode as missing observations.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::PortfolioMcError;
use crate::types::Symbol;
use crate::PortfolioMcResult;

const DATE_COLUMN: &str = "Date";

/// Date-indexed table with one column per asset.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesTable {
    symbols: Vec<Symbol>,
    dates: Vec<NaiveDate>,
    rows: Vec<Vec<Option<f64>>>,
}

/// Historical closing prices.
pub type PriceTable = TimeSeriesTable;

/// Daily simple returns.
pub type ReturnsTable = TimeSeriesTable;

impl TimeSeriesTable {
    pub fn new(symbols: Vec<Symbol>) -> Self {
        TimeSeriesTable {
            symbols,
            dates: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Append one observation row. The row must have one cell per symbol.
    pub fn push_row(&mut self, date: NaiveDate, values: Vec<Option<f64>>) -> PortfolioMcResult<()> {
        if values.len() != self.symbols.len() {
            return Err(PortfolioMcError::InvalidInput {
                field: "row".into(),
                reason: format!(
                    "Row for {date} has {} values, expected {}",
                    values.len(),
                    self.symbols.len()
                ),
            });
        }
        self.dates.push(date);
        self.rows.push(values);
        Ok(())
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn rows(&self) -> impl Iterator<Item = (&NaiveDate, &[Option<f64>])> {
        self.dates.iter().zip(self.rows.iter().map(|r| r.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows with an observation for every asset.
    pub fn complete_rows(&self) -> impl Iterator<Item = Vec<f64>> + '_ {
        self.rows
            .iter()
            .filter_map(|row| row.iter().copied().collect::<Option<Vec<f64>>>())
    }

    /// Restrict to the given assets (in the given order) and the
    /// half-open date range `[start, end)`.
    pub fn select(
        &self,
        assets: &[Symbol],
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortfolioMcResult<TimeSeriesTable> {
        let mut columns = Vec::with_capacity(assets.len());
        for asset in assets {
            let idx = self
                .symbols
                .iter()
                .position(|s| s == asset)
                .ok_or_else(|| {
                    PortfolioMcError::DataQuality(format!("No price history for asset '{asset}'"))
                })?;
            columns.push(idx);
        }

        let mut selected = TimeSeriesTable::new(assets.to_vec());
        for (date, row) in self.rows() {
            if *date < start || *date >= end {
                continue;
            }
            selected.dates.push(*date);
            selected.rows.push(columns.iter().map(|&c| row[c]).collect());
        }
        Ok(selected)
    }

    pub fn from_csv(bytes: &[u8]) -> PortfolioMcResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let headers = reader.headers()?.clone();
        if headers.len() < 2 {
            return Err(PortfolioMcError::MalformedRecord(
                "Table needs a date column and at least one asset column".into(),
            ));
        }
        let symbols: Vec<Symbol> = headers.iter().skip(1).map(|h| h.to_string()).collect();
        let mut table = TimeSeriesTable::new(symbols);

        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let raw_date = record.get(0).unwrap_or_default();
            let date = parse_date(raw_date).ok_or_else(|| {
                PortfolioMcError::MalformedRecord(format!(
                    "Row {}: '{raw_date}' is not a date",
                    line + 1
                ))
            })?;
            let mut values = Vec::with_capacity(table.symbols.len());
            for (col, cell) in record.iter().skip(1).enumerate() {
                values.push(parse_cell(cell).map_err(|_| {
                    PortfolioMcError::MalformedRecord(format!(
                        "Row {}, column '{}': '{cell}' is not a number",
                        line + 1,
                        table.symbols[col]
                    ))
                })?);
            }
            table.push_row(date, values)?;
        }
        Ok(table)
    }

    pub fn to_csv(&self) -> PortfolioMcResult<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        let mut header = Vec::with_capacity(self.symbols.len() + 1);
        header.push(DATE_COLUMN.to_string());
        header.extend(self.symbols.iter().cloned());
        writer.write_record(&header)?;

        for (date, row) in self.rows() {
            let mut record = Vec::with_capacity(row.len() + 1);
            record.push(date.format("%Y-%m-%d").to_string());
            record.extend(
                row.iter()
                    .map(|v| v.map(|x| x.to_string()).unwrap_or_default()),
            );
            writer.write_record(&record)?;
        }
        into_bytes(writer)
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

fn parse_cell(cell: &str) -> Result<Option<f64>, std::num::ParseFloatError> {
    if cell.is_empty() {
        return Ok(None);
    }
    let value: f64 = cell.parse()?;
    Ok(if value.is_nan() { None } else { Some(value) })
}

/// Per-asset annualized statistics as stored in the processed stats table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetStatisticsRow {
    #[serde(rename = "asset")]
    pub symbol: Symbol,
    #[serde(rename = "MeanReturn_Annual")]
    pub mean_return: f64,
    #[serde(rename = "Volatility_Annual")]
    pub volatility: f64,
}

/// Serialize any row type with serde-derived headers.
pub fn write_rows<T: Serialize>(rows: &[T]) -> PortfolioMcResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    into_bytes(writer)
}

/// Deserialize rows with serde-derived headers. Any failure is a malformed
/// record since the schema is declared.
pub fn read_rows<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> PortfolioMcResult<Vec<T>> {
    let mut reader = csv::Reader::from_reader(bytes);
    reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| {
            row.map_err(|e| PortfolioMcError::MalformedRecord(format!("Row {}: {e}", i + 1)))
        })
        .collect()
}

fn into_bytes(writer: csv::Writer<Vec<u8>>) -> PortfolioMcResult<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| PortfolioMcError::SerializationError(e.to_string()))
}
