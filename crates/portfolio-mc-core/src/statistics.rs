use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::{debug, info};

use crate::error::PortfolioMcError;
use crate::table::{AssetStatisticsRow, PriceTable, ReturnsTable};
use crate::types::{Rate, Symbol};
use crate::PortfolioMcResult;

/// Annualized return profile of one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetStatistics {
    pub symbol: Symbol,
    pub mean_return: Rate,
    pub volatility: Rate,
}

impl From<AssetStatisticsRow> for AssetStatistics {
    fn from(row: AssetStatisticsRow) -> Self {
        AssetStatistics {
            symbol: row.symbol,
            mean_return: row.mean_return,
            volatility: row.volatility,
        }
    }
}

impl From<&AssetStatistics> for AssetStatisticsRow {
    fn from(stats: &AssetStatistics) -> Self {
        AssetStatisticsRow {
            symbol: stats.symbol.clone(),
            mean_return: stats.mean_return,
            volatility: stats.volatility,
        }
    }
}

/// Annualized covariance over a fixed, ordered asset set.
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceMatrix {
    symbols: Vec<Symbol>,
    matrix: DMatrix<f64>,
}

impl CovarianceMatrix {
    /// Build a covariance matrix, checking shape, finiteness and symmetry.
    pub fn new(symbols: Vec<Symbol>, matrix: DMatrix<f64>) -> PortfolioMcResult<Self> {
        let n = symbols.len();
        if n == 0 {
            return Err(PortfolioMcError::InvalidInput {
                field: "covariance".into(),
                reason: "At least one asset is required".into(),
            });
        }
        if matrix.nrows() != n || matrix.ncols() != n {
            return Err(PortfolioMcError::InvalidInput {
                field: "covariance".into(),
                reason: format!(
                    "Expected {n}x{n} matrix, got {}x{}",
                    matrix.nrows(),
                    matrix.ncols()
                ),
            });
        }
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(PortfolioMcError::DataQuality(
                "Covariance matrix contains non-finite entries".into(),
            ));
        }
        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (matrix[(i, j)], matrix[(j, i)]);
                let scale = a.abs().max(b.abs()).max(1.0);
                if (a - b).abs() > 1e-12 * scale {
                    return Err(PortfolioMcError::DataQuality(format!(
                        "Covariance matrix is not symmetric at ({}, {})",
                        symbols[i], symbols[j]
                    )));
                }
            }
        }
        Ok(CovarianceMatrix { symbols, matrix })
    }

    /// Diagonal matrix with the given per-asset variances.
    pub fn diagonal(symbols: Vec<Symbol>, variances: &[f64]) -> PortfolioMcResult<Self> {
        let n = symbols.len();
        if variances.len() != n {
            return Err(PortfolioMcError::InvalidInput {
                field: "variances".into(),
                reason: format!("Expected {n} variances, got {}", variances.len()),
            });
        }
        Self::new(symbols, DMatrix::from_fn(n, n, |i, j| if i == j { variances[i] } else { 0.0 }))
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn dim(&self) -> usize {
        self.symbols.len()
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Per-asset variances (the diagonal).
    pub fn variances(&self) -> Vec<f64> {
        self.matrix.diagonal().iter().copied().collect()
    }

    /// Lower-triangular factor `L` with `L * Lᵀ = Σ`.
    ///
    /// Fails with `DataQuality` when the matrix is not positive-definite.
    pub fn cholesky_lower(&self) -> PortfolioMcResult<DMatrix<f64>> {
        self.matrix
            .clone()
            .cholesky()
            .map(|c| c.l())
            .ok_or_else(|| {
                PortfolioMcError::DataQuality(format!(
                    "Covariance matrix over [{}] is not positive-definite",
                    self.symbols.join(", ")
                ))
            })
    }
}

/// Everything the preprocessor derives from one price table.
#[derive(Debug, Clone)]
pub struct PreprocessedStatistics {
    pub assets: Vec<AssetStatistics>,
    pub covariance: CovarianceMatrix,
    pub daily_returns: ReturnsTable,
}

/// Simple percentage returns between consecutive observations.
///
/// The first row is dropped, as is any row where an asset is missing today
/// or yesterday, or where yesterday's price is zero.
pub fn daily_returns(prices: &PriceTable) -> PortfolioMcResult<ReturnsTable> {
    let mut returns = ReturnsTable::new(prices.symbols().to_vec());
    let mut previous: Option<&[Option<f64>]> = None;

    for (date, row) in prices.rows() {
        if row.iter().flatten().any(|p| !p.is_finite()) {
            return Err(PortfolioMcError::DataQuality(format!(
                "Non-finite price on {date}"
            )));
        }
        if let Some(prev) = previous {
            let pct: Option<Vec<f64>> = row
                .iter()
                .zip(prev)
                .map(|(cur, prev)| match (cur, prev) {
                    (Some(c), Some(p)) if *p != 0.0 => Some(c / p - 1.0),
                    _ => None,
                })
                .collect();
            if let Some(values) = pct {
                returns.push_row(*date, values.into_iter().map(Some).collect())?;
            }
        }
        previous = Some(row);
    }
    Ok(returns)
}

/// Annualized sample covariance (n−1) of a daily-returns table.
pub fn covariance_from_returns(
    returns: &ReturnsTable,
    trading_days: usize,
) -> PortfolioMcResult<CovarianceMatrix> {
    let columns = complete_columns(returns)?;
    let n = columns.len();
    let scale = trading_days as f64;
    let mut matrix = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in i..n {
            let cov = columns[i].iter().covariance(columns[j].iter()) * scale;
            matrix[(i, j)] = cov;
            matrix[(j, i)] = cov;
        }
    }
    CovarianceMatrix::new(returns.symbols().to_vec(), matrix)
}

/// Turn a historical price table into annualized per-asset statistics and
/// covariance.
pub fn compute_statistics(
    prices: &PriceTable,
    trading_days: usize,
) -> PortfolioMcResult<PreprocessedStatistics> {
    let daily = daily_returns(prices)?;
    info!(
        observations = daily.len(),
        assets = daily.symbols().len(),
        "Calculated daily returns"
    );

    let columns = complete_columns(&daily)?;
    let scale = trading_days as f64;
    let assets: Vec<AssetStatistics> = daily
        .symbols()
        .iter()
        .zip(&columns)
        .map(|(symbol, col)| AssetStatistics {
            symbol: symbol.clone(),
            mean_return: col.iter().mean() * scale,
            volatility: col.iter().std_dev() * scale.sqrt(),
        })
        .collect();
    for a in &assets {
        debug!(asset = %a.symbol, mean = a.mean_return, vol = a.volatility, "Annualized statistics");
    }

    let covariance = covariance_from_returns(&daily, trading_days)?;
    Ok(PreprocessedStatistics {
        assets,
        covariance,
        daily_returns: daily,
    })
}

/// Column-major view over complete rows; at least two rows are required.
fn complete_columns(table: &ReturnsTable) -> PortfolioMcResult<Vec<Vec<f64>>> {
    let n = table.symbols().len();
    if n == 0 {
        return Err(PortfolioMcError::InsufficientData(
            "Table has no asset columns".into(),
        ));
    }
    let mut columns = vec![Vec::with_capacity(table.len()); n];
    for row in table.complete_rows() {
        for (col, v) in columns.iter_mut().zip(row) {
            col.push(v);
        }
    }
    let usable = columns[0].len();
    if usable < 2 {
        return Err(PortfolioMcError::InsufficientData(format!(
            "At least 2 usable return observations required, found {usable}"
        )));
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn prices(rows: &[[Option<f64>; 2]]) -> PriceTable {
        let mut t = PriceTable::new(vec!["A".into(), "B".into()]);
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        for (i, r) in rows.iter().enumerate() {
            t.push_row(start + chrono::Days::new(i as u64), r.to_vec()).unwrap();
        }
        t
    }

    #[test]
    fn test_daily_returns_drop_first_and_missing() {
        let t = prices(&[
            [Some(100.0), Some(10.0)],
            [Some(110.0), Some(11.0)],
            [Some(121.0), None],
            [Some(121.0), Some(11.0)],
        ]);
        let r = daily_returns(&t).unwrap();
        // Row 2 has a missing value, row 3's predecessor is missing.
        assert_eq!(r.len(), 1);
        let row = r.complete_rows().next().unwrap();
        assert!((row[0] - 0.1).abs() < 1e-12);
        assert!((row[1] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_annualization() {
        let t = prices(&[
            [Some(100.0), Some(100.0)],
            [Some(101.0), Some(99.0)],
            [Some(100.0), Some(100.0)],
            [Some(102.0), Some(101.0)],
        ]);
        let stats = compute_statistics(&t, 252).unwrap();
        let cols = complete_columns(&stats.daily_returns).unwrap();
        let mean_a = cols[0].iter().sum::<f64>() / 3.0;
        assert!((stats.assets[0].mean_return - mean_a * 252.0).abs() < 1e-12);

        let var_a = cols[0].iter().map(|x| (x - mean_a).powi(2)).sum::<f64>() / 2.0;
        assert!((stats.assets[0].volatility - (var_a * 252.0).sqrt()).abs() < 1e-12);
        let cov = stats.covariance.matrix();
        assert!((cov[(0, 0)] - var_a * 252.0).abs() < 1e-12);
        assert_eq!(cov[(0, 1)], cov[(1, 0)]);
    }

    #[test]
    fn test_insufficient_history() {
        let t = prices(&[[Some(100.0), Some(10.0)], [Some(101.0), Some(10.5)]]);
        let err = compute_statistics(&t, 252).unwrap_err();
        assert!(matches!(err, PortfolioMcError::InsufficientData(_)));
    }

    #[test]
    fn test_non_finite_price_rejected() {
        let t = prices(&[[Some(100.0), Some(10.0)], [Some(f64::INFINITY), Some(10.5)]]);
        assert!(matches!(
            daily_returns(&t).unwrap_err(),
            PortfolioMcError::DataQuality(_)
        ));
    }

    #[test]
    fn test_cholesky_rejects_singular() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let cov = CovarianceMatrix::new(vec!["A".into(), "B".into()], m).unwrap();
        assert!(matches!(
            cov.cholesky_lower().unwrap_err(),
            PortfolioMcError::DataQuality(_)
        ));
    }

    #[test]
    fn test_asymmetric_rejected() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.2, 1.0]);
        assert!(CovarianceMatrix::new(vec!["A".into(), "B".into()], m).is_err());
    }

    #[test]
    fn test_cholesky_reconstructs() {
        let m = DMatrix::from_row_slice(2, 2, &[0.04, 0.006, 0.006, 0.01]);
        let cov = CovarianceMatrix::new(vec!["A".into(), "B".into()], m.clone()).unwrap();
        let l = cov.cholesky_lower().unwrap();
        assert!((&l * l.transpose() - m).abs().max() < 1e-15);
        assert_eq!(l[(0, 1)], 0.0);
    }
}
