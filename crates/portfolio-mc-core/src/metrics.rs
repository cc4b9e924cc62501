use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::error::PortfolioMcError;
use crate::types::Rate;
use crate::PortfolioMcResult;

/// Percentile used for Value-at-Risk (5th percentile = 95% VaR).
pub const VAR_PERCENTILE: f64 = 5.0;

/// Scalar risk statistics of one candidate's simulated terminal returns.
///
/// Values are raw f64; a zero volatility leaves `sharpe_ratio` non-finite.
/// Clamping happens at the storage boundary, not here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub expected_return: Rate,
    pub volatility: Rate,
    pub sharpe_ratio: f64,
    pub probability_of_loss: f64,
    pub var_95: Rate,
}

impl PortfolioMetrics {
    pub fn is_finite(&self) -> bool {
        [
            self.expected_return,
            self.volatility,
            self.sharpe_ratio,
            self.probability_of_loss,
            self.var_95,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Reduce simulated terminal returns to portfolio statistics.
///
/// Volatility is the population standard deviation. Sharpe is
/// `(mean − risk_free_rate) / volatility`.
pub fn reduce_returns(returns: &[f64], risk_free_rate: Rate) -> PortfolioMcResult<PortfolioMetrics> {
    if returns.is_empty() {
        return Err(PortfolioMcError::InsufficientData(
            "At least one simulated return is required".into(),
        ));
    }

    let expected_return = returns.iter().mean();
    let volatility = returns.iter().population_std_dev();
    let sharpe_ratio = (expected_return - risk_free_rate) / volatility;

    let losses = returns.iter().filter(|r| **r < 0.0).count();
    let probability_of_loss = losses as f64 / returns.len() as f64;

    let mut sorted = returns.to_vec();
    sorted.sort_by(f64::total_cmp);
    let var_95 = percentile_sorted(&sorted, VAR_PERCENTILE);

    Ok(PortfolioMetrics {
        expected_return,
        volatility,
        sharpe_ratio,
        probability_of_loss,
        var_95,
    })
}

/// Compute the percentile value from a **sorted** slice using linear interpolation.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        len => {
            let rank = p / 100.0 * (len - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            if lower == upper {
                sorted[lower]
            } else {
                let frac = rank - lower as f64;
                sorted[lower] * (1.0 - frac) + sorted[upper] * frac
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
            .collect()
    }

    #[test]
    fn test_var_on_even_grid() {
        let r = linspace(-0.5, 0.5, 100);
        let m = reduce_returns(&r, 0.01).unwrap();
        // rank = 0.05 * 99 = 4.95 → −0.5 + 4.95/99
        assert!((m.var_95 - (-0.45)).abs() < 1e-12, "var={}", m.var_95);
    }

    #[test]
    fn test_var_independent_of_input_order() {
        let mut r = linspace(-0.5, 0.5, 100);
        r.reverse();
        let m = reduce_returns(&r, 0.01).unwrap();
        assert!((m.var_95 + 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_moments_and_loss_probability() {
        let r = [0.1, -0.1, 0.2, 0.0];
        let m = reduce_returns(&r, 0.01).unwrap();
        assert!((m.expected_return - 0.05).abs() < 1e-12);
        let var = (0.05f64.powi(2) + 0.15f64.powi(2) + 0.15f64.powi(2) + 0.05f64.powi(2)) / 4.0;
        assert!((m.volatility - var.sqrt()).abs() < 1e-12);
        assert!((m.sharpe_ratio - (0.04 / var.sqrt())).abs() < 1e-12);
        // 0.0 is not a loss
        assert_eq!(m.probability_of_loss, 0.25);
    }

    #[test]
    fn test_single_trial_has_zero_volatility() {
        let m = reduce_returns(&[0.05], 0.01).unwrap();
        assert_eq!(m.volatility, 0.0);
        assert!(!m.sharpe_ratio.is_finite());
        assert!(!m.is_finite());
        assert_eq!(m.var_95, 0.05);
    }

    #[test]
    fn test_constant_sample_at_risk_free_is_nan() {
        let m = reduce_returns(&[0.01; 10], 0.01).unwrap();
        assert!(m.sharpe_ratio.is_nan());
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(
            reduce_returns(&[], 0.01).unwrap_err(),
            PortfolioMcError::InsufficientData(_)
        ));
    }

    #[test]
    fn test_percentile_endpoints() {
        let s = [1.0, 2.0, 3.0];
        assert_eq!(percentile_sorted(&s, 0.0), 1.0);
        assert_eq!(percentile_sorted(&s, 50.0), 2.0);
        assert_eq!(percentile_sorted(&s, 100.0), 3.0);
        assert_eq!(percentile_sorted(&s, 25.0), 1.5);
    }

    #[test]
    fn test_nan_return_sorts_without_panicking() {
        let mut r = linspace(-0.5, 0.5, 40);
        r[7] = f64::NAN;
        r[30] = f64::NAN;
        let m = reduce_returns(&r, 0.01).unwrap();
        // NaN sorts after every finite value, so the low tail stays finite.
        assert!(m.var_95.is_finite());
        assert!(!m.is_finite());
    }
}
