use rand::Rng;
use rand_distr::{Dirichlet, Distribution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::PortfolioMcError;
use crate::types::Symbol;
use crate::PortfolioMcResult;

/// Tolerance on the unit-sum invariant.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Long-only, fully invested allocation over an ordered asset set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioWeights {
    symbols: Vec<Symbol>,
    values: Vec<f64>,
}

impl PortfolioWeights {
    /// Build weights, checking that they are non-negative and sum to 1.
    pub fn new(symbols: Vec<Symbol>, values: Vec<f64>) -> PortfolioMcResult<Self> {
        if symbols.is_empty() || symbols.len() != values.len() {
            return Err(PortfolioMcError::InvalidInput {
                field: "weights".into(),
                reason: format!(
                    "{} symbols but {} weights",
                    symbols.len(),
                    values.len()
                ),
            });
        }
        if let Some((s, w)) = symbols
            .iter()
            .zip(&values)
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(PortfolioMcError::InvalidInput {
                field: "weights".into(),
                reason: format!("Weight for {s} must be finite and non-negative, got {w}"),
            });
        }
        let total: f64 = values.iter().sum();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(PortfolioMcError::InvalidInput {
                field: "weights".into(),
                reason: format!("Weights must sum to 1, got {total}"),
            });
        }
        Ok(PortfolioWeights { symbols, values })
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, f64)> {
        self.symbols.iter().zip(self.values.iter().copied())
    }

    pub fn to_map(&self) -> BTreeMap<Symbol, f64> {
        self.iter().map(|(s, w)| (s.clone(), w)).collect()
    }
}

/// Draw one allocation from a symmetric Dirichlet(1, …, 1) over `symbols`.
pub fn generate_weights<R: Rng + ?Sized>(
    symbols: &[Symbol],
    rng: &mut R,
) -> PortfolioMcResult<PortfolioWeights> {
    let values = match symbols.len() {
        0 => {
            return Err(PortfolioMcError::InvalidInput {
                field: "num_assets".into(),
                reason: "At least one asset is required".into(),
            })
        }
        1 => vec![1.0],
        n => {
            let dirichlet =
                Dirichlet::new_with_size(1.0, n).map_err(|e| PortfolioMcError::InvalidInput {
                    field: "num_assets".into(),
                    reason: format!("Invalid Dirichlet parameters: {e}"),
                })?;
            dirichlet.sample(rng)
        }
    };
    PortfolioWeights::new(symbols.to_vec(), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn symbols(n: usize) -> Vec<Symbol> {
        (0..n).map(|i| format!("A{i}")).collect()
    }

    #[test]
    fn test_weights_are_valid_simplex_points() {
        let mut rng = StdRng::seed_from_u64(42);
        for n in 1..=12 {
            for _ in 0..200 {
                let w = generate_weights(&symbols(n), &mut rng).unwrap();
                assert_eq!(w.len(), n);
                assert!(w.values().iter().all(|&x| x >= 0.0));
                let total: f64 = w.values().iter().sum();
                assert!((total - 1.0).abs() < 1e-9, "total={total}");
            }
        }
    }

    #[test]
    fn test_no_structural_bias() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 4;
        let draws = 20_000;
        let mut sums = vec![0.0; n];
        for _ in 0..draws {
            let w = generate_weights(&symbols(n), &mut rng).unwrap();
            for (s, x) in sums.iter_mut().zip(w.values()) {
                *s += x;
            }
        }
        for s in sums {
            let mean = s / draws as f64;
            assert!((mean - 0.25).abs() < 0.01, "mean={mean}");
        }
    }

    #[test]
    fn test_single_asset_is_fully_invested() {
        let mut rng = StdRng::seed_from_u64(1);
        let w = generate_weights(&symbols(1), &mut rng).unwrap();
        assert_eq!(w.values(), &[1.0]);
    }

    #[test]
    fn test_zero_assets_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(generate_weights(&[], &mut rng).is_err());
    }

    #[test]
    fn test_seeded_draws_repeat() {
        let a = generate_weights(&symbols(5), &mut StdRng::seed_from_u64(9)).unwrap();
        let b = generate_weights(&symbols(5), &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_weights_rejected() {
        assert!(PortfolioWeights::new(symbols(2), vec![0.7, 0.7]).is_err());
        assert!(PortfolioWeights::new(symbols(2), vec![1.5, -0.5]).is_err());
        assert!(PortfolioWeights::new(symbols(2), vec![1.0]).is_err());
    }
}
