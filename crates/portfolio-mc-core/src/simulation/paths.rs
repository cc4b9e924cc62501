//! Correlated multi-asset geometric Brownian motion.
//!
//! Each step multiplies every asset price by `exp(drift + diffusion)` with
//!
//! - `drift = (μ − ½·diag Σ) / D`
//! - `diffusion = L · z · sqrt(1 / D)`, `z ~ N(0, I)`, `L Lᵀ = Σ`
//!
//! where μ and Σ are annualized and `D` is the number of trading days per
//! year. Prices start at 1.0, so the terminal portfolio return of a trial is
//! `prices · w − 1`.

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::PortfolioMcError;
use crate::simulation::SeedSequence;
use crate::statistics::CovarianceMatrix;
use crate::weights::PortfolioWeights;
use crate::PortfolioMcResult;

/// Time discretisation of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationHorizon {
    pub trading_days: usize,
    pub years: usize,
}

impl SimulationHorizon {
    pub fn new(trading_days: usize, years: usize) -> Self {
        SimulationHorizon { trading_days, years }
    }

    pub fn steps(&self) -> usize {
        self.trading_days * self.years
    }
}

impl Default for SimulationHorizon {
    fn default() -> Self {
        SimulationHorizon::new(252, 1)
    }
}

/// One simulated trajectory: `(steps + 1) × assets`, row 0 is all ones.
pub type PricePath = DMatrix<f64>;

/// Trajectories for a set of trials. Only lives while metrics are computed.
#[derive(Debug, Clone)]
pub struct PricePathBatch {
    pub paths: Vec<PricePath>,
}

impl PricePathBatch {
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Terminal portfolio return of every trial.
    pub fn terminal_returns(&self, weights: &PortfolioWeights) -> Vec<f64> {
        self.paths
            .iter()
            .map(|p| {
                let last = p.row(p.nrows() - 1);
                last.iter()
                    .zip(weights.values())
                    .map(|(p, w)| p * w)
                    .sum::<f64>()
                    - 1.0
            })
            .collect()
    }
}

/// Correlated GBM simulator. The Cholesky factor is computed once and shared
/// by every step and trial.
#[derive(Debug, Clone)]
pub struct PathSimulator {
    drift: DVector<f64>,
    /// `L · sqrt(1 / D)`
    scaled_cholesky: DMatrix<f64>,
    horizon: SimulationHorizon,
}

impl PathSimulator {
    pub fn new(
        mean_returns: &[f64],
        covariance: &CovarianceMatrix,
        horizon: SimulationHorizon,
    ) -> PortfolioMcResult<Self> {
        let n = covariance.dim();
        if mean_returns.len() != n {
            return Err(PortfolioMcError::InvalidInput {
                field: "mean_returns".into(),
                reason: format!("Expected {n} mean returns, got {}", mean_returns.len()),
            });
        }
        if mean_returns.iter().any(|m| !m.is_finite()) {
            return Err(PortfolioMcError::DataQuality(
                "Mean returns contain non-finite values".into(),
            ));
        }
        if horizon.steps() == 0 {
            return Err(PortfolioMcError::InvalidInput {
                field: "horizon".into(),
                reason: "Simulation needs at least one step".into(),
            });
        }

        let dt = 1.0 / horizon.trading_days as f64;
        let lower = covariance.cholesky_lower()?;
        let variances = covariance.variances();
        let drift = DVector::from_iterator(
            n,
            mean_returns
                .iter()
                .zip(&variances)
                .map(|(mu, var)| (mu - 0.5 * var) * dt),
        );

        Ok(PathSimulator {
            drift,
            scaled_cholesky: lower * dt.sqrt(),
            horizon,
        })
    }

    pub fn num_assets(&self) -> usize {
        self.drift.len()
    }

    pub fn horizon(&self) -> SimulationHorizon {
        self.horizon
    }

    /// Advance `prices` by one step, using `z` and `shock` as scratch space.
    fn step<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        prices: &mut [f64],
        z: &mut DVector<f64>,
        shock: &mut DVector<f64>,
    ) {
        for zi in z.iter_mut() {
            *zi = rng.sample(StandardNormal);
        }
        shock.gemv(1.0, &self.scaled_cholesky, &*z, 0.0);
        for ((p, d), s) in prices.iter_mut().zip(self.drift.iter()).zip(shock.iter()) {
            *p *= (d + s).exp();
        }
    }

    /// Full trajectory of one trial.
    pub fn simulate_path<R: Rng + ?Sized>(&self, rng: &mut R) -> PricePath {
        let n = self.num_assets();
        let steps = self.horizon.steps();
        let mut path = DMatrix::from_element(steps + 1, n, 1.0);
        let mut prices = vec![1.0; n];
        let mut z = DVector::zeros(n);
        let mut shock = DVector::zeros(n);
        for t in 1..=steps {
            self.step(rng, &mut prices, &mut z, &mut shock);
            for (j, p) in prices.iter().enumerate() {
                path[(t, j)] = *p;
            }
        }
        path
    }

    /// Terminal portfolio return of one trial without materialising the path.
    ///
    /// Consumes the random stream exactly like [`simulate_path`](Self::simulate_path).
    pub fn simulate_terminal_return<R: Rng + ?Sized>(&self, rng: &mut R, weights: &[f64]) -> f64 {
        let n = self.num_assets();
        let mut prices = vec![1.0; n];
        let mut z = DVector::zeros(n);
        let mut shock = DVector::zeros(n);
        for _ in 0..self.horizon.steps() {
            self.step(rng, &mut prices, &mut z, &mut shock);
        }
        prices.iter().zip(weights).map(|(p, w)| p * w).sum::<f64>() - 1.0
    }

    fn check_weights(&self, weights: &PortfolioWeights) -> PortfolioMcResult<()> {
        if weights.len() != self.num_assets() {
            return Err(PortfolioMcError::InvalidInput {
                field: "weights".into(),
                reason: format!(
                    "Simulator has {} assets, weights have {}",
                    self.num_assets(),
                    weights.len()
                ),
            });
        }
        Ok(())
    }

    /// Terminal returns of `trials` independent trials, evaluated in parallel.
    ///
    /// Trial `i` draws from `seeds.child(i)`, so the output is identical to
    /// [`simulate_terminal_returns_sequential`](Self::simulate_terminal_returns_sequential).
    pub fn simulate_terminal_returns(
        &self,
        weights: &PortfolioWeights,
        trials: usize,
        seeds: SeedSequence,
    ) -> PortfolioMcResult<Vec<f64>> {
        self.check_weights(weights)?;
        let w = weights.values();
        Ok((0..trials)
            .into_par_iter()
            .map(|i| {
                let mut rng = seeds.child(i as u64).rng();
                self.simulate_terminal_return(&mut rng, w)
            })
            .collect())
    }

    pub fn simulate_terminal_returns_sequential(
        &self,
        weights: &PortfolioWeights,
        trials: usize,
        seeds: SeedSequence,
    ) -> PortfolioMcResult<Vec<f64>> {
        self.check_weights(weights)?;
        let w = weights.values();
        let mut out = Vec::with_capacity(trials);
        for i in 0..trials {
            let mut rng = seeds.child(i as u64).rng();
            out.push(self.simulate_terminal_return(&mut rng, w));
        }
        Ok(out)
    }

    /// Full trajectories for `trials` trials, seeded like the terminal-only paths.
    pub fn simulate_paths(&self, trials: usize, seeds: SeedSequence) -> PricePathBatch {
        let paths = (0..trials)
            .into_par_iter()
            .map(|i| self.simulate_path(&mut seeds.child(i as u64).rng()))
            .collect();
        PricePathBatch { paths }
    }
}
