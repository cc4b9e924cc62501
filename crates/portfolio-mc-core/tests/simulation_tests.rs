use portfolio_mc_core::metrics::reduce_returns;
use portfolio_mc_core::simulation::{PathSimulator, SeedSequence, SimulationHorizon};
use portfolio_mc_core::statistics::CovarianceMatrix;
use portfolio_mc_core::weights::PortfolioWeights;
use statrs::statistics::Statistics;

fn symbols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Path simulator
// ---------------------------------------------------------------------------

#[test]
fn test_log_terminal_variance_matches_sigma_squared() {
    // Σ = σ²·I over a one-year horizon: ln(S_T) ~ N((μ − σ²/2), σ²)
    let sigma2 = 0.04;
    let mu = [0.08, 0.03, -0.02];
    let cov = CovarianceMatrix::diagonal(symbols(&["A", "B", "C"]), &[sigma2; 3]).unwrap();
    let sim = PathSimulator::new(&mu, &cov, SimulationHorizon::default()).unwrap();

    let batch = sim.simulate_paths(2_000, SeedSequence::new(2024));
    assert_eq!(batch.len(), 2_000);

    for (asset, m) in mu.iter().enumerate() {
        let logs: Vec<f64> = batch
            .paths
            .iter()
            .map(|p| p[(p.nrows() - 1, asset)].ln())
            .collect();
        let var = logs.iter().variance();
        let mean = logs.iter().mean();
        assert!(
            (var - sigma2).abs() < 0.15 * sigma2,
            "asset {asset}: variance {var} vs {sigma2}"
        );
        assert!(
            (mean - (m - 0.5 * sigma2)).abs() < 0.02,
            "asset {asset}: log drift {mean}"
        );
    }
}

#[test]
fn test_log_variance_scales_with_horizon() {
    let sigma2 = 0.04;
    let cov = CovarianceMatrix::diagonal(symbols(&["A"]), &[sigma2]).unwrap();
    let sim = PathSimulator::new(&[0.05], &cov, SimulationHorizon::new(252, 2)).unwrap();
    let batch = sim.simulate_paths(2_000, SeedSequence::new(9));
    let logs: Vec<f64> = batch.paths.iter().map(|p| p[(504, 0)].ln()).collect();
    let var = logs.iter().variance();
    assert!((var - 2.0 * sigma2).abs() < 0.15 * 2.0 * sigma2, "variance {var}");
}

#[test]
fn test_correlation_is_reproduced() {
    let rho = 0.6;
    let (va, vb) = (0.04_f64, 0.09_f64);
    let cross = rho * (va * vb).sqrt();
    let cov = CovarianceMatrix::new(
        symbols(&["A", "B"]),
        nalgebra::DMatrix::from_row_slice(2, 2, &[va, cross, cross, vb]),
    )
    .unwrap();
    let sim = PathSimulator::new(&[0.0, 0.0], &cov, SimulationHorizon::default()).unwrap();
    let batch = sim.simulate_paths(2_000, SeedSequence::new(77));
    let a: Vec<f64> = batch.paths.iter().map(|p| p[(252, 0)].ln()).collect();
    let b: Vec<f64> = batch.paths.iter().map(|p| p[(252, 1)].ln()).collect();
    let corr = a.iter().covariance(b.iter()) / (a.iter().std_dev() * b.iter().std_dev());
    assert!((corr - rho).abs() < 0.06, "correlation {corr}");
}

// ---------------------------------------------------------------------------
// Two-asset scenario
// ---------------------------------------------------------------------------

#[test]
fn test_two_asset_scenario_metrics() {
    // μ = [0.08, 0.05], σ = [0.2, 0.1], ρ = 0, w = {A: 0.6, B: 0.4}
    let names = symbols(&["A", "B"]);
    let cov = CovarianceMatrix::diagonal(names.clone(), &[0.04, 0.01]).unwrap();
    let sim = PathSimulator::new(&[0.08, 0.05], &cov, SimulationHorizon::default()).unwrap();
    let weights = PortfolioWeights::new(names, vec![0.6, 0.4]).unwrap();

    let returns = sim
        .simulate_terminal_returns(&weights, 10_000, SeedSequence::new(11))
        .unwrap();
    assert_eq!(returns.len(), 10_000);
    let m = reduce_returns(&returns, 0.01).unwrap();

    // E[R] = 0.6(e^0.08 − 1) + 0.4(e^0.05 − 1)
    let expected = 0.6 * (0.08_f64.exp() - 1.0) + 0.4 * (0.05_f64.exp() - 1.0);
    // Var of a lognormal with log-mean m and log-variance s²: e^(2m+s²)(e^s² − 1)
    let lognormal_var = |mu: f64, s2: f64| ((2.0 * (mu - 0.5 * s2)) + s2).exp() * (s2.exp() - 1.0);
    let vol = (0.36 * lognormal_var(0.08, 0.04) + 0.16 * lognormal_var(0.05, 0.01)).sqrt();

    assert!((m.expected_return - expected).abs() < 0.006, "mean {}", m.expected_return);
    assert!((m.volatility - vol).abs() < 0.006, "vol {} vs {vol}", m.volatility);
    assert!(
        (m.sharpe_ratio - (m.expected_return - 0.01) / m.volatility).abs() < 1e-12
    );
    assert!(m.probability_of_loss > 0.25 && m.probability_of_loss < 0.40);
    assert!(m.var_95 > -0.25 && m.var_95 < -0.08, "VaR {}", m.var_95);
    assert!(m.is_finite());
}

#[test]
fn test_fast_path_matches_full_paths() {
    let names = symbols(&["A", "B"]);
    let cov = CovarianceMatrix::diagonal(names.clone(), &[0.04, 0.01]).unwrap();
    let sim = PathSimulator::new(&[0.08, 0.05], &cov, SimulationHorizon::default()).unwrap();
    let weights = PortfolioWeights::new(names, vec![0.6, 0.4]).unwrap();

    let seeds = SeedSequence::new(5);
    let fast = sim.simulate_terminal_returns(&weights, 50, seeds).unwrap();
    let full = sim.simulate_paths(50, seeds).terminal_returns(&weights);
    assert_eq!(fast, full);
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[test]
fn test_var_on_evenly_spaced_returns() {
    let returns: Vec<f64> = (0..100).map(|i| -0.5 + i as f64 / 99.0).collect();
    let m = reduce_returns(&returns, 0.01).unwrap();
    assert!((m.var_95 - (-0.45)).abs() < 1e-12, "VaR {}", m.var_95);
    assert!((m.probability_of_loss - 0.5).abs() < 1e-12);
}
