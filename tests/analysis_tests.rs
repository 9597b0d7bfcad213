use approx::assert_relative_eq;
use chrono::{TimeZone, Utc};
use vault_thresholds::analysis::{
    estimate_thresholds, historical_threshold_multiplier, quantile_multiplier, Analysis,
    ThresholdKind,
};
use vault_thresholds::returns::PriceSeries;
use vault_thresholds::simulation::{PathParams, Process, Simulation, SimulationResult};
use vault_thresholds::ThresholdError;

/// Paths with a single step whose relative changes are `changes`.
fn one_step_result(changes: &[f64]) -> SimulationResult {
    SimulationResult {
        process: Process::Gbm,
        params: PathParams {
            steps: 1,
            maturity: 1,
            n_simulations: changes.len(),
            sigma: 0.0,
            mu: 0.0,
            initial_value: 1.0,
        },
        seed: 0,
        paths: changes.iter().map(|c| vec![1.0, 1.0 + c]).collect(),
    }
}

fn simulated(sigma: f64, maturity: usize) -> SimulationResult {
    let params = PathParams {
        steps: 1,
        maturity,
        n_simulations: 2_000,
        sigma,
        mu: 0.0,
        initial_value: 1.0,
    };
    Simulation::new(Process::Gbm).simulate(&params).unwrap()
}

fn prices(values: &[f64]) -> PriceSeries {
    PriceSeries::from_prices(Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap(), values)
}

// ═══════════════════════════════════════════════════════════════════════
// Analytical multiplier
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_known_quantile() {
    let changes: Vec<f64> = (0..10).map(|i| -(i as f64) / 100.0).collect();
    let result = one_step_result(&changes);
    let analysis = Analysis::new(&result);

    // Sorted descending, alpha * n picks index 5 and 9
    assert_relative_eq!(analysis.threshold_multiplier(0.5, 1).unwrap(), 1.0 / 0.95, epsilon = 1e-12);
    assert_relative_eq!(analysis.threshold_multiplier(0.95, 1).unwrap(), 1.0 / 0.91, epsilon = 1e-12);
}

#[test]
fn test_quantile_ignores_input_order() {
    let a = quantile_multiplier(&[-0.2, 0.1, -0.05, 0.0], 0.75).unwrap();
    let b = quantile_multiplier(&[0.0, -0.05, -0.2, 0.1], 0.75).unwrap();
    assert_relative_eq!(a, b);
    assert_relative_eq!(a, 1.0 / 0.8, epsilon = 1e-12);
}

#[test]
fn test_rising_sample_needs_less_than_par() {
    let result = one_step_result(&[0.1, 0.2, 0.05]);
    let m = Analysis::new(&result).threshold_multiplier(0.9, 1).unwrap();
    assert!(m < 1.0);
}

#[test]
fn test_higher_confidence_never_lowers_multiplier() {
    let result = simulated(0.04, 7);
    let analysis = Analysis::new(&result);

    let mut previous = 0.0;
    for alpha in [0.5, 0.8, 0.9, 0.95, 0.99, 0.999] {
        let m = analysis.threshold_multiplier_for_period(alpha, 7).unwrap();
        assert!(m >= previous, "alpha {} gave {} < {}", alpha, m, previous);
        previous = m;
    }
    assert!(previous > 1.0);
}

#[test]
fn test_longer_horizon_needs_more_collateral() {
    let result = simulated(0.04, 21);
    let analysis = Analysis::new(&result);
    let short = analysis.threshold_multiplier_for_period(0.99, 2).unwrap();
    let long = analysis.threshold_multiplier_for_period(0.99, 21).unwrap();
    assert!(long > short);
}

#[test]
fn test_period_maps_to_sub_steps() {
    let params = PathParams {
        steps: 2,
        maturity: 3,
        n_simulations: 200,
        sigma: 0.05,
        mu: 0.0,
        initial_value: 1.0,
    };
    let result = Simulation::new(Process::Gbm).simulate(&params).unwrap();
    let analysis = Analysis::new(&result);
    assert_relative_eq!(
        analysis.threshold_multiplier_for_period(0.9, 2).unwrap(),
        analysis.threshold_multiplier(0.9, 4).unwrap()
    );
    assert!(analysis.threshold_multiplier_for_period(0.9, 4).is_err());
}

#[test]
fn test_invalid_requests() {
    let result = simulated(0.04, 2);
    let analysis = Analysis::new(&result);
    assert!(analysis.threshold_multiplier(0.99, 0).is_err());
    assert!(analysis.threshold_multiplier(0.99, 3).is_err());
    assert!(analysis.threshold_multiplier(0.0, 1).is_err());
    assert!(analysis.threshold_multiplier(1.0, 1).is_err());
    assert!(quantile_multiplier(&[], 0.5).is_err());
}

// ═══════════════════════════════════════════════════════════════════════
// Historical multiplier
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_historical_multiplier() {
    let p = prices(&[100.0, 90.0, 95.0, 80.0, 100.0]);

    // Daily changes sorted: 0.25, 0.0556, -0.1, -0.1579; index floor(3.6) = 3
    let daily = historical_threshold_multiplier(&p, 0.9, 1).unwrap();
    assert_relative_eq!(daily, 95.0 / 80.0, epsilon = 1e-12);

    // Two-day changes sorted: 0.0526, -0.05, -0.1111; index floor(2.7) = 2
    let two_day = historical_threshold_multiplier(&p, 0.9, 2).unwrap();
    assert_relative_eq!(two_day, 90.0 / 80.0, epsilon = 1e-12);
}

#[test]
fn test_nan_never_reaches_the_quantile() {
    let a = quantile_multiplier(&[f64::NAN, -0.3, 0.1, -0.1, 0.0], 0.5);
    let b = quantile_multiplier(&[-0.3, 0.1, -0.1, 0.0, f64::NAN], 0.5);
    assert!(matches!(a, Err(ThresholdError::InvalidParameter(_))));
    assert!(matches!(b, Err(ThresholdError::InvalidParameter(_))));

    let p = prices(&[100.0, 95.0, f64::NAN, 90.0, 92.0]);
    assert!(historical_threshold_multiplier(&p, 0.5, 1).is_err());
}

#[test]
fn test_historical_horizon_longer_than_sample() {
    let p = prices(&[1.0, 1.1, 1.2]);
    assert!(historical_threshold_multiplier(&p, 0.9, 3).is_err());
    assert!(historical_threshold_multiplier(&p, 0.9, 2).is_ok());
}

// ═══════════════════════════════════════════════════════════════════════
// Threshold estimation
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_estimate_thresholds_applies_risk_adjustment() {
    let result = simulated(0.04, 21);
    let history: Vec<f64> = (0..60).map(|i| 1.0 + 0.05 * ((i as f64) * 0.7).sin()).collect();
    let p = prices(&history);
    let periods = [
        (ThresholdKind::Liquidation, 2),
        (ThresholdKind::PremiumRedeem, 7),
        (ThresholdKind::SafeMint, 21),
    ];

    let plain = estimate_thresholds(&result, &p, 0.99, &periods, 1.0).unwrap();
    let adjusted = estimate_thresholds(&result, &p, 0.99, &periods, 1.1).unwrap();

    assert_eq!(adjusted.len(), 3);
    for ((kind, days), (a, b)) in periods.iter().zip(plain.iter().zip(&adjusted)) {
        assert_eq!(b.kind, *kind);
        assert_eq!(b.period_days, *days);
        assert_relative_eq!(b.analytical, a.analytical * 1.1, epsilon = 1e-12);
        assert_relative_eq!(b.historical, a.historical * 1.1, epsilon = 1e-12);
        assert!(b.suggested_percent() as f64 >= b.conservative() * 100.0 - 1e-6);
        assert_eq!(b.suggested_percent() % 5, 0);
    }
}

#[test]
fn test_estimate_thresholds_fails_beyond_simulated_horizon() {
    let result = simulated(0.04, 7);
    let p = prices(&[1.0; 40]);
    let periods = [(ThresholdKind::SafeMint, 21)];
    assert!(estimate_thresholds(&result, &p, 0.99, &periods, 1.0).is_err());
}

#[test]
fn test_threshold_names() {
    assert_eq!(ThresholdKind::all().len(), 3);
    assert_eq!(
        ThresholdKind::Liquidation.onchain_name(),
        "LiquidationCollateralThreshold"
    );
    assert_eq!(
        ThresholdKind::SafeMint.onchain_name(),
        "SecureCollateralThreshold"
    );
}
