use approx::assert_relative_eq;
use vault_thresholds::simulation::{HestonParams, MertonParams, PathParams, Process, Simulation};
use vault_thresholds::stats;

fn params(n: usize) -> PathParams {
    PathParams {
        steps: 1,
        maturity: 21,
        n_simulations: n,
        sigma: 0.05,
        mu: 0.0,
        initial_value: 1.0,
    }
}

const ALL: [Process; 4] = [
    Process::Gbm,
    Process::Black,
    Process::MertonJumpDiffusion,
    Process::Heston,
];

// ═══════════════════════════════════════════════════════════════════════
// Shape and determinism
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_path_shape() {
    let p = PathParams {
        steps: 4,
        maturity: 7,
        initial_value: 0.02,
        ..params(50)
    };
    let result = Simulation::new(Process::Gbm).simulate(&p).unwrap();

    assert_eq!(result.n_paths(), 50);
    assert_eq!(result.total_steps(), 28);
    assert_relative_eq!(p.dt(), 0.25);
    for path in &result.paths {
        assert_eq!(path.len(), 29);
        assert_relative_eq!(path[0], 0.02);
    }
}

#[test]
fn test_same_seed_same_paths() {
    for process in ALL {
        let a = Simulation::new(process).with_seed(7).simulate(&params(100)).unwrap();
        let b = Simulation::new(process).with_seed(7).simulate(&params(100)).unwrap();
        assert_eq!(a.paths, b.paths, "{} is not deterministic", process);
    }
}

#[test]
fn test_different_seed_different_paths() {
    let a = Simulation::new(Process::Gbm).with_seed(1).simulate(&params(10)).unwrap();
    let b = Simulation::new(Process::Gbm).with_seed(2).simulate(&params(10)).unwrap();
    assert_ne!(a.paths, b.paths);
}

#[test]
fn test_paths_are_independent_of_count() {
    // Path i only depends on seed + i
    let few = Simulation::new(Process::Heston).simulate(&params(5)).unwrap();
    let many = Simulation::new(Process::Heston).simulate(&params(500)).unwrap();
    assert_eq!(few.paths[..], many.paths[..5]);
}

#[test]
fn test_all_processes_stay_positive_and_finite() {
    for process in ALL {
        let result = Simulation::new(process).simulate(&params(500)).unwrap();
        for path in &result.paths {
            assert!(
                path.iter().all(|v| v.is_finite() && *v > 0.0),
                "{} produced an invalid value",
                process
            );
        }
    }
}

#[test]
fn test_zero_volatility_gbm_is_flat() {
    let p = PathParams {
        sigma: 0.0,
        ..params(20)
    };
    for process in [Process::Gbm, Process::Black] {
        let result = Simulation::new(process).simulate(&p).unwrap();
        for path in &result.paths {
            assert!(path.iter().all(|&v| v == 1.0));
        }
    }
}

#[test]
fn test_drift_without_volatility() {
    let p = PathParams {
        sigma: 0.0,
        mu: 0.01,
        ..params(3)
    };
    let result = Simulation::new(Process::Gbm).simulate(&p).unwrap();
    for v in result.terminal_values() {
        assert_relative_eq!(v, (0.01f64 * 21.0).exp(), epsilon = 1e-12);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Distribution
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_gbm_terminal_mean_and_volatility() {
    let p = PathParams {
        maturity: 10,
        sigma: 0.02,
        ..params(20_000)
    };
    let result = Simulation::new(Process::Gbm).simulate(&p).unwrap();
    let summary = result.summary_at(10).unwrap();

    // E[S_T] = S_0 with zero drift; std of log returns = sigma * sqrt(T)
    assert_relative_eq!(summary.mean, 1.0, epsilon = 0.005);
    let logs: Vec<f64> = result.terminal_values().iter().map(|v| v.ln()).collect();
    assert_relative_eq!(stats::std_dev(&logs), 0.02 * 10f64.sqrt(), epsilon = 0.003);
    assert!(summary.min < 1.0 && summary.max > 1.0);
}

#[test]
fn test_merton_jumps_widen_the_tails() {
    let gbm = Simulation::new(Process::Gbm).simulate(&params(5_000)).unwrap();
    let merton = Simulation::new(Process::MertonJumpDiffusion)
        .with_merton(MertonParams {
            jump_intensity: 0.5,
            mean_log_jump: -0.1,
            jump_volatility: 0.1,
        })
        .simulate(&params(5_000))
        .unwrap();

    let worst = |values: Vec<f64>| values.into_iter().fold(f64::INFINITY, f64::min);
    assert!(worst(merton.terminal_values()) < worst(gbm.terminal_values()));
}

#[test]
fn test_merton_calibration() {
    let jumps = MertonParams::calibrated(0.04);
    assert_relative_eq!(jumps.jump_intensity, 1.0);
    assert_relative_eq!(jumps.jump_volatility, 0.02, epsilon = 1e-15);
    assert_relative_eq!(jumps.mean_log_jump, -0.0004, epsilon = 1e-15);

    let flat = MertonParams::calibrated(0.0);
    assert_relative_eq!(flat.jump_volatility, 0.0);
}

#[test]
fn test_drawdowns_relative_to_start() {
    let p = PathParams {
        initial_value: 50.0,
        ..params(100)
    };
    let result = Simulation::new(Process::Gbm).simulate(&p).unwrap();

    assert!(result.drawdowns_at(0).unwrap().iter().all(|&d| d == 0.0));
    let drawdowns = result.drawdowns_at(5).unwrap();
    let values = result.values_at(5).unwrap();
    for (d, v) in drawdowns.iter().zip(&values) {
        assert_relative_eq!(*d, v / 50.0 - 1.0, epsilon = 1e-12);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Validation
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_invalid_parameters_are_rejected() {
    let sim = Simulation::new(Process::Gbm);
    assert!(sim.simulate(&PathParams { steps: 0, ..params(10) }).is_err());
    assert!(sim.simulate(&PathParams { maturity: 0, ..params(10) }).is_err());
    assert!(sim.simulate(&params(0)).is_err());
    assert!(sim.simulate(&PathParams { sigma: -0.1, ..params(10) }).is_err());
    assert!(sim.simulate(&PathParams { sigma: f64::NAN, ..params(10) }).is_err());
    assert!(sim.simulate(&PathParams { initial_value: 0.0, ..params(10) }).is_err());
}

#[test]
fn test_heston_correlation_out_of_range() {
    let sim = Simulation::new(Process::Heston).with_heston(HestonParams {
        rho: 1.5,
        ..HestonParams::calibrated(0.05)
    });
    assert!(sim.simulate(&params(10)).is_err());
}

#[test]
fn test_step_beyond_horizon() {
    let result = Simulation::new(Process::Gbm).simulate(&params(10)).unwrap();
    assert!(result.values_at(22).is_err());
    assert!(result.drawdowns_at(22).is_err());
    assert!(result.values_at(21).is_ok());
}

#[test]
fn test_process_names() {
    assert_eq!(Process::MertonJumpDiffusion.to_string(), "merton_jump_diffusion");
    let parsed: Process = serde_json::from_str("\"heston\"").unwrap();
    assert_eq!(parsed, Process::Heston);
}
