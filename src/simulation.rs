//! Monte Carlo price path simulation.
//!
//! Each path models the price of the collateral quoted in the debt token.
//! Time is measured in the periods of the sample the parameters were
//! estimated from (days for daily returns): a path covers `maturity`
//! periods split into `steps` sub-steps each, so `dt = 1 / steps`.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, Poisson};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, ThresholdError};
use crate::stats;
use crate::token::TokenPair;

/// Stochastic process used to generate paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Process {
    /// Geometric Brownian Motion.
    Gbm,
    /// Driftless lognormal forward process (Black 76).
    Black,
    /// Merton jump-diffusion: GBM plus Poisson-arriving lognormal jumps.
    MertonJumpDiffusion,
    /// Heston stochastic volatility.
    Heston,
}

impl Process {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gbm => "gbm",
            Self::Black => "black",
            Self::MertonJumpDiffusion => "merton_jump_diffusion",
            Self::Heston => "heston",
        }
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Jump component of the Merton model, per time unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MertonParams {
    /// Expected number of jumps per period (lambda)
    pub jump_intensity: f64,
    /// Mean of the log jump size
    pub mean_log_jump: f64,
    /// Standard deviation of the log jump size
    pub jump_volatility: f64,
}

impl MertonParams {
    /// Calibration relative to the diffusion volatility: one jump per period
    /// whose volatility is half of sigma, with a negative mean log jump.
    pub fn calibrated(sigma: f64) -> Self {
        let jump_intensity: f64 = 1.0;
        let jump_volatility = sigma * (0.25 / jump_intensity).sqrt();
        MertonParams {
            jump_intensity,
            mean_log_jump: -jump_volatility * jump_volatility,
            jump_volatility,
        }
    }
}

/// Variance process of the Heston model, per time unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HestonParams {
    pub v0: f64,
    pub kappa: f64,
    pub theta: f64,
    pub rho: f64,
    /// Volatility of variance
    pub xi: f64,
}

impl HestonParams {
    pub fn calibrated(sigma: f64) -> Self {
        HestonParams {
            v0: 0.005,
            kappa: 0.8,
            theta: 0.008,
            rho: 0.2,
            xi: sigma,
        }
    }
}

/// Parameters shared by every process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathParams {
    /// Sub-steps within one period of the maturity
    pub steps: usize,
    /// Number of periods a path covers
    pub maturity: usize,
    pub n_simulations: usize,
    /// Per-period standard deviation of returns
    pub sigma: f64,
    /// Per-period drift
    pub mu: f64,
    pub initial_value: f64,
}

impl PathParams {
    /// Calibrate sigma, mu and the initial value from a pair's sample.
    ///
    /// Callers typically override some of the fields, e.g. `mu = 0` and
    /// `initial_value = 1` to simulate relative price changes.
    pub fn from_pair(
        pair: &TokenPair,
        steps: usize,
        maturity: usize,
        n_simulations: usize,
    ) -> Result<Self> {
        let returns = pair.returns()?;
        if returns.len() < 2 {
            return Err(ThresholdError::InsufficientData(format!(
                "{} has {} returns, need at least 2 to calibrate",
                pair.ticker(),
                returns.len()
            )));
        }
        let initial_value = pair
            .prices()?
            .first()
            .map(|p| p.price)
            .ok_or_else(|| ThresholdError::InsufficientData(pair.ticker()))?;

        Ok(PathParams {
            steps,
            maturity,
            n_simulations,
            sigma: stats::std_dev(returns),
            mu: stats::mean(returns),
            initial_value,
        })
    }

    pub fn total_steps(&self) -> usize {
        self.steps * self.maturity
    }

    pub fn dt(&self) -> f64 {
        1.0 / self.steps as f64
    }

    fn validate(&self) -> Result<()> {
        if self.steps == 0 || self.maturity == 0 {
            return Err(ThresholdError::InvalidParameter(format!(
                "steps ({}) and maturity ({}) must be positive",
                self.steps, self.maturity
            )));
        }
        if self.n_simulations == 0 {
            return Err(ThresholdError::InvalidParameter(
                "number of simulations must be positive".to_string(),
            ));
        }
        if !self.sigma.is_finite() || self.sigma < 0.0 {
            return Err(ThresholdError::InvalidParameter(format!(
                "sigma must be finite and non-negative, got {}",
                self.sigma
            )));
        }
        if !self.mu.is_finite() {
            return Err(ThresholdError::InvalidParameter(format!(
                "mu must be finite, got {}",
                self.mu
            )));
        }
        if !(self.initial_value > 0.0) {
            return Err(ThresholdError::InvalidParameter(format!(
                "initial value must be positive, got {}",
                self.initial_value
            )));
        }
        Ok(())
    }
}

/// Simulated trajectories plus the parameters that produced them.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub process: Process,
    pub params: PathParams,
    pub seed: u64,
    /// One row per path, `total_steps + 1` values each
    pub paths: Vec<Vec<f64>>,
}

/// Distribution of path values at one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    pub step: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl SimulationResult {
    pub fn total_steps(&self) -> usize {
        self.params.total_steps()
    }

    pub fn n_paths(&self) -> usize {
        self.paths.len()
    }

    /// Value of every path at `step`.
    pub fn values_at(&self, step: usize) -> Result<Vec<f64>> {
        if step > self.total_steps() {
            return Err(ThresholdError::InvalidParameter(format!(
                "step {} is beyond the simulated horizon of {} steps",
                step,
                self.total_steps()
            )));
        }
        Ok(self.paths.iter().map(|p| p[step]).collect())
    }

    pub fn terminal_values(&self) -> Vec<f64> {
        self.paths.iter().filter_map(|p| p.last().copied()).collect()
    }

    /// Relative change of every path between the start and `step`.
    pub fn drawdowns_at(&self, step: usize) -> Result<Vec<f64>> {
        if step > self.total_steps() {
            return Err(ThresholdError::InvalidParameter(format!(
                "step {} is beyond the simulated horizon of {} steps",
                step,
                self.total_steps()
            )));
        }
        Ok(self.paths.iter().map(|p| p[step] / p[0] - 1.0).collect())
    }

    pub fn summary_at(&self, step: usize) -> Result<StepSummary> {
        let values = self.values_at(step)?;
        Ok(StepSummary {
            step,
            mean: stats::mean(&values),
            std_dev: stats::std_dev(&values),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

/// Path generator for one process.
#[derive(Debug, Clone)]
pub struct Simulation {
    pub process: Process,
    pub seed: u64,
    pub merton: Option<MertonParams>,
    pub heston: Option<HestonParams>,
}

impl Simulation {
    pub fn new(process: Process) -> Self {
        Simulation {
            process,
            seed: 42,
            merton: None,
            heston: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_merton(mut self, params: MertonParams) -> Self {
        self.merton = Some(params);
        self
    }

    pub fn with_heston(mut self, params: HestonParams) -> Self {
        self.heston = Some(params);
        self
    }

    /// Generate `n_simulations` paths.
    ///
    /// Path `i` draws from its own RNG seeded with `seed + i`, so the result
    /// is identical for a given seed regardless of thread scheduling.
    pub fn simulate(&self, params: &PathParams) -> Result<SimulationResult> {
        params.validate()?;

        let merton = self
            .merton
            .unwrap_or_else(|| MertonParams::calibrated(params.sigma));
        let heston = self
            .heston
            .unwrap_or_else(|| HestonParams::calibrated(params.sigma));
        let kernel = StepKernel::new(self.process, params, merton, heston)?;

        let paths = (0..params.n_simulations)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(i as u64));
                kernel.path(params, &mut rng)
            })
            .collect();

        tracing::debug!(
            process = %self.process,
            paths = params.n_simulations,
            steps = params.total_steps(),
            sigma = params.sigma,
            mu = params.mu,
            "simulated price paths"
        );

        Ok(SimulationResult {
            process: self.process,
            params: params.clone(),
            seed: self.seed,
            paths,
        })
    }
}

/// Pre-built distributions for one process.
struct StepKernel {
    process: Process,
    normal: Normal<f64>,
    jumps: Option<(Poisson<f64>, Normal<f64>, f64)>,
    heston: HestonParams,
}

impl StepKernel {
    fn new(
        process: Process,
        params: &PathParams,
        merton: MertonParams,
        heston: HestonParams,
    ) -> Result<Self> {
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| ThresholdError::InvalidParameter(e.to_string()))?;

        let jumps = if process == Process::MertonJumpDiffusion && merton.jump_intensity > 0.0 {
            let poisson = Poisson::new(merton.jump_intensity * params.dt())
                .map_err(|e| ThresholdError::InvalidParameter(format!("jump intensity: {}", e)))?;
            let size = Normal::new(merton.mean_log_jump, merton.jump_volatility)
                .map_err(|e| ThresholdError::InvalidParameter(format!("jump size: {}", e)))?;
            // compensator keeps the expected return equal to mu
            let k = (merton.mean_log_jump + 0.5 * merton.jump_volatility.powi(2)).exp() - 1.0;
            Some((poisson, size, merton.jump_intensity * k))
        } else {
            None
        };

        if process == Process::Heston && !(-1.0..=1.0).contains(&heston.rho) {
            return Err(ThresholdError::InvalidParameter(format!(
                "heston rho must lie in [-1, 1], got {}",
                heston.rho
            )));
        }

        Ok(StepKernel {
            process,
            normal,
            jumps,
            heston,
        })
    }

    fn path(&self, params: &PathParams, rng: &mut StdRng) -> Vec<f64> {
        let total = params.total_steps();
        let dt = params.dt();
        let sqrt_dt = dt.sqrt();
        let sigma = params.sigma;

        let mut path = Vec::with_capacity(total + 1);
        let mut x = params.initial_value;
        let mut v = self.heston.v0;
        path.push(x);

        for _ in 0..total {
            let z = self.normal.sample(rng);
            match self.process {
                Process::Gbm => {
                    x *= ((params.mu - 0.5 * sigma * sigma) * dt + sigma * sqrt_dt * z).exp();
                }
                Process::Black => {
                    x *= (-0.5 * sigma * sigma * dt + sigma * sqrt_dt * z).exp();
                }
                Process::MertonJumpDiffusion => {
                    let (compensator, jump) = match &self.jumps {
                        Some((poisson, size, compensator)) => {
                            let n = poisson.sample(rng) as u64;
                            let jump: f64 = (0..n).map(|_| size.sample(rng)).sum();
                            (*compensator, jump)
                        }
                        None => (0.0, 0.0),
                    };
                    x *= ((params.mu - compensator - 0.5 * sigma * sigma) * dt
                        + sigma * sqrt_dt * z
                        + jump)
                        .exp();
                }
                Process::Heston => {
                    let h = &self.heston;
                    let z2 = self.normal.sample(rng);
                    let w = h.rho * z + (1.0 - h.rho * h.rho).sqrt() * z2;
                    // full truncation: negative variance is treated as zero
                    let v_pos = v.max(0.0);
                    x *= ((params.mu - 0.5 * v_pos) * dt + (v_pos * dt).sqrt() * z).exp();
                    v += h.kappa * (h.theta - v_pos) * dt + h.xi * (v_pos * dt).sqrt() * w;
                }
            }
            path.push(x);
        }
        path
    }
}
