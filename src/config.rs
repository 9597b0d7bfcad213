//! Configuration for the collateral threshold analysis.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::analysis::{validate_alpha, ThresholdKind};
use crate::error::{Result, ThresholdError};
use crate::risk::{LiquidityPool, RiskAdjustment};
use crate::simulation::Process;
use crate::token::Token;

/// Longest history the analysis samples from, in days.
pub const MAX_SAMPLE_PERIOD_DAYS: i64 = 36_500;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default = "default_debt")]
    pub debt: TokenConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Collateral tokens keyed by ticker
    #[serde(default)]
    pub collateral: BTreeMap<String, CollateralConfig>,
}

/// Simulation and VaR parameters
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Confidence level, e.g. 0.99
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_n_simulations")]
    pub n_simulations: usize,
    /// Days of history to sample returns from
    #[serde(default = "default_sample_period")]
    pub historical_sample_period: i64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_process")]
    pub process: Process,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThresholdsConfig {
    #[serde(default)]
    pub periods: ThresholdPeriods,
}

/// Horizon in days of each threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ThresholdPeriods {
    pub liquidation: usize,
    pub premium_redeem: usize,
    pub safe_mint: usize,
}

impl Default for ThresholdPeriods {
    fn default() -> Self {
        Self {
            liquidation: 2,
            premium_redeem: 7,
            safe_mint: 21,
        }
    }
}

impl ThresholdPeriods {
    pub fn get(&self, kind: ThresholdKind) -> usize {
        match kind {
            ThresholdKind::Liquidation => self.liquidation,
            ThresholdKind::PremiumRedeem => self.premium_redeem,
            ThresholdKind::SafeMint => self.safe_mint,
        }
    }

    pub fn as_list(&self) -> Vec<(ThresholdKind, usize)> {
        ThresholdKind::all()
            .into_iter()
            .map(|kind| (kind, self.get(kind)))
            .collect()
    }

    /// The simulation has to reach the longest horizon.
    pub fn longest(&self) -> usize {
        self.liquidation.max(self.premium_redeem).max(self.safe_mint)
    }
}

/// A token as written in the config.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub name: String,
    pub ticker: String,
    #[serde(default)]
    pub decimals: u32,
}

impl TokenConfig {
    pub fn token(&self) -> Token {
        Token::with_decimals(&self.name, &self.ticker, self.decimals)
    }
}

/// Proxy whose price history stands in for the collateral.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    pub name: String,
    pub ticker: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollateralConfig {
    pub name: String,
    #[serde(default)]
    pub decimals: u32,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub risk_adjustment: RiskAdjustment,
    /// Derives the liquidity adjustment from pool slippage when set
    #[serde(default)]
    pub pool: Option<LiquidityPool>,
    /// Invert prices fetched for this collateral
    #[serde(default)]
    pub inverse: bool,
}

/// Where price data comes from
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_source")]
    pub source: DataSource,
    #[serde(default = "default_csv_dir")]
    pub csv_dir: PathBuf,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Coingecko,
    Csv,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Debug-level log file; `None` logs to the console only
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_alpha() -> f64 {
    0.99
}
fn default_n_simulations() -> usize {
    10_000
}
fn default_sample_period() -> i64 {
    365
}
fn default_seed() -> u64 {
    42
}
fn default_process() -> Process {
    Process::Gbm
}
fn default_debt() -> TokenConfig {
    TokenConfig {
        name: "bitcoin".to_string(),
        ticker: "btc".to_string(),
        decimals: crate::token::decimals::BITCOIN,
    }
}
fn default_source() -> DataSource {
    DataSource::Coingecko
}
fn default_csv_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            n_simulations: default_n_simulations(),
            historical_sample_period: default_sample_period(),
            seed: default_seed(),
            process: default_process(),
            thresholds: ThresholdsConfig::default(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            csv_dir: default_csv_dir(),
            api_key: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            debt: default_debt(),
            data: DataConfig::default(),
            logging: LoggingConfig::default(),
            collateral: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_alpha(self.analysis.alpha).map_err(|e| ThresholdError::Config(e.to_string()))?;

        if self.analysis.n_simulations == 0 {
            return Err(ThresholdError::Config(
                "analysis.n_simulations must be positive".to_string(),
            ));
        }
        if !(1..=MAX_SAMPLE_PERIOD_DAYS).contains(&self.analysis.historical_sample_period) {
            return Err(ThresholdError::Config(format!(
                "analysis.historical_sample_period must lie in [1, {}] days, got {}",
                MAX_SAMPLE_PERIOD_DAYS, self.analysis.historical_sample_period
            )));
        }
        for (kind, days) in self.analysis.thresholds.periods.as_list() {
            if days == 0 {
                return Err(ThresholdError::Config(format!(
                    "threshold period for {} must be positive",
                    kind
                )));
            }
        }
        for (ticker, collateral) in &self.collateral {
            collateral
                .risk_adjustment
                .validate()
                .map_err(|e| ThresholdError::Config(format!("collateral {}: {}", ticker, e)))?;
            if let Some(pool) = &collateral.pool {
                for (field, value) in [
                    ("base_reserve", pool.base_reserve),
                    ("quote_reserve", pool.quote_reserve),
                    ("sell_amount", pool.sell_amount),
                ] {
                    if !(value > 0.0 && value.is_finite()) {
                        return Err(ThresholdError::Config(format!(
                            "collateral {}: pool.{} must be positive, got {}",
                            ticker, field, value
                        )));
                    }
                }
                if !(0.0..1.0).contains(&pool.swap_fee) {
                    return Err(ThresholdError::Config(format!(
                        "collateral {}: pool.swap_fee must lie in [0, 1), got {}",
                        ticker, pool.swap_fee
                    )));
                }
            }
        }
        Ok(())
    }
}
