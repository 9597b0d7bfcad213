//! Collateral threshold estimation for crypto-backed stablecoin vaults.
//!
//! Historical prices of a collateral/debt pair feed a Monte Carlo
//! simulation; the alpha-quantile drawdowns of the simulated and the
//! historical distributions give liquidation, premium-redeem and safe-mint
//! thresholds, inflated by liquidity and depeg risk adjustments.

pub mod amm;
pub mod analysis;
pub mod config;
pub mod data_fetcher;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod returns;
pub mod risk;
pub mod simulation;
pub mod stats;
pub mod telemetry;
pub mod token;

pub use error::{AmmError, Result, ThresholdError};
