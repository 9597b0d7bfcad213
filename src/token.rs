use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, ThresholdError};
use crate::returns::{PriceSeries, ReturnPeriod};

/// Decimal precision of tokens the analysis commonly deals with.
pub mod decimals {
    pub const DOLLAR: u32 = 0;
    pub const BITCOIN: u32 = 8;
    pub const POLKADOT: u32 = 10;
    pub const KUSAMA: u32 = 12;
    pub const KINTSUGI: u32 = 12;
    pub const PERCENTAGE: u32 = 18;
    pub const LP_TOKEN: u32 = 18;
    pub const PLANCK: u32 = 18;
}

/// A token identified by its price-source name and its ticker.
///
/// `name` must match the identifier used by the price source (e.g. the
/// CoinGecko id `bitcoin`); `ticker` is the short symbol shown in quotes
/// such as `KSM/BTC`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub name: String,
    pub ticker: String,
    pub decimals: u32,
}

impl Token {
    pub fn new(name: &str, ticker: &str) -> Self {
        Token {
            name: name.to_string(),
            ticker: ticker.to_string(),
            decimals: 0,
        }
    }

    pub fn with_decimals(name: &str, ticker: &str, decimals: u32) -> Self {
        Token {
            name: name.to_string(),
            ticker: ticker.to_string(),
            decimals,
        }
    }

    /// Convert a human-denominated amount to base units (e.g. BTC → satoshi).
    pub fn to_base_units(&self, amount: f64) -> f64 {
        amount * 10f64.powi(self.decimals as i32)
    }

    /// Convert base units back to a human-denominated amount.
    pub fn from_base_units(&self, amount: f64) -> f64 {
        amount / 10f64.powi(self.decimals as i32)
    }

    /// Tokens are the same asset when their price-source names match.
    pub fn same_asset(&self, other: &Token) -> bool {
        self.name == other.name
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ticker.to_uppercase())
    }
}

/// A trading pair: one unit of `base` is worth `price` units of `quote`.
///
/// In the threshold analysis the base token is the collateral and the quote
/// token is the debt, so a falling price means a falling collateral ratio.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub base: Token,
    pub quote: Token,
    pub prices: Option<PriceSeries>,
    pub returns: Option<Vec<f64>>,
}

impl TokenPair {
    pub fn new(base: Token, quote: Token) -> Self {
        TokenPair {
            base,
            quote,
            prices: None,
            returns: None,
        }
    }

    pub fn ticker(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }

    pub fn set_prices(&mut self, prices: PriceSeries) {
        self.prices = Some(prices);
        self.returns = None;
    }

    pub fn prices(&self) -> Result<&PriceSeries> {
        self.prices.as_ref().ok_or_else(|| {
            ThresholdError::InsufficientData(format!("no prices loaded for {}", self.ticker()))
        })
    }

    /// Compute and store percentage returns over the given period.
    pub fn calculate_returns(&mut self, period: ReturnPeriod) -> Result<&[f64]> {
        let returns = self.prices()?.pct_change(period.shift())?;
        self.returns = Some(returns);
        Ok(self.returns.as_deref().unwrap_or(&[]))
    }

    pub fn returns(&self) -> Result<&[f64]> {
        self.returns.as_deref().ok_or_else(|| {
            ThresholdError::InsufficientData(format!(
                "returns not calculated for {}",
                self.ticker()
            ))
        })
    }
}
