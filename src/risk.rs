//! Risk adjustments for risks the price simulation does not capture.

use serde::{Deserialize, Serialize};

use crate::amm::Amm;
use crate::error::{Result, ThresholdError};
use crate::token::Token;

/// Adjustments applied on top of the simulated thresholds.
///
/// Each adjustment is a fractional loss the liquidation of collateral may
/// suffer, e.g. `0.03` for 3% slippage when selling it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAdjustment {
    /// Slippage when liquidating the collateral
    #[serde(default)]
    pub liquidity_adjustment: f64,
    /// Worst historical depeg of the collateral from the asset it tracks
    #[serde(default)]
    pub depeg_adjustment: f64,
}

impl RiskAdjustment {
    pub fn new(liquidity_adjustment: f64, depeg_adjustment: f64) -> Result<Self> {
        let adjustment = RiskAdjustment {
            liquidity_adjustment,
            depeg_adjustment,
        };
        adjustment.validate()?;
        Ok(adjustment)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("liquidity_adjustment", self.liquidity_adjustment),
            ("depeg_adjustment", self.depeg_adjustment),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(ThresholdError::InvalidParameter(format!(
                    "{} must lie in [0, 1), got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    pub fn liquidity_multiplier(&self) -> f64 {
        1.0 / (1.0 - self.liquidity_adjustment)
    }

    pub fn depeg_multiplier(&self) -> f64 {
        1.0 / (1.0 - self.depeg_adjustment)
    }

    /// Single multiplier that increases the thresholds by all adjustments.
    pub fn total(&self) -> f64 {
        self.liquidity_multiplier() * self.depeg_multiplier()
    }
}

/// A pool the collateral would be liquidated into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidityPool {
    pub base_reserve: f64,
    pub quote_reserve: f64,
    /// Collateral sold in a worst-case liquidation
    pub sell_amount: f64,
    #[serde(default)]
    pub swap_fee: f64,
}

impl LiquidityPool {
    /// Price impact of dumping `sell_amount` of collateral into the pool,
    /// as a positive fraction usable as a liquidity adjustment.
    pub fn liquidation_slippage(&self, collateral: &Token, debt: &Token) -> Result<f64> {
        let amm = Amm::with_fee(
            collateral.clone(),
            debt.clone(),
            self.base_reserve,
            self.quote_reserve,
            self.swap_fee,
        )?;
        let slippage = amm.exact_input_slippage(collateral, self.sell_amount)?;
        Ok(-slippage)
    }
}

/// Round up to the next multiple of 5.
///
/// Values at most 5e-9 above a multiple (a tolerance of 1e-9 in units
/// of 5) stay on it, so `1.1 * 100.0` rounds to 110, not 115. Anything
/// further above moves to the next multiple.
pub fn round_up_to_nearest_5(num: f64) -> u32 {
    ((num / 5.0 - 1e-9).ceil() * 5.0).max(0.0) as u32
}
