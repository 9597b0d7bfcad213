//! Value-at-Risk based collateral threshold estimation.
//!
//! A threshold multiplier answers: by how much must collateral exceed debt
//! today so that, with confidence `alpha`, it still covers the debt after
//! the horizon? If the alpha-quantile drawdown of collateral/debt over the
//! horizon is `d`, the multiplier is `1 / (1 + d)`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, ThresholdError};
use crate::returns::PriceSeries;
use crate::risk::round_up_to_nearest_5;
use crate::simulation::SimulationResult;
use crate::stats;

/// The risk periods a vault threshold is defined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdKind {
    Liquidation,
    PremiumRedeem,
    SafeMint,
}

impl ThresholdKind {
    pub fn all() -> [ThresholdKind; 3] {
        [Self::Liquidation, Self::PremiumRedeem, Self::SafeMint]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Liquidation => "liquidation",
            Self::PremiumRedeem => "premium_redeem",
            Self::SafeMint => "safe_mint",
        }
    }

    /// Storage name of the threshold in the vault registry pallet.
    pub fn onchain_name(&self) -> &'static str {
        match self {
            Self::Liquidation => "LiquidationCollateralThreshold",
            Self::PremiumRedeem => "PremiumRedeemThreshold",
            Self::SafeMint => "SecureCollateralThreshold",
        }
    }
}

impl fmt::Display for ThresholdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Analytical and historical multipliers for one risk period.
///
/// Both multipliers already include the risk adjustment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Threshold {
    pub kind: ThresholdKind,
    pub period_days: usize,
    pub alpha: f64,
    pub analytical: f64,
    pub historical: f64,
    pub risk_adjustment: f64,
}

impl Threshold {
    /// The more conservative of both multipliers.
    pub fn conservative(&self) -> f64 {
        self.analytical.max(self.historical)
    }

    /// Suggested threshold in percent, rounded up to the next multiple of 5.
    pub fn suggested_percent(&self) -> u32 {
        round_up_to_nearest_5(self.conservative() * 100.0)
    }
}

pub fn validate_alpha(alpha: f64) -> Result<()> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(ThresholdError::InvalidParameter(format!(
            "confidence level must lie in (0, 1), got {}",
            alpha
        )));
    }
    Ok(())
}

/// Convert a drawdown into the collateral multiplier covering it.
pub fn multiplier_from_drawdown(drawdown: f64) -> Result<f64> {
    if !(drawdown > -1.0) {
        return Err(ThresholdError::InvalidParameter(format!(
            "drawdown of {} wipes out the collateral, no multiplier covers it",
            drawdown
        )));
    }
    Ok(1.0 / (1.0 + drawdown))
}

/// Multiplier at the alpha-quantile of a sample of relative changes.
///
/// Changes are sorted descending and the element at `floor(alpha * n)` is
/// taken, so a larger alpha selects a worse change and never yields a
/// smaller multiplier.
pub fn quantile_multiplier(changes: &[f64], alpha: f64) -> Result<f64> {
    validate_alpha(alpha)?;
    if let Some(bad) = changes.iter().find(|c| !c.is_finite()) {
        return Err(ThresholdError::InvalidParameter(format!(
            "relative change {} is not a finite number",
            bad
        )));
    }
    let drawdown = stats::descending_quantile(changes, alpha).ok_or_else(|| {
        ThresholdError::InsufficientData("no observations to take a quantile from".to_string())
    })?;
    multiplier_from_drawdown(drawdown)
}

/// Threshold estimation over a set of simulated paths.
pub struct Analysis<'a> {
    simulation: &'a SimulationResult,
}

impl<'a> Analysis<'a> {
    pub fn new(simulation: &'a SimulationResult) -> Self {
        Analysis { simulation }
    }

    /// Analytical multiplier from the simulated drawdowns at `at_step`.
    pub fn threshold_multiplier(&self, alpha: f64, at_step: usize) -> Result<f64> {
        if at_step == 0 {
            return Err(ThresholdError::InvalidParameter(
                "threshold horizon must be at least one step".to_string(),
            ));
        }
        let drawdowns = self.simulation.drawdowns_at(at_step)?;
        quantile_multiplier(&drawdowns, alpha)
    }

    /// Analytical multiplier for a horizon in periods (days for daily data).
    pub fn threshold_multiplier_for_period(&self, alpha: f64, period: usize) -> Result<f64> {
        self.threshold_multiplier(alpha, period * self.simulation.params.steps)
    }
}

/// Historical multiplier from the observed `period_days` returns of `prices`.
pub fn historical_threshold_multiplier(
    prices: &PriceSeries,
    alpha: f64,
    period_days: usize,
) -> Result<f64> {
    let changes = prices.pct_change(period_days)?;
    if changes.is_empty() {
        return Err(ThresholdError::InsufficientData(format!(
            "{} prices cannot cover a {}-day horizon",
            prices.len(),
            period_days
        )));
    }
    quantile_multiplier(&changes, alpha)
}

/// Estimate every configured threshold for one pair.
pub fn estimate_thresholds(
    simulation: &SimulationResult,
    prices: &PriceSeries,
    alpha: f64,
    periods: &[(ThresholdKind, usize)],
    risk_adjustment: f64,
) -> Result<Vec<Threshold>> {
    let analysis = Analysis::new(simulation);

    periods
        .iter()
        .map(|&(kind, period_days)| {
            let analytical =
                analysis.threshold_multiplier_for_period(alpha, period_days)? * risk_adjustment;
            let historical =
                historical_threshold_multiplier(prices, alpha, period_days)? * risk_adjustment;

            Ok(Threshold {
                kind,
                period_days,
                alpha,
                analytical,
                historical,
                risk_adjustment,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_multiplier_of_zero_drawdown_is_one() {
        assert_relative_eq!(multiplier_from_drawdown(0.0).unwrap(), 1.0);
    }

    #[test]
    fn test_total_loss_is_rejected() {
        assert!(multiplier_from_drawdown(-1.0).is_err());
        assert!(multiplier_from_drawdown(f64::NAN).is_err());
    }

    #[test]
    fn test_alpha_bounds() {
        assert!(validate_alpha(0.0).is_err());
        assert!(validate_alpha(1.0).is_err());
        assert!(validate_alpha(0.99).is_ok());
    }

    #[test]
    fn test_suggested_percent_rounds_up_conservative_side() {
        let t = Threshold {
            kind: ThresholdKind::Liquidation,
            period_days: 2,
            alpha: 0.99,
            analytical: 1.12,
            historical: 1.161,
            risk_adjustment: 1.0,
        };
        assert_eq!(t.suggested_percent(), 120);
    }
}
