//! Price series and the returns derived from them.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, ThresholdError};
use crate::stats;

/// A single price observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Period over which returns are taken, in daily observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnPeriod {
    Daily,
    Weekly,
    Monthly,
    Annually,
}

impl ReturnPeriod {
    pub fn shift(&self) -> usize {
        match self {
            Self::Daily => 1,
            Self::Weekly => 7,
            Self::Monthly => 31,
            Self::Annually => 365,
        }
    }
}

/// How the mean return of a series is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeanKind {
    /// Compounded growth between the first and last observation.
    Geometric,
    /// Average daily return scaled by the standardization period.
    Arithmetic,
}

/// Time-ordered price observations for one pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub points: Vec<PricePoint>,
}

/// Volatility over one window of the rolling report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowVolatility {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub observations: usize,
    pub annualized_volatility: f64,
}

impl PriceSeries {
    /// Build a series, sorting the points by timestamp.
    pub fn new(mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        PriceSeries { points }
    }

    /// Build a daily series from bare prices, one day apart starting at `start`.
    pub fn from_prices(start: DateTime<Utc>, prices: &[f64]) -> Self {
        let points = prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint {
                timestamp: start + Duration::days(i as i64),
                price,
            })
            .collect();
        PriceSeries { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Invert every price, turning a BASE/QUOTE series into QUOTE/BASE.
    pub fn invert(&self) -> Result<PriceSeries> {
        let points = self
            .points
            .iter()
            .map(|p| {
                if p.price <= 0.0 {
                    Err(ThresholdError::InvalidParameter(format!(
                        "cannot invert non-positive price {} at {}",
                        p.price, p.timestamp
                    )))
                } else {
                    Ok(PricePoint {
                        timestamp: p.timestamp,
                        price: 1.0 / p.price,
                    })
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PriceSeries { points })
    }

    /// Keep the last observation of every UTC day.
    pub fn daily(&self) -> PriceSeries {
        let mut by_day: BTreeMap<NaiveDate, PricePoint> = BTreeMap::new();
        for p in &self.points {
            by_day.insert(p.timestamp.date_naive(), *p);
        }
        PriceSeries {
            points: by_day.into_values().collect(),
        }
    }

    /// Divide this series by `other`, day by day. Days missing from either side are dropped.
    pub fn ratio(&self, other: &PriceSeries) -> Result<PriceSeries> {
        let denominators: BTreeMap<NaiveDate, f64> = other
            .daily()
            .points
            .into_iter()
            .map(|p| (p.timestamp.date_naive(), p.price))
            .collect();

        let mut points = Vec::new();
        for p in self.daily().points {
            if let Some(&d) = denominators.get(&p.timestamp.date_naive()) {
                if d <= 0.0 {
                    return Err(ThresholdError::InvalidParameter(format!(
                        "non-positive denominator {} at {}",
                        d, p.timestamp
                    )));
                }
                points.push(PricePoint {
                    timestamp: p.timestamp,
                    price: p.price / d,
                });
            }
        }
        Ok(PriceSeries { points })
    }

    /// Observations with timestamps in `[start, end]`.
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> PriceSeries {
        PriceSeries {
            points: self
                .points
                .iter()
                .filter(|p| p.timestamp >= start && p.timestamp <= end)
                .copied()
                .collect(),
        }
    }

    /// Percentage change over `shift` observations: `p[i + shift] / p[i] - 1`.
    pub fn pct_change(&self, shift: usize) -> Result<Vec<f64>> {
        pct_change(&self.prices(), shift)
    }

    /// Mean return standardized to `standardization` (e.g. annualized).
    pub fn mean_return(&self, kind: MeanKind, standardization: ReturnPeriod) -> Result<f64> {
        if self.len() < 2 {
            return Err(ThresholdError::InsufficientData(format!(
                "mean return needs at least 2 prices, got {}",
                self.len()
            )));
        }
        let factor = standardization.shift() as f64;
        match kind {
            MeanKind::Geometric => {
                let first = self.points[0].price;
                let last = self.points[self.len() - 1].price;
                if first <= 0.0 {
                    return Err(ThresholdError::InvalidParameter(format!(
                        "non-positive first price {}",
                        first
                    )));
                }
                Ok((last / first).powf(factor / self.len() as f64) - 1.0)
            }
            MeanKind::Arithmetic => {
                let returns = self.pct_change(1)?;
                Ok(stats::mean(&returns) * factor)
            }
        }
    }

    /// Annualized volatility of consecutive windows of `window_days`, newest first.
    ///
    /// Walks back from the last observation; the oldest window is clamped to
    /// the first observation.
    pub fn rolling_volatility(&self, window_days: i64) -> Result<Vec<WindowVolatility>> {
        if window_days <= 0 {
            return Err(ThresholdError::InvalidParameter(format!(
                "window must be positive, got {} days",
                window_days
            )));
        }
        let step = Duration::try_days(window_days).ok_or_else(|| {
            ThresholdError::InvalidParameter(format!(
                "window of {} days is out of range",
                window_days
            ))
        })?;
        let (Some(first), Some(last)) = (self.first(), self.last()) else {
            return Ok(Vec::new());
        };

        let mut windows = Vec::new();
        let mut end = last.timestamp;
        while end >= first.timestamp {
            let start = end
                .checked_sub_signed(step)
                .map_or(first.timestamp, |s| s.max(first.timestamp));
            let window = self.between(start, end);
            let returns = window.pct_change(1)?;
            windows.push(WindowVolatility {
                start,
                end,
                observations: window.len(),
                annualized_volatility: stats::annualize_volatility(stats::std_dev(&returns)),
            });
            match end.checked_sub_signed(step) {
                Some(next) => end = next,
                None => break,
            }
        }
        Ok(windows)
    }
}

/// Percentage change over `shift` observations.
///
/// A series of length N yields `N - shift` returns (none when `shift >= N`).
pub fn pct_change(prices: &[f64], shift: usize) -> Result<Vec<f64>> {
    if shift == 0 {
        return Err(ThresholdError::InvalidParameter(
            "return shift must be at least 1".to_string(),
        ));
    }
    if prices.len() <= shift {
        return Ok(Vec::new());
    }

    prices
        .iter()
        .zip(&prices[shift..])
        .enumerate()
        .map(|(i, (&from, &to))| {
            if !(from > 0.0 && from.is_finite()) {
                Err(ThresholdError::InvalidParameter(format!(
                    "price {} at index {} is not a positive number",
                    from, i
                )))
            } else if !to.is_finite() {
                Err(ThresholdError::InvalidParameter(format!(
                    "price {} at index {} is not a finite number",
                    to,
                    i + shift
                )))
            } else {
                Ok(to / from - 1.0)
            }
        })
        .collect()
}

/// Worst cumulative drawdown of `token` relative to the asset it tracks.
///
/// With `proxy = None` the token is assumed to track a constant 1.0 (a USD
/// peg). Returns `min_i(prod(1 + r)) - 1`, negative when the token ever
/// traded below its starting ratio.
pub fn max_depeg(token: &PriceSeries, proxy: Option<&PriceSeries>) -> Result<f64> {
    let relative = match proxy {
        Some(proxy) => token.ratio(proxy)?,
        None => token.daily(),
    };
    let returns = relative.pct_change(1)?;
    if returns.is_empty() {
        return Err(ThresholdError::InsufficientData(
            "max depeg needs at least 2 overlapping prices".to_string(),
        ));
    }

    let mut cumulative = 1.0;
    let mut worst = f64::INFINITY;
    for r in returns {
        cumulative *= 1.0 + r;
        worst = worst.min(cumulative - 1.0);
    }
    Ok(worst)
}
