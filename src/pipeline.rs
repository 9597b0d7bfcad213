//! End-to-end threshold analysis for every configured collateral.
//!
//! The debt token is the quote currency: if it appreciates, the collateral
//! ratio drops, and so it does if the collateral depreciates. Simulating the
//! COLLATERAL/DEBT price therefore covers both directions, and the
//! alpha-worst trajectory gives the required over-collateralization.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analysis::{estimate_thresholds, Threshold};
use crate::config::{CollateralConfig, Config};
use crate::data_fetcher::{fetch_prices, DateRange, PriceSource};
use crate::error::Result;
use crate::returns::ReturnPeriod;
use crate::risk::RiskAdjustment;
use crate::simulation::{PathParams, Process, Simulation};
use crate::stats;
use crate::token::{Token, TokenPair};

/// Thresholds and the inputs that produced them for one collateral.
#[derive(Debug, Clone, Serialize)]
pub struct CollateralReport {
    pub ticker: String,
    /// Pair the prices were sampled from (the proxy pair when configured)
    pub pair: String,
    pub observations: usize,
    pub daily_sigma: f64,
    pub annualized_volatility: f64,
    pub risk_adjustment: RiskAdjustment,
    pub total_risk_adjustment: f64,
    pub thresholds: Vec<Threshold>,
}

/// Result of one collateral: either a report or the reason it failed.
#[derive(Debug, Clone, Serialize)]
pub struct CollateralOutcome {
    pub ticker: String,
    pub report: Option<CollateralReport>,
    pub error: Option<String>,
}

/// Output of a full analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub date: DateTime<Utc>,
    pub alpha: f64,
    pub n_simulations: usize,
    pub historical_sample_period: i64,
    pub process: Process,
    pub debt: String,
    pub outcomes: Vec<CollateralOutcome>,
}

impl AnalysisReport {
    pub fn reports(&self) -> impl Iterator<Item = &CollateralReport> {
        self.outcomes.iter().filter_map(|o| o.report.as_ref())
    }

    pub fn failures(&self) -> impl Iterator<Item = &CollateralOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }
}

/// The pair whose price history is sampled for a collateral.
pub fn sampled_pair(ticker: &str, collateral: &CollateralConfig, debt: Token) -> TokenPair {
    let base = match &collateral.proxy {
        Some(proxy) => Token::new(&proxy.name, &proxy.ticker),
        None => Token::with_decimals(&collateral.name, ticker, collateral.decimals),
    };
    TokenPair::new(base, debt)
}

/// Configured adjustments, with the liquidity adjustment raised to the pool
/// slippage when a pool is configured.
pub fn effective_risk_adjustment(
    ticker: &str,
    collateral: &CollateralConfig,
    debt: &Token,
) -> Result<RiskAdjustment> {
    let mut adjustment = collateral.risk_adjustment;
    if let Some(pool) = &collateral.pool {
        let token = Token::with_decimals(&collateral.name, ticker, collateral.decimals);
        let slippage = pool.liquidation_slippage(&token, debt)?;
        tracing::debug!(ticker, slippage, "liquidation slippage from pool");
        adjustment.liquidity_adjustment = adjustment.liquidity_adjustment.max(slippage);
    }
    adjustment.validate()?;
    Ok(adjustment)
}

/// Analyze a single collateral.
pub fn analyze_collateral(
    config: &Config,
    ticker: &str,
    collateral: &CollateralConfig,
    source: &dyn PriceSource,
) -> Result<CollateralReport> {
    let analysis = &config.analysis;
    let periods = analysis.thresholds.periods;
    let debt = config.debt.token();

    let mut pair = sampled_pair(ticker, collateral, debt.clone());
    let range = DateRange::last_days(analysis.historical_sample_period)?;
    fetch_prices(source, &mut pair, &range, collateral.inverse)?;
    pair.calculate_returns(ReturnPeriod::Daily)?;

    // Relative moves with zero drift, starting at 1
    let params = PathParams {
        mu: 0.0,
        initial_value: 1.0,
        ..PathParams::from_pair(&pair, 1, periods.longest(), analysis.n_simulations)?
    };
    let simulation = Simulation::new(analysis.process)
        .with_seed(analysis.seed)
        .simulate(&params)?;

    let risk_adjustment = effective_risk_adjustment(ticker, collateral, &debt)?;
    let total_risk_adjustment = risk_adjustment.total();

    let prices = pair.prices()?;
    let thresholds = estimate_thresholds(
        &simulation,
        prices,
        analysis.alpha,
        &periods.as_list(),
        total_risk_adjustment,
    )?;

    for t in &thresholds {
        tracing::debug!(
            "The {} threshold based on the analytical VaR for a confidence level of {}% of {}/{} over {} days is: {:.3}%",
            t.kind,
            analysis.alpha * 100.0,
            ticker.to_uppercase(),
            debt,
            t.period_days,
            t.analytical * 100.0
        );
        tracing::debug!(
            "The {} threshold based on the historic VaR for a confidence level of {}% of {}/{} over {} days is: {:.3}%",
            t.kind,
            analysis.alpha * 100.0,
            ticker.to_uppercase(),
            debt,
            t.period_days,
            t.historical * 100.0
        );
        tracing::info!(
            "The suggested {} threshold for {} is {}%",
            t.kind,
            ticker.to_uppercase(),
            t.suggested_percent()
        );
    }

    Ok(CollateralReport {
        ticker: ticker.to_string(),
        pair: pair.ticker(),
        observations: prices.len(),
        daily_sigma: params.sigma,
        annualized_volatility: stats::annualize_volatility(params.sigma),
        risk_adjustment,
        total_risk_adjustment,
        thresholds,
    })
}

/// Analyze every collateral in the config.
///
/// A failing collateral is logged and recorded in its outcome; the run
/// carries on with the next one.
pub fn run_analysis(config: &Config, source: &dyn PriceSource) -> AnalysisReport {
    run_analysis_with(config, source, |_| {})
}

/// Like [`run_analysis`], calling `on_collateral` with each ticker as it starts.
pub fn run_analysis_with(
    config: &Config,
    source: &dyn PriceSource,
    mut on_collateral: impl FnMut(&str),
) -> AnalysisReport {
    let analysis = &config.analysis;
    let periods = analysis.thresholds.periods;

    tracing::info!("Date of the analysis: {}", Utc::now());
    tracing::info!(
        alpha_pct = analysis.alpha * 100.0,
        n_simulations = analysis.n_simulations,
        historical_sample_period = analysis.historical_sample_period,
        liquidation_days = periods.liquidation,
        premium_redeem_days = periods.premium_redeem,
        safe_mint_days = periods.safe_mint,
        process = %analysis.process,
        "Start running the collateral analysis"
    );

    let outcomes = config
        .collateral
        .iter()
        .map(|(ticker, collateral)| {
            on_collateral(ticker);
            tracing::info!("Start analysing {}...", ticker);
            match analyze_collateral(config, ticker, collateral, source) {
                Ok(report) => CollateralOutcome {
                    ticker: ticker.clone(),
                    report: Some(report),
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(ticker = %ticker, error = %e, "collateral analysis failed");
                    CollateralOutcome {
                        ticker: ticker.clone(),
                        report: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        })
        .collect();

    AnalysisReport {
        date: Utc::now(),
        alpha: analysis.alpha,
        n_simulations: analysis.n_simulations,
        historical_sample_period: analysis.historical_sample_period,
        process: analysis.process,
        debt: config.debt.token().to_string(),
        outcomes,
    }
}
