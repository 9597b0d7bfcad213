use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use vault_thresholds::amm::{Amm, SwapKind};
use vault_thresholds::config::{Config, DataSource};
use vault_thresholds::data_fetcher::{self, CoinGecko, CsvPriceSource, DateRange, PriceSource};
use vault_thresholds::output;
use vault_thresholds::pipeline;
use vault_thresholds::returns::{self, MeanKind, ReturnPeriod};
use vault_thresholds::simulation::{PathParams, Process, Simulation};
use vault_thresholds::stats;
use vault_thresholds::telemetry;
use vault_thresholds::token::{Token, TokenPair};

#[derive(Parser)]
#[command(
    name = "vault-thresholds",
    about = "Collateral threshold estimation for crypto-backed stablecoin vaults"
)]
struct Cli {
    /// Log level for the console (RUST_LOG overrides it)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the threshold analysis for every configured collateral
    Analyze {
        /// Config file (TOML)
        #[arg(long, default_value = "config.toml")]
        config: PathBuf,

        /// Output directory for thresholds.csv and report.json
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,
    },

    /// Fetch historical prices from CoinGecko and save them as CSV
    Fetch {
        /// CoinGecko id of the base token (e.g., kusama)
        #[arg(long)]
        base: String,

        /// Ticker of the base token, used for the file name (defaults to --base)
        #[arg(long)]
        base_ticker: Option<String>,

        /// Quote currency ticker (e.g., btc, usd)
        #[arg(long, default_value = "btc")]
        quote: String,

        /// Start date (YYYY-MM-DD), defaults to one year back
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        end: Option<String>,

        /// Invert the fetched prices
        #[arg(long)]
        inverse: bool,

        /// Optional CoinGecko API key
        #[arg(long, env = "COINGECKO_API_KEY")]
        api_key: Option<String>,

        /// Output directory for CSV files
        #[arg(long, default_value = "data")]
        output_dir: PathBuf,
    },

    /// Simulate price paths and save them as CSV
    Simulate {
        /// Per-period standard deviation of returns
        #[arg(long)]
        sigma: f64,

        /// Per-period drift
        #[arg(long, default_value = "0")]
        mu: f64,

        #[arg(long, default_value = "1")]
        initial_value: f64,

        /// Sub-steps per period
        #[arg(long, default_value = "1")]
        steps: usize,

        /// Number of periods
        #[arg(long, default_value = "21")]
        maturity: usize,

        #[arg(long, default_value = "1000")]
        paths: usize,

        #[arg(long, value_enum, default_value = "gbm")]
        process: Process,

        #[arg(long, default_value = "42")]
        seed: u64,

        /// Confidence level for the printed multiplier
        #[arg(long, default_value = "0.99")]
        alpha: f64,

        #[arg(long, default_value = "output/paths.csv")]
        output: PathBuf,
    },

    /// Quote the slippage of a swap against a constant-product pool
    Slippage {
        #[arg(long)]
        base_reserve: f64,

        #[arg(long)]
        quote_reserve: f64,

        /// Amount of the swapped token
        #[arg(long)]
        amount: f64,

        /// Buy `amount` instead of selling it
        #[arg(long)]
        exact_output: bool,

        /// Swap the quote token instead of the base token
        #[arg(long)]
        sell_quote: bool,

        #[arg(long, default_value = "0")]
        fee: f64,
    },

    /// Report the worst historical depeg of a token against its proxy
    Depeg {
        /// Token price CSV (timestamp_ms,price)
        #[arg(long)]
        token_csv: PathBuf,

        /// Proxy price CSV of the asset the token tracks
        #[arg(long, required_unless_present = "usd_peg", conflicts_with = "usd_peg")]
        proxy_csv: Option<PathBuf>,

        /// Measure the depeg against a constant 1.0 USD peg
        #[arg(long)]
        usd_peg: bool,
    },

    /// Return statistics and rolling volatility of a price CSV
    Stats {
        #[arg(long)]
        prices: PathBuf,

        /// Rolling window in days
        #[arg(long, default_value = "365")]
        window: i64,

        /// Second price CSV to correlate returns with
        #[arg(long)]
        against: Option<PathBuf>,
    },
}

fn price_source(config: &Config) -> anyhow::Result<Box<dyn PriceSource>> {
    Ok(match config.data.source {
        DataSource::Coingecko => Box::new(CoinGecko::new(config.data.api_key.clone())?),
        DataSource::Csv => Box::new(CsvPriceSource::new(&config.data.csv_dir)),
    })
}

fn run_analyze(config_path: &Path, output_dir: &Path, log_level: Option<&str>) -> anyhow::Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    telemetry::init_logging(
        log_level.unwrap_or(&config.logging.level),
        config.logging.file.as_deref(),
    )?;

    let source = price_source(&config)?;

    let pb = ProgressBar::new(config.collateral.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let report = pipeline::run_analysis_with(&config, source.as_ref(), |ticker| {
        pb.set_message(ticker.to_string());
        pb.inc(1);
    });
    pb.finish_and_clear();

    println!(
        "\nSuggested thresholds (alpha={:.1}%, {} paths, debt {}):",
        report.alpha * 100.0,
        report.n_simulations,
        report.debt
    );
    for r in report.reports() {
        let cells: Vec<String> = r
            .thresholds
            .iter()
            .map(|t| format!("{}={}%", t.kind, t.suggested_percent()))
            .collect();
        println!("  {:<8} {}", r.ticker, cells.join("  "));
    }
    for failure in report.failures() {
        println!(
            "  {:<8} FAILED: {}",
            failure.ticker,
            failure.error.as_deref().unwrap_or("unknown error")
        );
    }

    output::save_all(&report, output_dir)
        .with_context(|| format!("saving results to {}", output_dir.display()))?;
    println!("\nSaved results to {}", output_dir.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = cli.log_level;

    // The analysis sets up its own logging from the config file
    if !matches!(cli.command, Commands::Analyze { .. }) {
        telemetry::init_logging(log_level.as_deref().unwrap_or("info"), None)?;
    }

    match cli.command {
        Commands::Analyze { config, output_dir } => {
            run_analyze(&config, &output_dir, log_level.as_deref())?;
        }

        Commands::Fetch {
            base,
            base_ticker,
            quote,
            start,
            end,
            inverse,
            api_key,
            output_dir,
        } => {
            let range = DateRange::parse(start.as_deref(), end.as_deref())?;
            let base_ticker = base_ticker.unwrap_or_else(|| base.clone());
            let mut pair = TokenPair::new(Token::new(&base, &base_ticker), Token::new(&quote, &quote));

            println!(
                "Fetching {} over {} days...",
                pair.ticker(),
                range.length_in_days()
            );
            let source = CoinGecko::new(api_key)?;
            data_fetcher::fetch_prices(&source, &mut pair, &range, inverse)?;

            let path = output_dir.join(data_fetcher::csv_file_name(&pair));
            data_fetcher::save_csv(pair.prices()?, &path)?;
            println!("Saved {} prices to {}", pair.prices()?.len(), path.display());
        }

        Commands::Simulate {
            sigma,
            mu,
            initial_value,
            steps,
            maturity,
            paths,
            process,
            seed,
            alpha,
            output,
        } => {
            let params = PathParams {
                steps,
                maturity,
                n_simulations: paths,
                sigma,
                mu,
                initial_value,
            };
            let result = Simulation::new(process).with_seed(seed).simulate(&params)?;
            let summary = result.summary_at(result.total_steps())?;
            let multiplier = vault_thresholds::analysis::Analysis::new(&result)
                .threshold_multiplier(alpha, result.total_steps())?;

            println!(
                "{} paths of {} ({} steps): terminal mean={:.4} std={:.4} min={:.4} max={:.4}",
                result.n_paths(),
                process,
                result.total_steps(),
                summary.mean,
                summary.std_dev,
                summary.min,
                summary.max
            );
            println!(
                "Multiplier at {:.1}% confidence over the full horizon: {:.4}",
                alpha * 100.0,
                multiplier
            );

            output::save_paths_csv(&result, &output)?;
            println!("Saved paths to {}", output.display());
        }

        Commands::Slippage {
            base_reserve,
            quote_reserve,
            amount,
            exact_output,
            sell_quote,
            fee,
        } => {
            let base = Token::new("base", "BASE");
            let quote = Token::new("quote", "QUOTE");
            let amm = Amm::with_fee(base.clone(), quote.clone(), base_reserve, quote_reserve, fee)?;
            let token = if sell_quote { &quote } else { &base };
            let kind = if exact_output {
                SwapKind::ExactOutput
            } else {
                SwapKind::ExactInput
            };
            let q = amm.quote_swap(token, amount, kind)?;

            println!("Exchange rate before: {:.8}", amm.exchange_rate());
            println!("Amount in:  {:.8}", q.amount_in);
            println!("Amount out: {:.8}", q.amount_out);
            println!("Exchange rate after:  {:.8}", q.reserve_quote / q.reserve_base);
            println!("Slippage: {:.4}%", q.slippage * 100.0);
        }

        Commands::Depeg {
            token_csv,
            proxy_csv,
            usd_peg: _,
        } => {
            let token = data_fetcher::load_csv(&token_csv)?;
            let proxy = proxy_csv.as_deref().map(data_fetcher::load_csv).transpose()?;
            let depeg = returns::max_depeg(&token, proxy.as_ref())?;
            println!(
                "Max depeg of {} was {:.3}%",
                token_csv.display(),
                depeg * 100.0
            );
        }

        Commands::Stats {
            prices,
            window,
            against,
        } => {
            let series = data_fetcher::load_csv(&prices)?.daily();
            let daily = series.pct_change(1)?;

            println!("{} daily observations", series.len());
            println!(
                "  annualized volatility: {:.2}%",
                stats::annualize_volatility(stats::std_dev(&daily)) * 100.0
            );
            println!(
                "  annualized mean return (geometric): {:.2}%",
                series.mean_return(MeanKind::Geometric, ReturnPeriod::Annually)? * 100.0
            );
            println!(
                "  annualized mean return (arithmetic): {:.2}%",
                series.mean_return(MeanKind::Arithmetic, ReturnPeriod::Annually)? * 100.0
            );
            println!("  skewness: {:.4}", stats::skewness(&daily));
            println!("  excess kurtosis: {:.4}", stats::kurtosis(&daily));

            if let Some(other) = against {
                let other = data_fetcher::load_csv(&other)?.daily();
                let (a, b) = aligned_returns(&series, &other)?;
                match stats::correlation(&a, &b) {
                    Some(rho) => {
                        println!("  correlation: {:.3}", rho);
                        println!(
                            "  variance unexplained by correlation: {:.1}%",
                            stats::unexplained_variance(rho) * 100.0
                        );
                    }
                    None => println!("  correlation: undefined"),
                }
            }

            println!("\nRolling {}-day windows:", window);
            for w in series.rolling_volatility(window)? {
                println!(
                    "  {} .. {}: {:.2}% ({} obs)",
                    w.start.date_naive(),
                    w.end.date_naive(),
                    w.annualized_volatility * 100.0,
                    w.observations
                );
            }
        }
    }

    Ok(())
}

/// Daily returns of two series over the days both have prices.
fn aligned_returns(
    a: &returns::PriceSeries,
    b: &returns::PriceSeries,
) -> anyhow::Result<(Vec<f64>, Vec<f64>)> {
    let days_b: std::collections::BTreeSet<_> =
        b.points.iter().map(|p| p.timestamp.date_naive()).collect();
    let common_a = returns::PriceSeries::new(
        a.points
            .iter()
            .filter(|p| days_b.contains(&p.timestamp.date_naive()))
            .copied()
            .collect(),
    );
    let days_a: std::collections::BTreeSet<_> =
        common_a.points.iter().map(|p| p.timestamp.date_naive()).collect();
    let common_b = returns::PriceSeries::new(
        b.points
            .iter()
            .filter(|p| days_a.contains(&p.timestamp.date_naive()))
            .copied()
            .collect(),
    );
    Ok((common_a.pct_change(1)?, common_b.pct_change(1)?))
}
