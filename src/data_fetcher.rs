use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ThresholdError};
use crate::returns::{PricePoint, PriceSeries};
use crate::token::TokenPair;

pub const COINGECKO_BASE_URL: &str = "https://api.coingecko.com/api/v3/coins/";

/// Length of the request when no start date is given.
const DEFAULT_DAYS: i64 = 365;

/// Date range of a historical price request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: NaiveDate,
}

impl DateRange {
    /// From `start` (or one year back when `None`) until today.
    pub fn until_today(start: Option<NaiveDate>) -> Self {
        DateRange {
            start,
            end: Utc::now().date_naive(),
        }
    }

    /// The last `days` days up to today.
    pub fn last_days(days: i64) -> Result<Self> {
        let end = Utc::now().date_naive();
        let start = chrono::Duration::try_days(days)
            .and_then(|d| end.checked_sub_signed(d))
            .ok_or_else(|| {
                ThresholdError::InvalidParameter(format!("{} days back is out of range", days))
            })?;
        Ok(DateRange {
            start: Some(start),
            end,
        })
    }

    /// Parse `YYYY-MM-DD` bounds; a missing end defaults to today.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let start = start
            .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
            .transpose()?;
        let end = match end {
            Some(e) => NaiveDate::parse_from_str(e, "%Y-%m-%d")?,
            None => Utc::now().date_naive(),
        };
        Ok(DateRange { start, end })
    }

    pub fn length_in_days(&self) -> i64 {
        match self.start {
            Some(start) => (self.end - start).num_days(),
            None => DEFAULT_DAYS,
        }
    }
}

/// Anything that can provide a historical price series for a pair.
pub trait PriceSource {
    fn historical_prices(&self, pair: &TokenPair, range: &DateRange) -> Result<PriceSeries>;
}

#[derive(Debug, Deserialize)]
struct MarketChart {
    prices: Vec<(f64, f64)>,
}

/// CoinGecko `market_chart` client.
pub struct CoinGecko {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGecko {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(CoinGecko {
            client,
            base_url: COINGECKO_BASE_URL.to_string(),
            api_key,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// `{base}/{base.name}/market_chart?vs_currency={quote.ticker}&days={n}`
    pub fn market_chart_url(&self, pair: &TokenPair, range: &DateRange) -> String {
        format!(
            "{}{}/market_chart?vs_currency={}&days={}",
            self.base_url,
            pair.base.name,
            pair.quote.ticker.to_lowercase(),
            range.length_in_days()
        )
    }
}

impl PriceSource for CoinGecko {
    fn historical_prices(&self, pair: &TokenPair, range: &DateRange) -> Result<PriceSeries> {
        let url = self.market_chart_url(pair, range);
        tracing::debug!(%url, "requesting historical prices");

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }
        let resp = request.send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(ThresholdError::PriceDataUnavailable {
                pair: pair.ticker(),
                reason: format!("HTTP {}: {}", status, body),
            });
        }

        let chart = resp
            .json::<MarketChart>()
            .map_err(ThresholdError::from)
            .and_then(MarketChart::into_series)
            .map_err(|e| ThresholdError::PriceDataUnavailable {
                pair: pair.ticker(),
                reason: e.to_string(),
            })?;
        if chart.is_empty() {
            return Err(ThresholdError::PriceDataUnavailable {
                pair: pair.ticker(),
                reason: "empty price list".to_string(),
            });
        }

        // Ranges above 90 days come back daily plus a trailing "now" sample
        Ok(chart.daily())
    }
}

/// Parse a `market_chart` body: `{"prices": [[timestamp_ms, price], ...]}`.
pub fn parse_market_chart(body: &str) -> Result<PriceSeries> {
    serde_json::from_str::<MarketChart>(body)?.into_series()
}

impl MarketChart {
    fn into_series(self) -> Result<PriceSeries> {
        let mut points = Vec::with_capacity(self.prices.len());
        for (ts, price) in self.prices {
            check_price(price, ts as i64)?;
            if let Some(timestamp) = timestamp_from_ms(ts as i64) {
                points.push(PricePoint { timestamp, price });
            }
        }
        Ok(PriceSeries::new(points))
    }
}

fn check_price(price: f64, timestamp_ms: i64) -> Result<()> {
    if !price.is_finite() {
        return Err(ThresholdError::InvalidParameter(format!(
            "price {} at {} is not a finite number",
            price, timestamp_ms
        )));
    }
    Ok(())
}

fn timestamp_from_ms(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Price source reading cached CSV files `{dir}/{base}_{quote}.csv`.
pub struct CsvPriceSource {
    pub dir: PathBuf,
}

impl CsvPriceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CsvPriceSource { dir: dir.into() }
    }

    pub fn path_for(&self, pair: &TokenPair) -> PathBuf {
        self.dir.join(csv_file_name(pair))
    }
}

impl PriceSource for CsvPriceSource {
    fn historical_prices(&self, pair: &TokenPair, range: &DateRange) -> Result<PriceSeries> {
        let path = self.path_for(pair);
        if !path.exists() {
            return Err(ThresholdError::PriceDataUnavailable {
                pair: pair.ticker(),
                reason: format!("{} not found", path.display()),
            });
        }
        let series = load_csv(&path)?;

        let end = range
            .end
            .and_hms_opt(23, 59, 59)
            .map(|d| d.and_utc())
            .unwrap_or_else(Utc::now);
        let start = range
            .start
            .unwrap_or(range.end - chrono::Duration::days(DEFAULT_DAYS))
            .and_hms_opt(0, 0, 0)
            .map(|d| d.and_utc())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        Ok(series.between(start, end).daily())
    }
}

pub fn csv_file_name(pair: &TokenPair) -> String {
    format!(
        "{}_{}.csv",
        pair.base.ticker.to_lowercase(),
        pair.quote.ticker.to_lowercase()
    )
}

/// Fetch prices for a pair, inverting them when the source only quotes the
/// pair the other way round.
pub fn fetch_prices(
    source: &dyn PriceSource,
    pair: &mut TokenPair,
    range: &DateRange,
    inverse: bool,
) -> Result<()> {
    let prices = source.historical_prices(pair, range)?;
    let prices = if inverse { prices.invert()? } else { prices };
    tracing::info!(
        pair = %pair.ticker(),
        observations = prices.len(),
        "loaded historical prices"
    );
    pair.set_prices(prices);
    Ok(())
}

/// Save a price series to a CSV file.
pub fn save_csv(series: &PriceSeries, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["timestamp_ms", "price"])?;

    for p in &series.points {
        wtr.write_record(&[p.timestamp.timestamp_millis().to_string(), p.price.to_string()])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Load a price series from a CSV file.
pub fn load_csv(path: &Path) -> Result<PriceSeries> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut points = Vec::new();

    for result in rdr.records() {
        let record = result?;
        let ms: i64 = record[0].trim().parse().map_err(|_| {
            ThresholdError::InvalidParameter(format!("bad timestamp '{}'", &record[0]))
        })?;
        let price: f64 = record[1].trim().parse().map_err(|_| {
            ThresholdError::InvalidParameter(format!("bad price '{}'", &record[1]))
        })?;
        check_price(price, ms)?;
        let timestamp = timestamp_from_ms(ms)
            .ok_or_else(|| ThresholdError::InvalidParameter(format!("timestamp {} out of range", ms)))?;
        points.push(PricePoint { timestamp, price });
    }

    Ok(PriceSeries::new(points))
}
