use thiserror::Error;

/// Errors produced while fetching data, simulating, or estimating thresholds.
#[derive(Debug, Error)]
pub enum ThresholdError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid date: {0}")]
    Date(#[from] chrono::ParseError),

    #[error("Price data unavailable for {pair}: {reason}")]
    PriceDataUnavailable { pair: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("AMM error: {0}")]
    Amm(#[from] AmmError),
}

/// Errors raised by the constant-product pool.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AmmError {
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(f64),

    #[error("Swap fee must lie in [0, 1), got {0}")]
    InvalidFee(f64),

    #[error("Token {0} is not part of this pool")]
    UnknownToken(String),

    #[error("Swap amount {requested} must be smaller than the pool reserve {reserve} of {token}")]
    InsufficientReserve {
        token: String,
        requested: f64,
        reserve: f64,
    },

    #[error("Cannot remove {requested} of liquidity, pool only holds {available}")]
    InsufficientLiquidity { requested: f64, available: f64 },
}

pub type Result<T> = std::result::Result<T, ThresholdError>;
