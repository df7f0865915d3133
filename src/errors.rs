/// Error types for the forecast engine.
///
/// The first five variants are raised by the pure core (estimate, simulate,
/// summarize) and never wrap another error. The rest belong to the
/// collaborators around it: the market data feed, the chart renderer and the
/// batch driver. Callers branch on the variant, not on the message.
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("numerical error: {0}")]
    Numerical(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("empty ensemble: {0}")]
    EmptyEnsemble(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("market data error: {0}")]
    MarketData(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("worker failed: {0}")]
    Worker(String),
}

impl From<reqwest::Error> for ForecastError {
    fn from(e: reqwest::Error) -> Self {
        ForecastError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(e: serde_json::Error) -> Self {
        ForecastError::Parse(e.to_string())
    }
}

impl From<std::io::Error> for ForecastError {
    fn from(e: std::io::Error) -> Self {
        ForecastError::Io(e.to_string())
    }
}

impl From<tokio::task::JoinError> for ForecastError {
    fn from(e: tokio::task::JoinError) -> Self {
        ForecastError::Worker(e.to_string())
    }
}

pub type ForecastResult<T> = Result<T, ForecastError>;
