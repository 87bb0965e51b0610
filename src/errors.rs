/// Domain-specific error types for the pricing service.
/// Core pricing failures are terminal for the requested operation and are
/// never reported as a NaN price. Market-data failures stay at the edges.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("model computation error: {0}")]
    Model(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("market data error: {0}")]
    MarketData(String),

    #[error("market data API error: {status} {body}")]
    MarketDataApi { status: u16, body: String },

    #[error("config error: {0}")]
    Config(String),
}

impl EngineError {
    /// True for failures caused by the caller's own parameters.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::InvalidArgument(_))
    }

    /// True for failures of the upstream market-data provider.
    pub fn is_upstream_error(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Parse(_) | Self::MarketData(_) | Self::MarketDataApi { .. }
        )
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        EngineError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Parse(e.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Network(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
