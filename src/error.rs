use thiserror::Error;

/// Everything that can go wrong between the dashboard core and the quote service.
///
/// None of these are fatal: callers recover locally and keep the last-known-good
/// state on screen.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketError {
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("no stocks found for `{query}`")]
    EmptyResult { query: String },

    #[error("request #{token} superseded by #{latest}")]
    Superseded { token: u64, latest: u64 },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("request cancelled")]
    Cancelled,
}

impl MarketError {
    /// Superseded and cancelled requests are dropped without telling anyone.
    pub fn is_silent(&self) -> bool {
        matches!(self, MarketError::Superseded { .. } | MarketError::Cancelled)
    }
}

impl From<reqwest::Error> for MarketError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            MarketError::MalformedResponse(err.to_string())
        } else {
            MarketError::NetworkUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        MarketError::MalformedResponse(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for MarketError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        MarketError::NetworkUnavailable(err.to_string())
    }
}

pub type MarketResult<T> = Result<T, MarketError>;
