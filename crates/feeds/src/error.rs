//! Error types for quote fetching.

use thiserror::Error;

/// Reasons a quote could not be turned into an observation.
///
/// Every variant means "no data" to the analysis cycle: the symbol is
/// skipped and nothing is stored.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("No current price in response for {0}")]
    MissingPrice(String),

    #[error("Zero price or previous close for {0}")]
    ZeroPrice(String),

    #[error("HTTP {status} for {symbol}")]
    HttpStatus { symbol: String, status: u16 },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Client setup failed: {0}")]
    Setup(String),
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FeedError::ParseError(err.to_string())
        } else {
            FeedError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::ParseError(err.to_string())
    }
}

impl FeedError {
    /// True when the upstream answered but had no usable price.
    /// False for transport, status and decode failures.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, FeedError::MissingPrice(_) | FeedError::ZeroPrice(_))
    }
}
