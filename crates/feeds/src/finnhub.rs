//! Finnhub REST quote client.
//!
//! Fetches `/quote` for one symbol at a time and converts the payload into a
//! `PriceObservation`. Any failure is returned as a `FeedError`, never a panic.

use crate::{FeedError, PriceSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use stockwatch_core::{PriceObservation, Symbol};
use tracing::debug;

/// Quote payload: `{"c":..,"d":..,"dp":..,"h":..,"l":..,"o":..,"pc":..,"t":..}`.
/// Only the fields used here are decoded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteResponse {
    /// Current price
    pub c: Option<f64>,
    /// Previous close
    pub pc: Option<f64>,
    /// Volume (not part of the free quote endpoint, usually absent)
    #[serde(default)]
    pub v: Option<f64>,
}

/// Convert a decoded quote into an observation.
///
/// A missing current price is `MissingPrice`; a zero (or missing) current
/// price or previous close is `ZeroPrice`.
pub fn observation_from_quote(
    symbol: &Symbol,
    quote: &QuoteResponse,
    observed_at: DateTime<Utc>,
) -> Result<PriceObservation, FeedError> {
    let current = quote
        .c
        .ok_or_else(|| FeedError::MissingPrice(symbol.to_string()))?;
    let previous_close = quote.pc.unwrap_or(0.0);
    let volume = quote.v.map(|v| v as i64).unwrap_or(0);

    PriceObservation::new(symbol.clone(), current, previous_close, volume, observed_at)
        .ok_or_else(|| FeedError::ZeroPrice(symbol.to_string()))
}

/// Finnhub quote client.
pub struct FinnhubClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FinnhubClient {
    const BASE_URL: &'static str = "https://finnhub.io/api/v1";
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a client with the given API token.
    pub fn new(api_key: impl Into<String>) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FeedError::Setup(e.to_string()))?;

        Ok(Self {
            http,
            base_url: Self::BASE_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    /// Point the client at a different API root (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Fetch and decode the raw quote for a symbol.
    pub async fn fetch_quote(&self, symbol: &Symbol) -> Result<QuoteResponse, FeedError> {
        let url = format!("{}/quote", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[("symbol", symbol.as_str()), ("token", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FeedError::HttpStatus {
                symbol: symbol.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        let quote: QuoteResponse = serde_json::from_str(&body)?;
        debug!(symbol = %symbol, current = ?quote.c, previous_close = ?quote.pc, "Finnhub quote");
        Ok(quote)
    }
}

#[async_trait]
impl PriceSource for FinnhubClient {
    async fn fetch_observation(&self, symbol: &Symbol) -> Result<PriceObservation, FeedError> {
        let quote = self.fetch_quote(symbol).await?;
        observation_from_quote(symbol, &quote, Utc::now())
    }

    fn name(&self) -> &'static str {
        "finnhub"
    }
}
