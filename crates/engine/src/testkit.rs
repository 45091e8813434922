//! Fakes for exercising the analysis cycle without network access.

use crate::analyzer::{Analyzer, AnalyzerConfig};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stockwatch_alerts::{AlertNotifier, Database, NotifierError};
use stockwatch_core::{AlertThreshold, DropAlert, Symbol};
use stockwatch_feeds::{observation_from_quote, FeedError, PriceSource, QuoteResponse};
use tokio::sync::Notify;

/// Canned response for one symbol.
#[derive(Debug, Clone, Copy)]
pub enum ScriptedQuote {
    Price { current: f64, previous_close: f64 },
    /// Quote without a current price.
    Missing,
    /// Network failure.
    Transport,
}

/// Pauses a `ScriptedPriceSource` inside its first fetch until released.
#[derive(Clone)]
pub struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Price source answering from a fixed table. Unknown symbols have no data.
#[derive(Default)]
pub struct ScriptedPriceSource {
    quotes: HashMap<String, ScriptedQuote>,
    calls: Mutex<Vec<Symbol>>,
    gate: Option<Gate>,
}

impl ScriptedPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(self, symbol: &str, current: f64, previous_close: f64) -> Self {
        self.with_quote(
            symbol,
            ScriptedQuote::Price {
                current,
                previous_close,
            },
        )
    }

    pub fn with_quote(mut self, symbol: &str, quote: ScriptedQuote) -> Self {
        self.quotes.insert(symbol.to_uppercase(), quote);
        self
    }

    /// Block every fetch until the returned gate is released.
    pub fn gated(mut self) -> (Self, Gate) {
        let gate = Gate {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        };
        self.gate = Some(gate.clone());
        (self, gate)
    }

    /// Symbols fetched so far, in call order.
    pub fn calls(&self) -> Vec<Symbol> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PriceSource for ScriptedPriceSource {
    async fn fetch_observation(
        &self,
        symbol: &Symbol,
    ) -> Result<stockwatch_core::PriceObservation, FeedError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(symbol.clone());
        }

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let quote = match self.quotes.get(symbol.as_str()) {
            Some(ScriptedQuote::Price {
                current,
                previous_close,
            }) => QuoteResponse {
                c: Some(*current),
                pc: Some(*previous_close),
                v: None,
            },
            Some(ScriptedQuote::Missing) | None => QuoteResponse::default(),
            Some(ScriptedQuote::Transport) => {
                return Err(FeedError::Transport("connection refused".into()))
            }
        };

        observation_from_quote(symbol, &quote, Utc::now())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Notifier that records every alert it accepts.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<DropAlert>>,
    attempts: AtomicUsize,
    failing: HashSet<String>,
    always_fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject alerts for the given symbols.
    pub fn failing_for(symbols: &[&str]) -> Self {
        Self {
            failing: symbols.iter().map(|s| s.to_uppercase()).collect(),
            ..Default::default()
        }
    }

    pub fn always_failing() -> Self {
        Self {
            always_fail: true,
            ..Default::default()
        }
    }

    /// Alerts delivered successfully.
    pub fn sent(&self) -> Vec<DropAlert> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Delivery attempts, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertNotifier for RecordingNotifier {
    async fn send_drop_alert(&self, alert: &DropAlert) -> Result<(), NotifierError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.always_fail || self.failing.contains(alert.symbol.as_str()) {
            return Err(NotifierError::Delivery(format!(
                "rejected {}",
                alert.symbol
            )));
        }

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(alert.clone());
        }
        Ok(())
    }
}

/// Analyzer over an in-memory database with the given watchlist and no
/// delay between symbols.
pub async fn memory_analyzer(
    source: Arc<dyn PriceSource>,
    notifier: Arc<dyn AlertNotifier>,
    threshold: f64,
    symbols: &[&str],
) -> Analyzer {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    let watchlist: Vec<Symbol> = symbols.iter().filter_map(|s| Symbol::parse(s)).collect();
    db.replace_watchlist(&watchlist)
        .await
        .expect("seed watchlist");

    let config = AnalyzerConfig {
        alert_threshold: AlertThreshold(threshold),
        symbol_delay: Duration::ZERO,
    };
    Analyzer::load(db, source, notifier, config)
        .await
        .expect("analyzer")
}
