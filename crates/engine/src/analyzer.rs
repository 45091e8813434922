//! The analysis cycle.
//!
//! One cycle is a sequential pass over a snapshot of the watchlist:
//! fetch -> persist -> evaluate -> notify, with a fixed pause between
//! symbols. A failure on one symbol never stops the pass.

use crate::guard::{RunGuard, SingleFlight};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use stockwatch_alerts::{AlertNotifier, Database, DbError, NotifierError};
use stockwatch_core::{
    default_watchlist, normalize_symbols, AlertRecord, AlertThreshold, DropAlert,
    PriceObservation, Symbol,
};
use stockwatch_feeds::{FeedError, PriceSource};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("analysis already running")]
    AlreadyRunning,
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Configuration for the analyzer.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Percent change at or below which an alert fires.
    pub alert_threshold: AlertThreshold,
    /// Pause after each symbol, to stay under the quote API rate limit.
    pub symbol_delay: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            alert_threshold: AlertThreshold::default(),
            symbol_delay: Duration::from_secs(1),
        }
    }
}

/// What happened to one symbol during a cycle.
#[derive(Debug)]
pub enum SymbolOutcome {
    /// No usable quote; nothing stored.
    NoData(FeedError),
    /// Stored, above the threshold.
    Stable(PriceObservation),
    /// Stored, alert delivered and recorded.
    AlertSent(PriceObservation),
    /// Stored, alert triggered but delivery failed; nothing recorded.
    DeliveryFailed(PriceObservation, NotifierError),
}

/// Counters for one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub symbols_total: usize,
    pub observations_saved: usize,
    pub no_data: usize,
    pub alerts_triggered: usize,
    pub alerts_sent: usize,
    pub delivery_failures: usize,
    /// Symbols aborted by a storage error.
    pub errors: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: &SymbolOutcome) {
        match outcome {
            SymbolOutcome::NoData(_) => self.no_data += 1,
            SymbolOutcome::Stable(_) => self.observations_saved += 1,
            SymbolOutcome::AlertSent(_) => {
                self.observations_saved += 1;
                self.alerts_triggered += 1;
                self.alerts_sent += 1;
            }
            SymbolOutcome::DeliveryFailed(_, _) => {
                self.observations_saved += 1;
                self.alerts_triggered += 1;
                self.delivery_failures += 1;
            }
        }
    }
}

/// Latest stored state of one watchlisted symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockSnapshot {
    pub symbol: String,
    pub current_price: f64,
    pub previous_close: f64,
    pub weekly_change: f64,
    pub volume: i64,
    pub last_update: DateTime<Utc>,
    pub is_alert: bool,
}

/// Point-in-time view of the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzerStatus {
    pub is_running: bool,
    pub watchlist_size: usize,
    /// Completion time of the most recent cycle.
    pub last_analysis: Option<DateTime<Utc>>,
}

/// Owns the watchlist, the single-flight guard and the collaborators a
/// cycle needs. Built once at startup and shared behind an `Arc`.
pub struct Analyzer {
    db: Database,
    source: Arc<dyn PriceSource>,
    notifier: Arc<dyn AlertNotifier>,
    config: AnalyzerConfig,
    watchlist: RwLock<Vec<Symbol>>,
    flight: SingleFlight,
    last_analysis: RwLock<Option<DateTime<Utc>>>,
}

impl Analyzer {
    /// Load the stored watchlist, seeding the default list on first run.
    pub async fn load(
        db: Database,
        source: Arc<dyn PriceSource>,
        notifier: Arc<dyn AlertNotifier>,
        config: AnalyzerConfig,
    ) -> Result<Self, AnalyzerError> {
        let mut watchlist = db.load_watchlist().await?;
        if watchlist.is_empty() {
            watchlist = default_watchlist();
            db.replace_watchlist(&watchlist).await?;
            info!(symbols = watchlist.len(), "Seeded default watchlist");
        }

        Ok(Self {
            db,
            source,
            notifier,
            config,
            watchlist: RwLock::new(watchlist),
            flight: SingleFlight::new(),
            last_analysis: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn notifier_configured(&self) -> bool {
        self.notifier.is_configured()
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    pub async fn watchlist(&self) -> Vec<Symbol> {
        self.watchlist.read().await.clone()
    }

    /// Normalize and fully replace the watchlist. Returns the stored set.
    pub async fn replace_watchlist<S: AsRef<str>>(
        &self,
        raw: &[S],
    ) -> Result<Vec<Symbol>, AnalyzerError> {
        let symbols = normalize_symbols(raw);
        self.db.replace_watchlist(&symbols).await?;
        *self.watchlist.write().await = symbols.clone();
        info!(symbols = symbols.len(), "Watchlist replaced");
        Ok(symbols)
    }

    pub fn is_running(&self) -> bool {
        self.flight.is_running()
    }

    /// Take the single-flight guard for a new cycle.
    pub fn try_begin(&self) -> Result<RunGuard, AnalyzerError> {
        self.flight.try_acquire().ok_or(AnalyzerError::AlreadyRunning)
    }

    /// Run a cycle if none is in flight.
    pub async fn run_exclusive(&self) -> Result<CycleReport, AnalyzerError> {
        let guard = self.try_begin()?;
        Ok(self.run_cycle(guard).await)
    }

    /// Run one full pass. The guard is released when the pass completes.
    pub async fn run_cycle(&self, guard: RunGuard) -> CycleReport {
        let symbols = self.watchlist().await;
        let total = symbols.len();
        let mut report = CycleReport {
            symbols_total: total,
            ..Default::default()
        };

        info!(symbols = total, source = self.source.name(), "Starting analysis");

        for (i, symbol) in symbols.iter().enumerate() {
            debug!(symbol = %symbol, "Analyzing {}/{}", i + 1, total);

            match self.process_symbol(symbol).await {
                Ok(outcome) => report.record(&outcome),
                Err(e) => {
                    error!(symbol = %symbol, error = %e, "Storage error, skipping symbol");
                    report.errors += 1;
                }
            }

            if !self.config.symbol_delay.is_zero() {
                tokio::time::sleep(self.config.symbol_delay).await;
            }
        }

        *self.last_analysis.write().await = Some(Utc::now());
        drop(guard);

        info!(
            alerts_sent = report.alerts_sent,
            saved = report.observations_saved,
            no_data = report.no_data,
            errors = report.errors,
            "Analysis finished"
        );
        report
    }

    /// Fetch, store, evaluate and possibly notify for one symbol.
    async fn process_symbol(&self, symbol: &Symbol) -> Result<SymbolOutcome, DbError> {
        let observation = match self.source.fetch_observation(symbol).await {
            Ok(obs) => obs,
            Err(e) => {
                if e.is_unavailable() {
                    debug!(symbol = %symbol, reason = %e, "No data");
                } else {
                    warn!(symbol = %symbol, error = %e, "Quote fetch failed");
                }
                return Ok(SymbolOutcome::NoData(e));
            }
        };

        self.db.save_observation(&observation).await?;

        if !self
            .config
            .alert_threshold
            .is_triggered(observation.change_percent)
        {
            debug!(symbol = %symbol, change = observation.change_percent, "OK");
            return Ok(SymbolOutcome::Stable(observation));
        }

        warn!(
            symbol = %symbol,
            change = observation.change_percent,
            price = observation.price,
            "Drop below threshold"
        );

        let alert = DropAlert::new(symbol.clone(), observation.change_percent, observation.price);
        match self.notifier.send_drop_alert(&alert).await {
            Ok(()) => {
                self.db
                    .record_alert(symbol, alert.change_percent, alert.price, alert.detected_at)
                    .await?;
                Ok(SymbolOutcome::AlertSent(observation))
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Alert not delivered");
                Ok(SymbolOutcome::DeliveryFailed(observation, e))
            }
        }
    }

    /// Latest observation for every watchlisted symbol that has one.
    pub async fn current_data(&self) -> Result<Vec<StockSnapshot>, AnalyzerError> {
        let symbols = self.watchlist().await;
        let mut stocks = Vec::with_capacity(symbols.len());

        for symbol in &symbols {
            if let Some(obs) = self.db.latest_observation(symbol).await? {
                stocks.push(StockSnapshot {
                    symbol: symbol.to_string(),
                    current_price: obs.price,
                    previous_close: obs.previous_close,
                    weekly_change: obs.change_percent,
                    volume: obs.volume,
                    last_update: obs.observed_at,
                    is_alert: self.config.alert_threshold.is_triggered(obs.change_percent),
                });
            }
        }

        Ok(stocks)
    }

    pub async fn recent_alerts(&self, limit: i64) -> Result<Vec<AlertRecord>, AnalyzerError> {
        Ok(self.db.recent_alerts(limit).await?)
    }

    /// Send a fixed sample alert through the notifier. Nothing is stored.
    pub async fn send_test_notification(&self) -> Result<(), NotifierError> {
        let sample = DropAlert::new(
            Symbol::parse("TEST").ok_or_else(|| NotifierError::Delivery("bad sample".into()))?,
            -25.5,
            150.75,
        );
        self.notifier.send_drop_alert(&sample).await
    }

    pub async fn last_analysis(&self) -> Option<DateTime<Utc>> {
        *self.last_analysis.read().await
    }

    pub async fn status(&self) -> AnalyzerStatus {
        AnalyzerStatus {
            is_running: self.is_running(),
            watchlist_size: self.watchlist.read().await.len(),
            last_analysis: self.last_analysis().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{memory_analyzer, RecordingNotifier, ScriptedPriceSource, ScriptedQuote};
    use pretty_assertions::assert_eq;

    fn sym(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_drop_at_threshold_alerts() {
        let source = Arc::new(ScriptedPriceSource::new().with_price("XYZ", 80.0, 100.0));
        let notifier = Arc::new(RecordingNotifier::new());
        let analyzer = memory_analyzer(source, notifier.clone(), -20.0, &["XYZ"]).await;

        let report = analyzer.run_exclusive().await.unwrap();

        assert_eq!(report.alerts_sent, 1);
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(notifier.sent()[0].change_percent, -20.0);

        let alerts = analyzer.recent_alerts(20).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].symbol, "XYZ");
        assert_eq!(alerts[0].price, 80.0);
        assert!(alerts[0].sent);
    }

    #[tokio::test]
    async fn test_fractional_drop_at_threshold_alerts() {
        let source = Arc::new(ScriptedPriceSource::new().with_price("PENNY", 1.80, 2.25));
        let notifier = Arc::new(RecordingNotifier::new());
        let analyzer = memory_analyzer(source, notifier.clone(), -20.0, &["PENNY"]).await;

        let report = analyzer.run_exclusive().await.unwrap();

        assert_eq!(report.alerts_sent, 1);
        assert_eq!(notifier.sent()[0].symbol.as_str(), "PENNY");
        assert_eq!(analyzer.recent_alerts(20).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_drop_above_threshold_does_not_alert() {
        let source = Arc::new(ScriptedPriceSource::new().with_price("XYZ", 80.0, 100.0));
        let notifier = Arc::new(RecordingNotifier::new());
        let analyzer = memory_analyzer(source, notifier.clone(), -21.0, &["XYZ"]).await;

        let report = analyzer.run_exclusive().await.unwrap();

        assert_eq!(report.alerts_triggered, 0);
        assert_eq!(report.observations_saved, 1);
        assert_eq!(notifier.attempts(), 0);
        assert!(analyzer.recent_alerts(20).await.unwrap().is_empty());
        // Observation is stored regardless.
        assert_eq!(analyzer.current_data().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_previous_close_stores_nothing() {
        let source = Arc::new(ScriptedPriceSource::new().with_price("ZERO", 50.0, 0.0));
        let notifier = Arc::new(RecordingNotifier::new());
        let analyzer = memory_analyzer(source, notifier.clone(), -20.0, &["ZERO"]).await;

        let report = analyzer.run_exclusive().await.unwrap();

        assert_eq!(report.no_data, 1);
        assert_eq!(report.observations_saved, 0);
        assert_eq!(notifier.attempts(), 0);
        assert!(analyzer.current_data().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_records_nothing() {
        let source = Arc::new(
            ScriptedPriceSource::new()
                .with_price("FAIL", 50.0, 100.0)
                .with_price("OKAY", 60.0, 100.0),
        );
        let notifier = Arc::new(RecordingNotifier::failing_for(&["FAIL"]));
        let analyzer = memory_analyzer(source, notifier.clone(), -20.0, &["FAIL", "OKAY"]).await;

        let report = analyzer.run_exclusive().await.unwrap();

        assert_eq!(report.alerts_triggered, 2);
        assert_eq!(report.alerts_sent, 1);
        assert_eq!(report.delivery_failures, 1);
        assert_eq!(notifier.attempts(), 2);

        let alerts = analyzer.recent_alerts(20).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].symbol, "OKAY");
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_cycle() {
        let source = Arc::new(
            ScriptedPriceSource::new()
                .with_quote("DOWN", ScriptedQuote::Transport)
                .with_quote("GONE", ScriptedQuote::Missing)
                .with_price("LAST", 70.0, 100.0),
        );
        let notifier = Arc::new(RecordingNotifier::new());
        let analyzer =
            memory_analyzer(source.clone(), notifier, -20.0, &["DOWN", "GONE", "LAST"]).await;

        let report = analyzer.run_exclusive().await.unwrap();

        assert_eq!(report.symbols_total, 3);
        assert_eq!(report.no_data, 2);
        assert_eq!(report.alerts_sent, 1);
        // Visited in watchlist order.
        assert_eq!(source.calls(), vec![sym("DOWN"), sym("GONE"), sym("LAST")]);
    }

    #[tokio::test]
    async fn test_storage_error_skips_symbol_only() {
        let source = Arc::new(
            ScriptedPriceSource::new()
                .with_price("AAA", 50.0, 100.0)
                .with_price("BBB", 99.0, 100.0),
        );
        let notifier = Arc::new(RecordingNotifier::new());
        let analyzer = memory_analyzer(source.clone(), notifier.clone(), -20.0, &["AAA", "BBB"]).await;

        analyzer.db.close().await;
        let report = analyzer.run_exclusive().await.unwrap();

        assert_eq!(report.errors, 2);
        assert_eq!(report.alerts_sent, 0);
        assert_eq!(notifier.attempts(), 0);
        assert_eq!(source.calls().len(), 2);
        assert!(!analyzer.is_running());
    }

    #[tokio::test]
    async fn test_single_flight_rejects_second_run() {
        let (source, gate) = ScriptedPriceSource::new()
            .with_price("XYZ", 90.0, 100.0)
            .gated();
        let notifier = Arc::new(RecordingNotifier::new());
        let analyzer = Arc::new(memory_analyzer(Arc::new(source), notifier, -20.0, &["XYZ"]).await);

        assert!(!analyzer.is_running());
        assert!(analyzer.status().await.last_analysis.is_none());

        let background = {
            let analyzer = Arc::clone(&analyzer);
            tokio::spawn(async move { analyzer.run_exclusive().await })
        };

        gate.wait_entered().await;
        assert!(analyzer.is_running());
        assert!(analyzer.status().await.is_running);
        assert!(matches!(
            analyzer.run_exclusive().await,
            Err(AnalyzerError::AlreadyRunning)
        ));

        gate.release();
        let report = background.await.unwrap().unwrap();
        assert_eq!(report.observations_saved, 1);

        assert!(!analyzer.is_running());
        assert!(analyzer.status().await.last_analysis.is_some());
    }

    #[tokio::test]
    async fn test_symbol_delay_applies_to_every_symbol() {
        let source = Arc::new(
            ScriptedPriceSource::new()
                .with_price("AAA", 100.0, 100.0)
                .with_quote("BBB", ScriptedQuote::Missing),
        );
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.replace_watchlist(&[sym("AAA"), sym("BBB")]).await.unwrap();
        let config = AnalyzerConfig {
            alert_threshold: AlertThreshold(-20.0),
            symbol_delay: Duration::from_millis(40),
        };
        let analyzer = Analyzer::load(db, source, Arc::new(RecordingNotifier::new()), config)
            .await
            .unwrap();

        let started = std::time::Instant::now();
        analyzer.run_exclusive().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_load_seeds_default_watchlist_once() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let source = Arc::new(ScriptedPriceSource::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let analyzer = Analyzer::load(db.clone(), source.clone(), notifier.clone(), AnalyzerConfig::default())
            .await
            .unwrap();
        assert_eq!(analyzer.watchlist().await.len(), 50);

        analyzer.replace_watchlist(&["nvda"]).await.unwrap();
        let reloaded = Analyzer::load(db, source, notifier, AnalyzerConfig::default())
            .await
            .unwrap();
        assert_eq!(reloaded.watchlist().await, vec![sym("NVDA")]);
    }

    #[tokio::test]
    async fn test_replace_watchlist_normalizes() {
        let analyzer = memory_analyzer(
            Arc::new(ScriptedPriceSource::new()),
            Arc::new(RecordingNotifier::new()),
            -20.0,
            &["MSFT"],
        )
        .await;

        let stored = analyzer.replace_watchlist(&["aapl ", "AAPL"]).await.unwrap();
        assert_eq!(stored, vec![sym("AAPL")]);
        assert_eq!(analyzer.watchlist().await, vec![sym("AAPL")]);
        assert_eq!(analyzer.status().await.watchlist_size, 1);
    }

    #[tokio::test]
    async fn test_current_data_skips_unobserved_symbols() {
        let source = Arc::new(
            ScriptedPriceSource::new()
                .with_price("DROP", 70.0, 100.0)
                .with_price("FLAT", 100.0, 100.0),
        );
        let analyzer = memory_analyzer(
            source,
            Arc::new(RecordingNotifier::new()),
            -20.0,
            &["DROP", "FLAT", "NEVER"],
        )
        .await;

        analyzer.run_exclusive().await.unwrap();
        let data = analyzer.current_data().await.unwrap();

        assert_eq!(data.len(), 2);
        let drop = data.iter().find(|s| s.symbol == "DROP").unwrap();
        assert!(drop.is_alert);
        assert_eq!(drop.weekly_change, -30.0);
        let flat = data.iter().find(|s| s.symbol == "FLAT").unwrap();
        assert!(!flat.is_alert);
        assert!(data.iter().all(|s| s.symbol != "NEVER"));
    }

    #[tokio::test]
    async fn test_status_before_first_cycle() {
        let analyzer = memory_analyzer(
            Arc::new(ScriptedPriceSource::new()),
            Arc::new(RecordingNotifier::new()),
            -20.0,
            &["AAPL", "MSFT"],
        )
        .await;

        let json = serde_json::to_value(analyzer.status().await).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "is_running": false,
                "watchlist_size": 2,
                "last_analysis": null,
            })
        );
    }

    #[tokio::test]
    async fn test_send_test_notification() {
        let notifier = Arc::new(RecordingNotifier::new());
        let analyzer = memory_analyzer(
            Arc::new(ScriptedPriceSource::new()),
            notifier.clone(),
            -20.0,
            &["AAPL"],
        )
        .await;

        analyzer.send_test_notification().await.unwrap();
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].symbol.as_str(), "TEST");
        assert_eq!(sent[0].change_percent, -25.5);
        assert_eq!(sent[0].price, 150.75);
        // Test notifications are not part of the alert history.
        assert!(analyzer.recent_alerts(20).await.unwrap().is_empty());
    }
}
