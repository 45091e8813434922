//! Application configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use stockwatch_alerts::TelegramConfig;
use stockwatch_core::AlertThreshold;
use stockwatch_engine::AnalyzerConfig;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Alert threshold must be a finite negative percentage, got {0}")]
    InvalidThreshold(f64),
    #[error("Analysis interval must be at least one second")]
    ZeroInterval,
    #[error("Scheduler tick must be at least one second")]
    ZeroTick,
    #[error("Database URL is empty")]
    EmptyDatabaseUrl,
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP port for the dashboard API.
    pub port: u16,
    /// SQLite connection string.
    pub database_url: String,
    /// Schedule and analysis settings.
    pub analysis: AnalysisSettings,
    /// Telegram destination, None when not configured.
    pub telegram: Option<TelegramConfig>,
    /// Finnhub API key, never serialized.
    #[serde(skip_serializing, default)]
    pub finnhub_api_key: Option<String>,
    /// Logging level.
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            database_url: "sqlite://stock_data.db".to_string(),
            analysis: AnalysisSettings::default(),
            telegram: None,
            finnhub_api_key: None,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.analysis.alert_threshold;
        if !threshold.is_finite() || threshold >= 0.0 {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        if self.analysis.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.analysis.tick_secs == 0 {
            return Err(ConfigError::ZeroTick);
        }
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::EmptyDatabaseUrl);
        }
        Ok(())
    }

    pub fn telegram_configured(&self) -> bool {
        self.telegram.is_some()
    }

    pub fn finnhub_configured(&self) -> bool {
        self.finnhub_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

/// Analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Percent change at or below which an alert fires.
    pub alert_threshold: f64,
    /// Seconds between scheduled cycles.
    pub interval_secs: u64,
    /// Seconds between checks for due work.
    pub tick_secs: u64,
    /// Milliseconds to pause after each symbol.
    pub symbol_delay_ms: u64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            alert_threshold: -20.0,
            interval_secs: 3600,
            tick_secs: 60,
            symbol_delay_ms: 1000,
        }
    }
}

impl AnalysisSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }
}

impl From<&AnalysisSettings> for AnalyzerConfig {
    fn from(settings: &AnalysisSettings) -> Self {
        AnalyzerConfig {
            alert_threshold: AlertThreshold(settings.alert_threshold),
            symbol_delay: Duration::from_millis(settings.symbol_delay_ms),
        }
    }
}
