//! Alert delivery.

use crate::config::TelegramConfig;
use crate::telegram::{format_alert_message, TelegramBot};
use async_trait::async_trait;
use stockwatch_core::DropAlert;
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("Telegram error: {0}")]
    Telegram(#[from] crate::telegram::TelegramError),
    #[error("Notifier not configured")]
    NotConfigured,
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Delivers drop alerts to a single destination.
///
/// One attempt per call. `Ok` means the message was accepted by the
/// destination; any failure comes back as an error value.
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn send_drop_alert(&self, alert: &DropAlert) -> Result<(), NotifierError>;

    /// Whether delivery can succeed at all.
    fn is_configured(&self) -> bool {
        true
    }
}

/// Sends alerts to one Telegram chat.
pub struct TelegramNotifier {
    bot: TelegramBot,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            bot: TelegramBot::new(&config.bot_token),
            chat_id: config.chat_id.clone(),
        }
    }
}

#[async_trait]
impl AlertNotifier for TelegramNotifier {
    async fn send_drop_alert(&self, alert: &DropAlert) -> Result<(), NotifierError> {
        let message = format_alert_message(
            alert.symbol.as_str(),
            alert.change_percent,
            alert.price,
            alert.detected_at,
        );

        match self.bot.send_alert(&self.chat_id, &message).await {
            Ok(()) => {
                info!(symbol = %alert.symbol, change = alert.change_percent, "Alert sent");
                Ok(())
            }
            Err(e) => {
                error!(symbol = %alert.symbol, error = %e, "Failed to send alert");
                Err(e.into())
            }
        }
    }
}

/// Stand-in used when no destination is configured. Every call fails.
#[derive(Debug, Default)]
pub struct DisabledNotifier;

#[async_trait]
impl AlertNotifier for DisabledNotifier {
    async fn send_drop_alert(&self, _alert: &DropAlert) -> Result<(), NotifierError> {
        Err(NotifierError::NotConfigured)
    }

    fn is_configured(&self) -> bool {
        false
    }
}
