//! Storage and Telegram delivery for drop alerts.
//!
//! This crate provides:
//! - SQLite storage for the watchlist, observations and alert history
//! - Telegram message formatting and delivery
//! - The `AlertNotifier` seam used by the analysis cycle

pub mod config;
pub mod db;
pub mod notifier;
pub mod telegram;

pub use config::TelegramConfig;
pub use db::{Database, DbError};
pub use notifier::{AlertNotifier, DisabledNotifier, NotifierError, TelegramNotifier};
pub use telegram::{format_alert_message, TelegramBot};
