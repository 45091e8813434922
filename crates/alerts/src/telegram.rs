//! Telegram delivery and message formatting.

use chrono::{DateTime, Utc};
use stockwatch_core::Severity;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, Recipient};
use teloxide::utils::html;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram API error: {0}")]
    Api(#[from] teloxide::RequestError),
}

/// Telegram bot wrapper.
pub struct TelegramBot {
    bot: Bot,
}

impl TelegramBot {
    /// Create a new bot with the given token.
    pub fn new(token: &str) -> Self {
        let bot = Bot::new(token);
        Self { bot }
    }

    /// Send an HTML message to a chat.
    /// Numeric ids address users and groups, anything else a channel username.
    pub async fn send_alert(&self, chat_id: &str, message: &str) -> Result<(), TelegramError> {
        self.bot
            .send_message(parse_recipient(chat_id), message)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }
}

fn parse_recipient(chat_id: &str) -> Recipient {
    match chat_id.trim().parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) => Recipient::ChannelUsername(chat_id.trim().to_string()),
    }
}

/// Format a drop as an alert message.
pub fn format_alert_message(
    symbol: &str,
    change_percent: f64,
    price: f64,
    at: DateTime<Utc>,
) -> String {
    let marker = Severity::from_change(change_percent).marker();

    format!(
        "{marker} <b>STOCK ALERT</b> {marker}\n\n\
         📈 <b>Symbol:</b> {}\n\
         📉 <b>Drop:</b> {:.1}% since previous close\n\
         💰 <b>Price:</b> ${:.2}\n\
         ⏰ <b>Time:</b> {}\n\n\
         ⚠️ <b>Review recommended</b>",
        html::escape(symbol),
        change_percent.abs(),
        price,
        at.format("%H:%M:%S UTC"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 14, 5, 9).unwrap()
    }

    #[test]
    fn test_format_high_severity() {
        let msg = format_alert_message("TEST", -25.5, 150.75, at());
        assert!(msg.starts_with("🔴"));
        assert!(msg.contains("TEST"));
        assert!(msg.contains("25.5%"));
        assert!(msg.contains("$150.75"));
        assert!(msg.contains("14:05:09 UTC"));
    }

    #[test]
    fn test_format_low_severity() {
        let msg = format_alert_message("XYZ", -20.0, 80.0, at());
        assert!(msg.starts_with("🟡"));
        assert!(msg.contains("20.0%"));
        assert!(msg.contains("$80.00"));
    }

    #[test]
    fn test_format_escapes_symbol() {
        let msg = format_alert_message("<B>", -30.0, 1.0, at());
        assert!(msg.contains("&lt;B&gt;"));
    }

    #[test]
    fn test_parse_recipient() {
        assert!(matches!(parse_recipient("6888820516"), Recipient::Id(ChatId(6888820516))));
        assert!(matches!(parse_recipient("-100123"), Recipient::Id(ChatId(-100123))));
        assert!(matches!(
            parse_recipient("@alerts_channel"),
            Recipient::ChannelUsername(ref name) if name == "@alerts_channel"
        ));
    }
}
