//! Telegram delivery configuration.

use serde::{Deserialize, Serialize};

/// Destination for drop alerts.
#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token, never serialized.
    #[serde(skip_serializing, default)]
    pub bot_token: String,
    /// Chat that receives every alert.
    pub chat_id: String,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.masked_chat_id())
            .finish()
    }
}

impl TelegramConfig {
    /// Build a config from a token and chat id.
    /// Returns None if either is blank.
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Option<Self> {
        let bot_token = bot_token.into().trim().to_string();
        let chat_id = chat_id.into().trim().to_string();

        if bot_token.is_empty() || chat_id.is_empty() {
            return None;
        }

        Some(Self { bot_token, chat_id })
    }

    /// Chat id with everything after the first few characters hidden.
    pub fn masked_chat_id(&self) -> String {
        let visible: String = self.chat_id.chars().take(4).collect();
        format!("{}***", visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_blank_values() {
        assert!(TelegramConfig::new("", "123").is_none());
        assert!(TelegramConfig::new("token", "  ").is_none());
        assert!(TelegramConfig::new("token", "123").is_some());
    }

    #[test]
    fn test_token_is_not_serialized() {
        let config = TelegramConfig::new("secret-token", "6888820516").unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret-token"));
        assert!(json.contains("6888820516"));
    }

    #[test]
    fn test_debug_masks_secrets() {
        let config = TelegramConfig::new("secret-token", "6888820516").unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("6888***"));
    }
}
