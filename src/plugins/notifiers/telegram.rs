use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::TelegramConfig;
use crate::models::Notification;
use crate::plugins::traits::{NotificationResult, NotifierPlugin};
use crate::utils::error::{AppError, Result};

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    result: Option<SentMessage>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Telegram Bot API `sendMessage` with legacy Markdown formatting.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
    currency_symbol: String,
}

impl TelegramNotifier {
    pub fn new(api_base: &str, bot_token: &str, chat_id: &str, currency_symbol: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
            currency_symbol: currency_symbol.to_string(),
        })
    }

    /// `None` unless both the bot token and chat id are configured.
    pub fn from_config(config: &TelegramConfig, currency_symbol: &str) -> Result<Option<Self>> {
        match (&config.bot_token, &config.chat_id) {
            (Some(token), Some(chat)) if !token.is_empty() && !chat.is_empty() => {
                Ok(Some(Self::new(&config.api_base, token, chat, currency_symbol)?))
            }
            _ => Ok(None),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    pub fn format_message(&self, notification: &Notification) -> String {
        let record = &notification.record;
        format!(
            "{} *{}*\n\n🏎️ *{}*\n\n💰 Price: {}\n\n🛒 Buy Now: {}\n\n⏰ Detected: {}",
            notification.kind.emoji(),
            notification.kind.headline(),
            escape_markdown(&record.name),
            notification.formatted_price(&self.currency_symbol),
            record.url,
            record.state_entered_at.format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }
}

/// Escapes the characters legacy Markdown treats as entity delimiters.
fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl NotifierPlugin for TelegramNotifier {
    fn name(&self) -> &str {
        "Telegram Notifier"
    }

    fn plugin_type(&self) -> &str {
        "telegram"
    }

    fn description(&self) -> &str {
        "Sends restock alerts to a Telegram chat via the Bot API"
    }

    async fn send(&self, notification: &Notification) -> Result<NotificationResult> {
        let payload = json!({
            "chat_id": self.chat_id,
            "text": self.format_message(notification),
            "parse_mode": "Markdown",
            "disable_web_page_preview": false,
        });

        let response = self.client.post(self.endpoint()).json(&payload).send().await?;
        let status = response.status();
        let body: SendMessageResponse = response.json().await.map_err(|e| {
            AppError::Notification(format!("Unreadable Telegram response ({}): {}", status, e))
        })?;

        if body.ok {
            Ok(NotificationResult::delivered(
                body.result.map(|m| m.message_id.to_string()),
            ))
        } else {
            Ok(NotificationResult::failed(
                body.description.unwrap_or_else(|| format!("HTTP {}", status)),
            ))
        }
    }
}
