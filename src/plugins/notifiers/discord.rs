use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use crate::config::DiscordConfig;
use crate::models::{AlertKind, Notification};
use crate::plugins::traits::{NotificationResult, NotifierPlugin};
use crate::utils::error::{AppError, Result};

pub struct DiscordNotifier {
    client: Client,
    webhook_url: String,
    username: Option<String>,
    avatar_url: Option<String>,
    mention_role: Option<String>,
    currency_symbol: String,
}

impl DiscordNotifier {
    pub fn from_config(config: &DiscordConfig, currency_symbol: &str) -> Result<Option<Self>> {
        let Some(webhook_url) = config.webhook_url.as_deref().filter(|u| !u.is_empty()) else {
            return Ok(None);
        };

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Some(DiscordNotifier {
            client,
            webhook_url: webhook_url.to_string(),
            username: config.username.clone(),
            avatar_url: config.avatar_url.clone(),
            mention_role: config.mention_role.clone(),
            currency_symbol: currency_symbol.to_string(),
        }))
    }

    fn get_embed_color(&self, kind: AlertKind) -> u32 {
        match kind {
            AlertKind::Restock => 0x00ff00,
            AlertKind::Reappearance => 0x0099ff,
        }
    }

    fn create_embed(&self, notification: &Notification) -> serde_json::Value {
        let record = &notification.record;
        json!({
            "title": format!("{} {}", notification.kind.emoji(), notification.kind.headline()),
            "description": format!("[{}]({})", record.name, record.url),
            "url": record.url,
            "color": self.get_embed_color(notification.kind),
            "timestamp": record.state_entered_at.to_rfc3339(),
            "fields": [
                {
                    "name": "💰 Price",
                    "value": notification.formatted_price(&self.currency_symbol),
                    "inline": true
                },
                {
                    "name": "📦 Was",
                    "value": notification.previous_state.to_string(),
                    "inline": true
                },
                {
                    "name": "🔎 Seen on",
                    "value": notification.observation.source,
                    "inline": true
                }
            ],
            "footer": { "text": format!("Product {}", record.identity) }
        })
    }

    pub fn create_webhook_payload(&self, notification: &Notification) -> serde_json::Value {
        let mut payload = json!({
            "embeds": [self.create_embed(notification)]
        });

        if let Some(username) = &self.username {
            payload["username"] = json!(username);
        }

        if let Some(avatar_url) = &self.avatar_url {
            payload["avatar_url"] = json!(avatar_url);
        }

        if let Some(role) = &self.mention_role {
            payload["content"] = json!(format!("<@&{}>", role));
        }

        payload
    }
}

#[async_trait]
impl NotifierPlugin for DiscordNotifier {
    fn name(&self) -> &str {
        "Discord Notifier"
    }

    fn plugin_type(&self) -> &str {
        "discord"
    }

    fn description(&self) -> &str {
        "Sends rich notifications via Discord webhooks with embeds"
    }

    async fn send(&self, notification: &Notification) -> Result<NotificationResult> {
        let payload = self.create_webhook_payload(notification);

        let response = self
            .client
            .post(&self.webhook_url)
            .query(&[("wait", "true")])
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(NotificationResult::failed(format!("HTTP {}: {}", status, body)));
        }

        let message: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::Notification(format!("Unreadable Discord response: {}", e)))?;

        Ok(NotificationResult::delivered(
            message.get("id").and_then(|v| v.as_str()).map(str::to_string),
        ))
    }
}
