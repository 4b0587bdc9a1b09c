use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::notifiers::{DiscordNotifier, EmailNotifier, TelegramNotifier};
use super::traits::{NotificationResult, NotifierPlugin};
use crate::config::NotificationsConfig;
use crate::models::Notification;
use crate::utils::error::{AppError, Result};

pub type NotifierPluginBox = Box<dyn NotifierPlugin>;

/// Outcome of fanning one notification out to every registered notifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn merge(&mut self, other: DeliveryReport) {
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

#[derive(Clone)]
pub struct PluginManager {
    notifiers: Arc<RwLock<BTreeMap<String, NotifierPluginBox>>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            notifiers: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Registers every notifier whose credentials are present in `config`.
    pub async fn from_config(config: &NotificationsConfig) -> Result<Self> {
        let manager = Self::new();
        let symbol = config.currency_symbol.as_str();

        if let Some(n) = TelegramNotifier::from_config(&config.telegram, symbol)? {
            manager.register_notifier(Box::new(n)).await?;
        }
        if let Some(n) = DiscordNotifier::from_config(&config.discord, symbol)? {
            manager.register_notifier(Box::new(n)).await?;
        }
        if let Some(n) = EmailNotifier::from_config(&config.email, symbol)? {
            manager.register_notifier(Box::new(n)).await?;
        }

        if manager.list_notifier_types().await.is_empty() {
            tracing::warn!("No notifiers configured; alerts will only be logged");
        }
        Ok(manager)
    }

    pub async fn register_notifier(&self, plugin: NotifierPluginBox) -> Result<()> {
        let plugin_type = plugin.plugin_type().to_string();

        let mut notifiers = self.notifiers.write().await;
        if notifiers.contains_key(&plugin_type) {
            return Err(AppError::Plugin {
                plugin_type,
                message: "notifier already registered".to_string(),
            });
        }
        tracing::info!("Registered notifier: {}", plugin.name());
        notifiers.insert(plugin_type, plugin);
        Ok(())
    }

    pub async fn has_notifier(&self, plugin_type: &str) -> bool {
        let notifiers = self.notifiers.read().await;
        notifiers.contains_key(plugin_type)
    }

    pub async fn list_notifier_types(&self) -> Vec<String> {
        let notifiers = self.notifiers.read().await;
        notifiers.keys().cloned().collect()
    }

    /// Send using one notifier.
    pub async fn send_notification(
        &self,
        plugin_type: &str,
        notification: &Notification,
    ) -> Result<NotificationResult> {
        let notifiers = self.notifiers.read().await;
        match notifiers.get(plugin_type) {
            Some(notifier) => notifier.send(notification).await,
            None => Err(AppError::Plugin {
                plugin_type: plugin_type.to_string(),
                message: "notifier not registered".to_string(),
            }),
        }
    }

    /// Sends to every registered notifier. Failures are logged as missed
    /// alerts and never retried.
    pub async fn broadcast(&self, notification: &Notification) -> DeliveryReport {
        let notifiers = self.notifiers.read().await;
        let mut report = DeliveryReport::default();

        for (plugin_type, notifier) in notifiers.iter() {
            match notifier.send(notification).await {
                Ok(result) if result.success => {
                    tracing::info!(
                        "Notification sent via {} for {}",
                        plugin_type,
                        notification.record.identity
                    );
                    report.delivered += 1;
                }
                Ok(result) => {
                    tracing::warn!(
                        "Missed alert via {} for {}: {}",
                        plugin_type,
                        notification.record.identity,
                        result.error.unwrap_or_default()
                    );
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        "Missed alert via {} for {}: {}",
                        plugin_type,
                        notification.record.identity,
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}
