use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::Notification;
use crate::utils::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl NotificationResult {
    pub fn delivered(message_id: Option<String>) -> Self {
        Self {
            success: true,
            message_id,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// Delivery channel for restock alerts (Telegram, Discord, email).
///
/// Delivery is best effort: the cycle's state is already committed when a
/// notifier runs, and a failed send is never retried.
#[async_trait]
pub trait NotifierPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn plugin_type(&self) -> &str;
    fn description(&self) -> &str;

    async fn send(&self, notification: &Notification) -> Result<NotificationResult>;
}
