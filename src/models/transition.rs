use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::{ProductIdentity, ProductState};

/// Append-only audit entry, written once per state change.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct TransitionLogEntry {
    pub identity: ProductIdentity,
    /// `None` for a first sighting.
    pub old_state: Option<ProductState>,
    pub new_state: ProductState,
    pub notified: bool,
    pub timestamp: DateTime<Utc>,
    pub cycle_id: Uuid,
}

impl TransitionLogEntry {
    pub fn is_first_sighting(&self) -> bool {
        self.old_state.is_none()
    }
}
