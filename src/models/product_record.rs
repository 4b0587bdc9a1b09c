use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{Observation, ProductIdentity, ProductState};

/// Durable lifecycle record, one per identity, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ProductRecord {
    pub identity: ProductIdentity,
    pub name: String,
    pub url: String,
    pub price: Option<i64>,
    pub state: ProductState,
    pub state_entered_at: DateTime<Utc>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl ProductRecord {
    /// Record for an identity seen for the first time.
    pub fn first_sighting(observation: &Observation, state: ProductState) -> Self {
        Self {
            identity: observation.identity.clone(),
            name: observation.name.clone(),
            url: observation.url.clone(),
            price: observation.price,
            state,
            state_entered_at: observation.observed_at,
            first_seen_at: observation.observed_at,
            last_seen_at: observation.observed_at,
        }
    }

    /// Copy of this record updated from a fresh observation.
    ///
    /// A missing price keeps the last known one and `last_seen_at` never moves
    /// backwards.
    pub fn observed(&self, observation: &Observation, state: ProductState) -> Self {
        let mut next = self.clone();
        next.name = observation.name.clone();
        next.url = observation.url.clone();
        if observation.price.is_some() {
            next.price = observation.price;
        }
        next.last_seen_at = self.last_seen_at.max(observation.observed_at);
        next.enter(state, observation.observed_at);
        next
    }

    /// Copy of this record for a cycle in which it was not observed.
    pub fn unobserved(&self, state: ProductState, at: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.enter(state, at);
        next
    }

    fn enter(&mut self, state: ProductState, at: DateTime<Utc>) {
        if self.state != state {
            self.state = state;
            self.state_entered_at = at;
        }
    }
}
