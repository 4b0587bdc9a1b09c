use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ProductIdentity;

/// One surface's fresh read of a product, produced by a validator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub identity: ProductIdentity,
    pub name: String,
    pub url: String,
    /// Price in minor currency units.
    pub price: Option<i64>,
    pub buyable: bool,
    pub source: String,
    pub observed_at: DateTime<Utc>,
}

/// A URL found by one or more discovery surfaces in the current cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    /// Surfaces that listed this URL, in discovery order.
    pub surfaces: Vec<String>,
}

impl Candidate {
    pub fn new(url: impl Into<String>, surface: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            surfaces: vec![surface.into()],
        }
    }

    pub fn primary_surface(&self) -> &str {
        self.surfaces.first().map(String::as_str).unwrap_or("unknown")
    }
}
