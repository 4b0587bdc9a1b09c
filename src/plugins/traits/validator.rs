use async_trait::async_trait;

use crate::models::{Candidate, Observation};
use crate::utils::error::Result;

/// Turns a candidate URL into an observation by reading its product page.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductValidator: Send + Sync {
    /// `Ok(None)` rejects the candidate (wrong brand, not a product page).
    /// `Err` means the page could not be read this cycle.
    async fn validate(&self, candidate: &Candidate) -> Result<Option<Observation>>;
}
