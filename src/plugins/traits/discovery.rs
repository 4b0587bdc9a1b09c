use async_trait::async_trait;
use std::collections::HashSet;

use crate::utils::error::Result;

/// A listing page (or API) that yields candidate product URLs.
#[async_trait]
pub trait DiscoverySurface: Send + Sync {
    /// Stable label recorded as the `source` of observations.
    fn name(&self) -> &str;

    /// Absolute candidate URLs currently listed. An error means the surface was
    /// unavailable this cycle, not that it is empty.
    async fn discover(&self) -> Result<HashSet<String>>;
}
