use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod alert;
pub mod identity;
pub mod observation;
pub mod product_record;
pub mod transition;

// Re-exports for convenience
pub use alert::*;
pub use identity::*;
pub use observation::*;
pub use product_record::*;
pub use transition::*;

/// Lifecycle state of a tracked product.
///
/// `New` exists for display and for decoding foreign rows; the reconciler never
/// persists it, first sightings decay to `Buyable` or `OutOfStock` in the same
/// cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "TEXT")]
pub enum ProductState {
    #[sqlx(rename = "NEW")]
    New,
    #[sqlx(rename = "BUYABLE")]
    Buyable,
    #[sqlx(rename = "OUT_OF_STOCK")]
    OutOfStock,
    #[sqlx(rename = "HIDDEN")]
    Hidden,
}

impl ProductState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductState::New => "NEW",
            ProductState::Buyable => "BUYABLE",
            ProductState::OutOfStock => "OUT_OF_STOCK",
            ProductState::Hidden => "HIDDEN",
        }
    }
}

impl fmt::Display for ProductState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEW" => Ok(ProductState::New),
            "BUYABLE" => Ok(ProductState::Buyable),
            "OUT_OF_STOCK" => Ok(ProductState::OutOfStock),
            "HIDDEN" => Ok(ProductState::Hidden),
            other => Err(format!("Unknown product state: {}", other)),
        }
    }
}

/// Label for an optional previous state, `NEW` standing in for a first sighting.
pub fn state_label(state: Option<ProductState>) -> &'static str {
    state.map(|s| s.as_str()).unwrap_or(ProductState::New.as_str())
}

/// Identifier for one scan cycle, recorded against every transition it writes.
pub fn generate_cycle_id() -> Uuid {
    Uuid::new_v4()
}
