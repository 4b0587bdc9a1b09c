//! Lifecycle transition table.
//!
//! [`decide`] is the only place that knows when a product deserves an alert:
//! a move into `BUYABLE` from `OUT_OF_STOCK` or `HIDDEN`. First sightings and
//! everything leaving `BUYABLE` stay silent.

use serde::{Deserialize, Serialize};

use crate::models::{AlertKind, ProductState};

/// What a cycle learned about a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sighting {
    Buyable,
    Unbuyable,
    /// Known product that no surface reported this cycle.
    Missing,
}

impl From<Option<bool>> for Sighting {
    fn from(observed_buyable: Option<bool>) -> Self {
        match observed_buyable {
            Some(true) => Sighting::Buyable,
            Some(false) => Sighting::Unbuyable,
            None => Sighting::Missing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub new_state: ProductState,
    pub notify: bool,
    pub alert: Option<AlertKind>,
}

impl Decision {
    fn silent(new_state: ProductState) -> Self {
        Self {
            new_state,
            notify: false,
            alert: None,
        }
    }

    fn alert(kind: AlertKind) -> Self {
        Self {
            new_state: ProductState::Buyable,
            notify: true,
            alert: Some(kind),
        }
    }
}

pub fn decide(old_state: Option<ProductState>, sighting: Sighting) -> Decision {
    use ProductState::*;

    match (old_state, sighting) {
        // First sighting never alerts. A stored NEW is not written by this
        // crate and is read as a first sighting.
        (None | Some(New), Sighting::Buyable) => Decision::silent(Buyable),
        (None | Some(New), Sighting::Unbuyable) => Decision::silent(OutOfStock),
        (None | Some(New), Sighting::Missing) => Decision::silent(Hidden),

        (Some(Buyable), Sighting::Buyable) => Decision::silent(Buyable),
        (Some(Buyable), Sighting::Unbuyable) => Decision::silent(OutOfStock),
        (Some(Buyable), Sighting::Missing) => Decision::silent(Hidden),

        (Some(OutOfStock), Sighting::Buyable) => Decision::alert(AlertKind::Restock),
        (Some(OutOfStock), Sighting::Unbuyable) => Decision::silent(OutOfStock),
        (Some(OutOfStock), Sighting::Missing) => Decision::silent(Hidden),

        (Some(Hidden), Sighting::Buyable) => Decision::alert(AlertKind::Reappearance),
        (Some(Hidden), Sighting::Unbuyable) => Decision::silent(OutOfStock),
        (Some(Hidden), Sighting::Missing) => Decision::silent(Hidden),
    }
}
