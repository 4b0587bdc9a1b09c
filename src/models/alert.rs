use serde::{Deserialize, Serialize};

use crate::models::{Observation, ProductRecord, ProductState};

/// Why an alert is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    /// OUT_OF_STOCK → BUYABLE
    Restock,
    /// HIDDEN → BUYABLE
    Reappearance,
}

impl AlertKind {
    pub fn headline(&self) -> &'static str {
        match self {
            AlertKind::Restock => "RESTOCK ALERT",
            AlertKind::Reappearance => "BACK IN CATALOG",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            AlertKind::Restock => "🔄",
            AlertKind::Reappearance => "🆕",
        }
    }
}

/// An entry of a cycle's notification batch, built only after the cycle's
/// state has been committed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    /// The record as committed, always in `BUYABLE`.
    pub record: ProductRecord,
    pub observation: Observation,
    pub previous_state: ProductState,
    pub kind: AlertKind,
}

impl Notification {
    /// Formats a minor-unit price as `<symbol><major>.<minor>`.
    pub fn formatted_price(&self, currency_symbol: &str) -> String {
        format_price(self.record.price, currency_symbol)
    }
}

pub fn format_price(price: Option<i64>, currency_symbol: &str) -> String {
    match price {
        Some(minor) => format!("{}{}", currency_symbol, rust_decimal::Decimal::new(minor, 2)),
        None => "N/A".to_string(),
    }
}
