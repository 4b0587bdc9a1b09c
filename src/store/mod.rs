//! Durable product state and the transition log.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::models::{ProductIdentity, ProductRecord, TransitionLogEntry};
use crate::utils::error::Result;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Mutation of one product within a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordChange {
    pub record: ProductRecord,
    /// Present only when the lifecycle state changed.
    pub transition: Option<TransitionLogEntry>,
}

/// Everything one cycle writes, applied with [`StateStore::commit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleChanges {
    pub changes: Vec<RecordChange>,
}

impl CycleChanges {
    pub fn push(&mut self, record: ProductRecord, transition: Option<TransitionLogEntry>) {
        self.changes.push(RecordChange { record, transition });
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &TransitionLogEntry> {
        self.changes.iter().filter_map(|c| c.transition.as_ref())
    }
}

/// Storage backend for lifecycle state.
///
/// Only the reconciler writes, once per cycle, and cycles never overlap, so
/// implementations need no cross-cycle locking.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, identity: &ProductIdentity) -> Result<Option<ProductRecord>>;

    /// Insert or overwrite the record for `record.identity`.
    async fn upsert(&self, record: &ProductRecord) -> Result<()>;

    /// Append to the transition log. Entries are never rewritten.
    async fn append_transition(&self, entry: &TransitionLogEntry) -> Result<()>;

    async fn all_known_identities(&self) -> Result<HashSet<ProductIdentity>>;

    /// Applies a whole cycle's writes.
    ///
    /// Backends with transactions override this to commit all-or-nothing. The
    /// default writes each record before its transition, so a crash part way
    /// through is repaired by re-running the cycle: already-applied identities
    /// see `new_state == old_state` and produce neither a transition nor an
    /// alert.
    async fn commit(&self, changes: &CycleChanges) -> Result<()> {
        for change in &changes.changes {
            self.upsert(&change.record).await?;
            if let Some(entry) = &change.transition {
                self.append_transition(entry).await?;
            }
        }
        Ok(())
    }

    /// All records ordered by identity.
    async fn records(&self) -> Result<Vec<ProductRecord>>;

    /// Transition history of one product, oldest first.
    async fn transitions_for(&self, identity: &ProductIdentity) -> Result<Vec<TransitionLogEntry>>;
}
