use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use super::{CycleChanges, StateStore};
use crate::models::{ProductIdentity, ProductRecord, TransitionLogEntry};
use crate::utils::error::Result;

#[derive(Debug, Default)]
struct MemoryState {
    products: HashMap<ProductIdentity, ProductRecord>,
    transitions: Vec<TransitionLogEntry>,
}

/// Non-durable store for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn transition_count(&self) -> usize {
        self.state.read().await.transitions.len()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, identity: &ProductIdentity) -> Result<Option<ProductRecord>> {
        Ok(self.state.read().await.products.get(identity).cloned())
    }

    async fn upsert(&self, record: &ProductRecord) -> Result<()> {
        let mut state = self.state.write().await;
        state.products.insert(record.identity.clone(), record.clone());
        Ok(())
    }

    async fn append_transition(&self, entry: &TransitionLogEntry) -> Result<()> {
        self.state.write().await.transitions.push(entry.clone());
        Ok(())
    }

    async fn all_known_identities(&self) -> Result<HashSet<ProductIdentity>> {
        Ok(self.state.read().await.products.keys().cloned().collect())
    }

    async fn commit(&self, changes: &CycleChanges) -> Result<()> {
        // One write guard for the whole cycle, readers never see half of it.
        let mut state = self.state.write().await;
        for change in &changes.changes {
            state
                .products
                .insert(change.record.identity.clone(), change.record.clone());
            if let Some(entry) = &change.transition {
                state.transitions.push(entry.clone());
            }
        }
        Ok(())
    }

    async fn records(&self) -> Result<Vec<ProductRecord>> {
        let state = self.state.read().await;
        let mut records: Vec<_> = state.products.values().cloned().collect();
        records.sort_by(|a, b| a.identity.cmp(&b.identity));
        Ok(records)
    }

    async fn transitions_for(&self, identity: &ProductIdentity) -> Result<Vec<TransitionLogEntry>> {
        let state = self.state.read().await;
        Ok(state
            .transitions
            .iter()
            .filter(|t| &t.identity == identity)
            .cloned()
            .collect())
    }
}
