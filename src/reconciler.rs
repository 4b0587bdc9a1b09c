//! One reconciliation cycle: merge, diff against the store, apply.
//!
//! The three phases always run in that order. All writes of a cycle reach the
//! store through a single [`StateStore::commit`], and the notification batch is
//! handed back only after that commit succeeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{
    generate_cycle_id, state_label, Candidate, Notification, Observation, ProductIdentity,
    ProductRecord, TransitionLogEntry,
};
use crate::policy::{decide, Sighting};
use crate::store::{CycleChanges, StateStore};
use crate::utils::error::Result;

/// Values scoped to a single cycle, passed explicitly instead of being cached
/// between runs.
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Candidates discovered this cycle, keyed by URL.
    pub candidates: BTreeMap<String, Candidate>,
    /// Identities discovered this cycle that could not be validated. They are
    /// neither observed nor missing and keep their stored state.
    pub unresolved: HashSet<ProductIdentity>,
}

impl CycleContext {
    pub fn new() -> Self {
        Self {
            cycle_id: generate_cycle_id(),
            started_at: Utc::now(),
            candidates: BTreeMap::new(),
            unresolved: HashSet::new(),
        }
    }

    /// Records that `surface` listed `url`.
    pub fn add_candidate(&mut self, url: &str, surface: &str) {
        self.candidates
            .entry(url.to_string())
            .and_modify(|c| {
                if !c.surfaces.iter().any(|s| s == surface) {
                    c.surfaces.push(surface.to_string());
                }
            })
            .or_insert_with(|| Candidate::new(url, surface));
    }
}

impl Default for CycleContext {
    fn default() -> Self {
        Self::new()
    }
}

/// All observations of one identity within a cycle, folded together.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedObservation {
    /// Latest observation, with `buyable` OR-ed over every duplicate and the
    /// most recently extracted price.
    pub observation: Observation,
    pub surfaces: BTreeSet<String>,
    price_observed_at: Option<DateTime<Utc>>,
}

impl MergedObservation {
    fn new(observation: Observation) -> Self {
        let price_observed_at = observation.price.map(|_| observation.observed_at);
        let mut surfaces = BTreeSet::new();
        surfaces.insert(observation.source.clone());
        Self {
            observation,
            surfaces,
            price_observed_at,
        }
    }

    fn absorb(&mut self, next: Observation) {
        let buyable = self.observation.buyable || next.buyable;
        self.surfaces.insert(next.source.clone());

        let (price, price_observed_at) = match (self.price_observed_at, next.price) {
            (None, Some(p)) => (Some(p), Some(next.observed_at)),
            (Some(at), Some(p)) if next.observed_at >= at => (Some(p), Some(next.observed_at)),
            _ => (self.observation.price, self.price_observed_at),
        };

        if next.observed_at >= self.observation.observed_at {
            self.observation = next;
        }
        self.observation.buyable = buyable;
        self.observation.price = price;
        self.price_observed_at = price_observed_at;
    }
}

/// Deduplicates a cycle's observations by identity.
///
/// A product counts as buyable if any surface reports it buyable.
pub fn merge_observations(
    observations: impl IntoIterator<Item = Observation>,
) -> BTreeMap<ProductIdentity, MergedObservation> {
    let mut merged: BTreeMap<ProductIdentity, MergedObservation> = BTreeMap::new();
    for observation in observations {
        match merged.get_mut(&observation.identity) {
            Some(existing) => existing.absorb(observation),
            None => {
                merged.insert(observation.identity.clone(), MergedObservation::new(observation));
            }
        }
    }
    merged
}

/// What a committed cycle did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub cycle_id: Uuid,
    pub observed: usize,
    pub hidden: usize,
    pub unresolved: usize,
    pub records_written: usize,
    pub transitions: Vec<TransitionLogEntry>,
    pub notifications: Vec<Notification>,
}

pub struct Reconciler {
    store: Arc<dyn StateStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Runs one cycle against the store.
    ///
    /// Any store error aborts the cycle before anything is committed; the
    /// caller retries the whole cycle later.
    pub async fn reconcile(
        &self,
        ctx: &CycleContext,
        observations: Vec<Observation>,
    ) -> Result<CycleOutcome> {
        // Merge
        let merged = merge_observations(observations);

        // Diff against store
        let known = self.store.all_known_identities().await?;
        let mut missing: Vec<ProductIdentity> = known
            .into_iter()
            .filter(|id| !merged.contains_key(id) && !ctx.unresolved.contains(id))
            .collect();
        missing.sort();

        let inputs = merged
            .iter()
            .map(|(id, m)| (id.clone(), Some(m)))
            .chain(missing.into_iter().map(|id| (id, None)));

        // Apply
        let mut changes = CycleChanges::default();
        let mut notifications = Vec::new();
        let mut hidden = 0;

        for (identity, sighting) in inputs {
            let existing = self.store.get(&identity).await?;
            let old_state = existing.as_ref().map(|r| r.state);
            let decision = decide(
                old_state,
                Sighting::from(sighting.map(|m| m.observation.buyable)),
            );

            let record = match (&existing, sighting) {
                (None, Some(m)) => ProductRecord::first_sighting(&m.observation, decision.new_state),
                (Some(r), Some(m)) => r.observed(&m.observation, decision.new_state),
                (Some(r), None) => r.unobserved(decision.new_state, ctx.started_at),
                (None, None) => {
                    tracing::warn!("Known identity {} vanished from the store mid-cycle", identity);
                    continue;
                }
            };

            let transition = (old_state != Some(record.state)).then(|| TransitionLogEntry {
                identity: identity.clone(),
                old_state,
                new_state: record.state,
                notified: decision.notify,
                timestamp: record.state_entered_at,
                cycle_id: ctx.cycle_id,
            });

            if let Some(entry) = &transition {
                tracing::info!(
                    "State transition: {} ({}) {} → {}{}",
                    record.name,
                    identity,
                    state_label(entry.old_state),
                    entry.new_state,
                    if entry.notified { " [alert]" } else { "" }
                );
                if sighting.is_none() {
                    hidden += 1;
                }
            }

            if let (Some(kind), Some(m), Some(prev)) = (decision.alert, sighting, old_state) {
                notifications.push(Notification {
                    record: record.clone(),
                    observation: m.observation.clone(),
                    previous_state: prev,
                    kind,
                });
            }

            if existing.as_ref() != Some(&record) {
                changes.push(record, transition);
            }
        }

        let transitions: Vec<TransitionLogEntry> = changes.transitions().cloned().collect();
        let records_written = changes.changes.len();

        self.store.commit(&changes).await?;

        tracing::debug!(
            "Cycle {} committed: {} observed, {} hidden, {} transitions, {} alerts",
            ctx.cycle_id,
            merged.len(),
            hidden,
            transitions.len(),
            notifications.len()
        );

        Ok(CycleOutcome {
            cycle_id: ctx.cycle_id,
            observed: merged.len(),
            hidden,
            unresolved: ctx.unresolved.len(),
            records_written,
            transitions,
            notifications,
        })
    }
}
