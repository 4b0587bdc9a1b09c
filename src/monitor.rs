//! Cycle entry point: discover → validate → reconcile → deliver.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::{Candidate, IdentityResolver, Notification, Observation, TransitionLogEntry};
use crate::plugins::surfaces::ListingSurface;
use crate::plugins::validators::ProductPageValidator;
use crate::plugins::{DeliveryReport, DiscoverySurface, PluginManager, ProductValidator};
use crate::reconciler::{CycleContext, Reconciler};
use crate::scraper::PageFetcher;
use crate::store::StateStore;
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleSummary {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub surfaces_scanned: usize,
    pub surfaces_failed: usize,
    pub candidates: usize,
    pub observed: usize,
    pub rejected: usize,
    pub validation_errors: usize,
    pub hidden: usize,
    pub transitions: Vec<TransitionLogEntry>,
    pub alerts: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    pub total_time_ms: u64,
}

#[derive(Debug, Default)]
struct ValidationTally {
    observations: Vec<Observation>,
    rejected: usize,
    errors: usize,
}

pub struct Monitor {
    surfaces: Vec<Box<dyn DiscoverySurface>>,
    validator: Box<dyn ProductValidator>,
    reconciler: Reconciler,
    notifiers: PluginManager,
    resolver: IdentityResolver,
    request_delay: Duration,
}

impl Monitor {
    pub fn new(
        surfaces: Vec<Box<dyn DiscoverySurface>>,
        validator: Box<dyn ProductValidator>,
        store: Arc<dyn StateStore>,
        notifiers: PluginManager,
        resolver: IdentityResolver,
        request_delay: Duration,
    ) -> Self {
        Self {
            surfaces,
            validator,
            reconciler: Reconciler::new(store),
            notifiers,
            resolver,
            request_delay,
        }
    }

    /// Wires the bundled listing surfaces, page validator and notifiers.
    pub async fn from_config(config: &AppConfig, store: Arc<dyn StateStore>) -> Result<Self> {
        let fetcher = PageFetcher::new(&config.scraper)?;

        let surfaces = ListingSurface::from_config(&config.catalog, &fetcher)?
            .into_iter()
            .map(|s| Box::new(s) as Box<dyn DiscoverySurface>)
            .collect();
        let validator = ProductPageValidator::from_config(&config.catalog, &fetcher)?;
        let notifiers = PluginManager::from_config(&config.notifications).await?;
        let resolver = IdentityResolver::new(&config.catalog.product_id_pattern)?;

        Ok(Self::new(
            surfaces,
            Box::new(validator),
            store,
            notifiers,
            resolver,
            Duration::from_millis(config.scraper.request_delay_ms),
        ))
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        self.reconciler.store()
    }

    pub fn notifiers(&self) -> &PluginManager {
        &self.notifiers
    }

    /// Runs one complete cycle. Every entry point (single-shot, interval,
    /// cron) goes through here.
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let start_time = Instant::now();
        let result = self.execute_cycle(start_time).await;

        metrics::histogram!("restock_cycle_duration_seconds").record(start_time.elapsed().as_secs_f64());
        match &result {
            Ok(summary) => {
                metrics::counter!("restock_cycles_total").increment(1);
                metrics::counter!("restock_transitions_total").increment(summary.transitions.len() as u64);
                metrics::counter!("restock_notifications_sent_total").increment(summary.notifications_sent as u64);
                metrics::counter!("restock_notifications_failed_total").increment(summary.notifications_failed as u64);
                metrics::gauge!("restock_products_observed").set(summary.observed as f64);
            }
            Err(e) => {
                metrics::counter!("restock_cycles_failed_total").increment(1);
                tracing::error!("Scan cycle failed: {}", e);
            }
        }
        result
    }

    async fn execute_cycle(&self, start_time: Instant) -> Result<CycleSummary> {
        let mut ctx = CycleContext::new();
        tracing::info!("Starting scan cycle {}", ctx.cycle_id);

        let surfaces_failed = self.discover(&mut ctx).await;
        if !self.surfaces.is_empty() && surfaces_failed == self.surfaces.len() {
            return Err(AppError::CycleAborted(format!(
                "all {} discovery surfaces failed",
                surfaces_failed
            )));
        }
        tracing::info!("Total unique candidates discovered: {}", ctx.candidates.len());

        let tally = self.validate(&mut ctx).await;
        let outcome = self.reconciler.reconcile(&ctx, tally.observations).await?;

        let delivery = self.deliver(&outcome.notifications).await;

        let summary = CycleSummary {
            cycle_id: ctx.cycle_id,
            started_at: ctx.started_at,
            surfaces_scanned: self.surfaces.len(),
            surfaces_failed,
            candidates: ctx.candidates.len(),
            observed: outcome.observed,
            rejected: tally.rejected,
            validation_errors: tally.errors,
            hidden: outcome.hidden,
            transitions: outcome.transitions,
            alerts: outcome.notifications.len(),
            notifications_sent: delivery.delivered,
            notifications_failed: delivery.failed,
            total_time_ms: start_time.elapsed().as_millis() as u64,
        };

        tracing::info!(
            "Scan complete. {} observed, {} transitions, {} alerts ({} sent, {} missed)",
            summary.observed,
            summary.transitions.len(),
            summary.alerts,
            summary.notifications_sent,
            summary.notifications_failed
        );
        Ok(summary)
    }

    /// Collects candidates from every surface. Returns how many surfaces failed.
    async fn discover(&self, ctx: &mut CycleContext) -> usize {
        let results = join_all(
            self.surfaces
                .iter()
                .map(|surface| async move { (surface.name(), surface.discover().await) }),
        )
        .await;

        let mut failed = 0;
        for (name, result) in results {
            match result {
                Ok(urls) => {
                    let mut urls: Vec<String> = urls.into_iter().collect();
                    urls.sort();
                    for url in urls {
                        ctx.add_candidate(&url, name);
                    }
                }
                Err(e) => {
                    tracing::warn!("Error scanning {}: {}", name, e);
                    failed += 1;
                }
            }
        }
        failed
    }

    async fn validate(&self, ctx: &mut CycleContext) -> ValidationTally {
        let mut tally = ValidationTally::default();
        let candidates: Vec<_> = ctx.candidates.values().cloned().collect();

        for (i, candidate) in candidates.iter().enumerate() {
            if i > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }

            match self.validator.validate(candidate).await {
                Ok(Some(observation)) => {
                    tracing::debug!(
                        "Validated {} ({}): buyable={}",
                        observation.identity,
                        observation.name,
                        observation.buyable
                    );
                    tally.observations.push(observation);
                }
                Ok(None) => {
                    tracing::debug!("Rejected candidate {}", candidate.url);
                    tally.rejected += 1;
                    self.leave_untouched(ctx, candidate);
                }
                Err(e) => {
                    tracing::warn!("Error validating product {}: {}", candidate.url, e);
                    tally.errors += 1;
                    self.leave_untouched(ctx, candidate);
                }
            }
        }

        tally
    }

    /// A listed candidate without a usable observation keeps its stored
    /// state. Only products no surface listed can go `HIDDEN`.
    fn leave_untouched(&self, ctx: &mut CycleContext, candidate: &Candidate) {
        match self.resolver.resolve(&candidate.url) {
            Ok(identity) => {
                ctx.unresolved.insert(identity);
            }
            Err(e) => tracing::debug!("No identity for {}: {}", candidate.url, e),
        }
    }

    async fn deliver(&self, notifications: &[Notification]) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for notification in notifications {
            tracing::info!(
                "{} {}: {} ({})",
                notification.kind.emoji(),
                notification.kind.headline(),
                notification.record.name,
                notification.record.url
            );
            report.merge(self.notifiers.broadcast(notification).await);
        }
        report
    }
}
