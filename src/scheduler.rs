use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::MonitorConfig;
use crate::monitor::{CycleSummary, Monitor};
use crate::utils::error::{AppError, Result};

/// Drives [`Monitor::run_cycle`] once, on a fixed interval, or on a cron
/// schedule. Cycles never overlap.
pub struct CycleScheduler {
    monitor: Arc<Monitor>,
    config: MonitorConfig,
}

impl CycleScheduler {
    pub fn new(monitor: Arc<Monitor>, config: MonitorConfig) -> Self {
        Self { monitor, config }
    }

    pub async fn run_once(&self) -> Result<CycleSummary> {
        self.monitor.run_cycle().await
    }

    /// Runs until Ctrl-C, using cron mode when `monitor.cron` is set.
    pub async fn run_forever(&self) -> Result<()> {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        match self.config.cron.clone() {
            Some(expr) => self.run_cron(&expr, shutdown).await,
            None => self.run_interval(shutdown).await.map(|_| ()),
        }
    }

    /// Back-to-back cycles separated by `interval_seconds`, or by
    /// `error_backoff_seconds` after a failed cycle. Returns the number of
    /// cycles run once `shutdown` resolves.
    pub async fn run_interval<F>(&self, shutdown: F) -> Result<usize>
    where
        F: Future<Output = ()>,
    {
        let interval = Duration::from_secs(self.config.interval_seconds);
        let backoff = Duration::from_secs(self.config.error_backoff_seconds);
        tracing::info!("Starting continuous monitoring (interval: {}s)", interval.as_secs());

        tokio::pin!(shutdown);
        let mut cycles = 0;

        loop {
            let delay = match self.monitor.run_cycle().await {
                Ok(_) => interval,
                Err(e) => {
                    tracing::warn!("Cycle failed, retrying in {}s: {}", backoff.as_secs(), e);
                    backoff
                }
            };
            cycles += 1;

            tracing::info!("Sleeping for {} seconds...", delay.as_secs());
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Monitoring stopped after {} cycles", cycles);
                    return Ok(cycles);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Cron-triggered cycles. A tick that fires while the previous cycle is
    /// still running is skipped.
    pub async fn run_cron<F>(&self, expr: &str, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut scheduler = JobScheduler::new().await.map_err(scheduler_error)?;
        let monitor = Arc::clone(&self.monitor);
        let in_flight = Arc::new(Mutex::new(()));

        let job = Job::new_async(expr, move |_uuid, _l| {
            let monitor = Arc::clone(&monitor);
            let in_flight = Arc::clone(&in_flight);

            Box::pin(async move {
                let Ok(_guard) = in_flight.try_lock() else {
                    tracing::warn!("Previous cycle still running, skipping scheduled tick");
                    return;
                };
                // Failures are logged and counted inside run_cycle
                let _ = monitor.run_cycle().await;
            })
        })
        .map_err(scheduler_error)?;

        scheduler.add(job).await.map_err(scheduler_error)?;
        scheduler.start().await.map_err(scheduler_error)?;
        tracing::info!("Cycle scheduler started with cron: {}", expr);

        shutdown.await;

        scheduler.shutdown().await.map_err(scheduler_error)?;
        tracing::info!("Cycle scheduler shutdown");
        Ok(())
    }
}

fn scheduler_error(e: tokio_cron_scheduler::JobSchedulerError) -> AppError {
    AppError::Internal(format!("Scheduler error: {}", e))
}
