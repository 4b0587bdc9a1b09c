use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LoggingConfig, MetricsConfig};
use crate::utils::error::{AppError, Result};

pub const DEFAULT_FILTER: &str = "restock_watcher=info";

fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "restock_watcher=debug" } else { DEFAULT_FILTER };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Installs the global subscriber. Console output always; a daily rolling file
/// when `logging.directory` is set. Keep the returned guard alive for the
/// lifetime of the process so buffered file output is flushed.
pub fn init_tracing(config: &LoggingConfig, verbose: bool) -> Result<Option<WorkerGuard>> {
    let registry = tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(fmt::layer());

    match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "restock-watcher.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .try_init()
                .map_err(|e| AppError::Internal(format!("Failed to install subscriber: {}", e)))?;
            Ok(Some(guard))
        }
        None => {
            registry
                .try_init()
                .map_err(|e| AppError::Internal(format!("Failed to install subscriber: {}", e)))?;
            Ok(None)
        }
    }
}

/// Starts the Prometheus scrape endpoint when enabled. Without it the
/// `metrics` macros are no-ops.
pub fn init_metrics(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| AppError::Internal(format!("Failed to start metrics exporter: {}", e)))?;

    tracing::info!("Prometheus metrics listening on {}", addr);
    Ok(())
}
