use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use restock_watcher::config::DatabaseConfig;
use restock_watcher::models::{format_price, state_label, ProductIdentity, ProductState};
use restock_watcher::utils::telemetry;
use restock_watcher::{AppConfig, CycleScheduler, Monitor, SqliteStore, StateStore};

#[derive(Parser)]
#[command(name = "restock-watcher", version, about = "Catalog availability watcher with restock alerts")]
struct Cli {
    /// Extra configuration file layered over config/default.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging for this crate (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single scan cycle and exit
    Run {
        /// Print the cycle summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Scan continuously until interrupted
    Watch,
    /// List tracked products and their states
    Status {
        #[arg(long)]
        state: Option<ProductState>,
    },
    /// Show the transition history of one product
    History { identity: String },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let _log_guard = telemetry::init_tracing(&config.logging, cli.verbose)?;

    match cli.command {
        Command::Run { json } => {
            let scheduler = build_scheduler(&config).await?;
            let summary = scheduler.run_once().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
        }
        Command::Watch => {
            telemetry::init_metrics(&config.metrics)?;
            let scheduler = build_scheduler(&config).await?;
            info!("Starting Restock Watcher...");
            scheduler.run_forever().await?;
            info!("Shutting down...");
        }
        Command::Status { state } => {
            let store = open_store(&config.database).await?;
            print_status(store.as_ref(), state, &config.notifications.currency_symbol).await?;
            store.close().await;
        }
        Command::History { identity } => {
            let store = open_store(&config.database).await?;
            let identity = ProductIdentity::from_catalog_id(&identity)?;
            print_history(store.as_ref(), &identity).await?;
            store.close().await;
        }
        Command::Config => {
            println!("{}", toml::to_string_pretty(&redacted(&config))?);
        }
    }

    Ok(())
}

async fn open_store(database: &DatabaseConfig) -> Result<Arc<SqliteStore>> {
    if let Some(parent) = sqlite_file_path(&database.url).and_then(|p| p.parent().map(Path::to_path_buf)) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(&parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let store = SqliteStore::connect(database)
        .await
        .with_context(|| format!("Failed to open database {}", database.url))?;
    Ok(Arc::new(store))
}

fn sqlite_file_path(url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return None;
    }
    Some(PathBuf::from(path))
}

async fn build_scheduler(config: &AppConfig) -> Result<CycleScheduler> {
    let store = open_store(&config.database).await?;
    let monitor = Monitor::from_config(config, store).await?;
    Ok(CycleScheduler::new(Arc::new(monitor), config.monitor.clone()))
}

async fn print_status(
    store: &dyn StateStore,
    filter: Option<ProductState>,
    currency_symbol: &str,
) -> Result<()> {
    let records: Vec<_> = store
        .records()
        .await?
        .into_iter()
        .filter(|r| filter.is_none_or(|s| r.state == s))
        .collect();

    if records.is_empty() {
        println!("No products tracked yet.");
        return Ok(());
    }

    println!(
        "{:<14} {:<13} {:>12} {:<20} {}",
        "IDENTITY", "STATE", "PRICE", "SINCE", "NAME"
    );
    for record in &records {
        println!(
            "{:<14} {:<13} {:>12} {:<20} {}",
            record.identity.as_str(),
            record.state.as_str(),
            format_price(record.price, currency_symbol),
            record.state_entered_at.format("%Y-%m-%d %H:%M:%S"),
            record.name
        );
    }
    println!("{} products", records.len());
    Ok(())
}

async fn print_history(store: &dyn StateStore, identity: &ProductIdentity) -> Result<()> {
    let Some(record) = store.get(identity).await? else {
        println!("Unknown product: {}", identity);
        return Ok(());
    };

    println!("{} ({})", record.name, record.url);
    for entry in store.transitions_for(identity).await? {
        println!(
            "{}  {:<13} → {:<13} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            state_label(entry.old_state),
            entry.new_state.as_str(),
            if entry.notified { "notified" } else { "" }
        );
    }
    Ok(())
}

fn redacted(config: &AppConfig) -> AppConfig {
    let mask = |v: &Option<String>| v.as_ref().map(|_| "********".to_string());
    let mut config = config.clone();
    config.notifications.telegram.bot_token = mask(&config.notifications.telegram.bot_token);
    config.notifications.email.password = mask(&config.notifications.email.password);
    config.notifications.discord.webhook_url = mask(&config.notifications.discord.webhook_url);
    config
}
