use config::{Config, ConfigError, Environment, File};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub catalog: CatalogConfig,
    pub scraper: ScraperConfig,
    pub monitor: MonitorConfig,
    pub notifications: NotificationsConfig,
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub base_url: String,
    pub surfaces: Vec<SurfaceConfig>,
    /// Regex an anchor's href must match to count as a product candidate.
    pub product_link_pattern: String,
    /// Regex whose first capture group is the catalog's product id.
    pub product_id_pattern: String,
    pub brand_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurfaceConfig {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub user_agent: String,
    /// Seconds.
    pub request_timeout: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Pause between product page fetches.
    pub request_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub interval_seconds: u64,
    /// Optional cron expression; takes precedence over `interval_seconds`.
    #[serde(default)]
    pub cron: Option<String>,
    pub error_backoff_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub currency_symbol: String,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    #[serde(default = "default_telegram_api")]
    pub api_base: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub webhook_url: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub mention_role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
    pub from_name: Option<String>,
    pub to_address: Option<String>,
    #[serde(default = "default_true")]
    pub use_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for daily rolling log files; console only when unset.
    pub directory: Option<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: default_telegram_api(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: None,
            username: None,
            password: None,
            from_address: None,
            from_name: None,
            to_address: None,
            use_tls: true,
        }
    }
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Layered load: defaults, run mode, local overrides, an explicit file,
    /// then `RESTOCK__*` environment variables.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }

        let s = builder
            .add_source(Environment::with_prefix("RESTOCK").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Conventional Telegram variables as a fallback
        if config.notifications.telegram.bot_token.is_none() {
            config.notifications.telegram.bot_token = env::var("TELEGRAM_BOT_TOKEN").ok();
        }
        if config.notifications.telegram.chat_id.is_none() {
            config.notifications.telegram.chat_id = env::var("TELEGRAM_CHAT_ID").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Message("Database url cannot be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message("Database max_connections must be greater than 0".into()));
        }

        if Url::parse(&self.catalog.base_url).is_err() {
            return Err(ConfigError::Message("Invalid catalog base_url format".into()));
        }

        if self.catalog.surfaces.is_empty() {
            return Err(ConfigError::Message("At least one catalog surface must be configured".into()));
        }

        for surface in &self.catalog.surfaces {
            if surface.name.trim().is_empty() {
                return Err(ConfigError::Message("Catalog surface name cannot be empty".into()));
            }
        }

        if Regex::new(&self.catalog.product_link_pattern).is_err() {
            return Err(ConfigError::Message("Invalid regex in catalog.product_link_pattern".into()));
        }

        match Regex::new(&self.catalog.product_id_pattern) {
            Ok(re) if re.captures_len() >= 2 => {}
            _ => {
                return Err(ConfigError::Message(
                    "catalog.product_id_pattern must be a regex with a capture group".into(),
                ));
            }
        }

        if self.scraper.request_timeout == 0 {
            return Err(ConfigError::Message("Scraper request_timeout must be greater than 0".into()));
        }

        if self.monitor.interval_seconds == 0 {
            return Err(ConfigError::Message("Monitor interval_seconds must be greater than 0".into()));
        }

        if let Some(cron) = &self.monitor.cron {
            if !Self::is_valid_cron(cron) {
                return Err(ConfigError::Message("Invalid cron expression in monitor.cron".into()));
            }
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        Ok(())
    }

    /// Shape check for the six-field (seconds first) expressions the cron
    /// scheduler accepts.
    pub fn is_valid_cron(cron_expr: &str) -> bool {
        let parts: Vec<&str> = cron_expr.split_whitespace().collect();
        if parts.len() != 6 {
            return false;
        }

        parts.iter().all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_digit() || matches!(c, '*' | '-' | ',' | '/' | '?'))
        })
    }
}
