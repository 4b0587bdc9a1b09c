use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use url::Url;

use crate::config::ScraperConfig;
use crate::utils::error::{AppError, Result};

/// Shared HTTP client for listing and product pages.
///
/// Transient failures (timeouts, connection errors, 5xx, 429) are retried with
/// exponential backoff; anything else fails immediately.
#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
    retry_attempts: u32,
    retry_delay_ms: u64,
}

impl PageFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.request_timeout))
            .build()?;

        Ok(Self {
            client,
            retry_attempts: config.retry_attempts,
            retry_delay_ms: config.retry_delay_ms.max(1),
        })
    }

    pub async fn fetch(&self, url: &str) -> Result<String> {
        let strategy = ExponentialBackoff::from_millis(self.retry_delay_ms)
            .max_delay(Duration::from_secs(30))
            .map(jitter)
            .take(self.retry_attempts as usize);

        let started = std::time::Instant::now();
        let result = RetryIf::spawn(strategy, || self.fetch_once(url), |e: &AppError| {
            let retry = e.is_retryable();
            if retry {
                tracing::debug!("Retrying {} after: {}", url, e);
            }
            retry
        })
        .await;

        metrics::histogram!("restock_fetch_duration_seconds").record(started.elapsed().as_secs_f64());
        if result.is_err() {
            metrics::counter!("restock_fetch_failures_total").increment(1);
        }
        result
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Builds a CSS selector, mapping parse failures into [`AppError::Parse`].
pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| AppError::Parse {
        message: format!("Invalid selector '{}': {:?}", css, e),
    })
}

/// Normalized text content of the first element matching `css`.
pub fn first_text(document: &Html, css: &str) -> Result<Option<String>> {
    let sel = selector(css)?;
    Ok(document
        .select(&sel)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty()))
}

pub fn exists(document: &Html, css: &str) -> Result<bool> {
    let sel = selector(css)?;
    Ok(document.select(&sel).next().is_some())
}

/// Resolves `href` against `base`, returning `None` for unusable links.
pub fn absolutize(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}
