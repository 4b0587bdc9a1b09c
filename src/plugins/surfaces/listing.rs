use async_trait::async_trait;
use regex::Regex;
use scraper::Html;
use std::collections::HashSet;
use url::Url;

use crate::config::CatalogConfig;
use crate::plugins::traits::DiscoverySurface;
use crate::scraper::{absolutize, selector, PageFetcher};
use crate::utils::error::{AppError, Result};

/// An HTML listing page whose product anchors are matched by a link pattern.
pub struct ListingSurface {
    name: String,
    url: Url,
    link_pattern: Regex,
    fetcher: PageFetcher,
}

impl ListingSurface {
    pub fn new(name: &str, url: Url, link_pattern: Regex, fetcher: PageFetcher) -> Self {
        Self {
            name: name.to_string(),
            url,
            link_pattern,
            fetcher,
        }
    }

    /// One surface per configured `catalog.surfaces` entry, in config order.
    pub fn from_config(catalog: &CatalogConfig, fetcher: &PageFetcher) -> Result<Vec<Self>> {
        let base = Url::parse(&catalog.base_url).map_err(|e| AppError::Validation(format!(
            "Invalid catalog base_url '{}': {}",
            catalog.base_url, e
        )))?;
        let link_pattern = Regex::new(&catalog.product_link_pattern).map_err(|e| AppError::Parse {
            message: format!("Invalid product link pattern: {}", e),
        })?;

        catalog
            .surfaces
            .iter()
            .map(|surface| {
                let url = base.join(&surface.path).map_err(|e| {
                    AppError::Validation(format!("Invalid path for surface {}: {}", surface.name, e))
                })?;
                Ok(Self::new(&surface.name, url, link_pattern.clone(), fetcher.clone()))
            })
            .collect()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Product links found in a listing page body.
    pub fn extract_links(&self, body: &str) -> Result<HashSet<String>> {
        let document = Html::parse_document(body);
        let anchors = selector("a[href]")?;

        Ok(document
            .select(&anchors)
            .filter_map(|a| a.value().attr("href"))
            .filter(|href| self.link_pattern.is_match(href))
            .filter_map(|href| absolutize(&self.url, href))
            .collect())
    }
}

#[async_trait]
impl DiscoverySurface for ListingSurface {
    fn name(&self) -> &str {
        &self.name
    }

    async fn discover(&self) -> Result<HashSet<String>> {
        tracing::info!("Scanning discovery surface: {}", self.name);
        let body = self.fetcher.fetch(self.url.as_str()).await?;
        let links = self.extract_links(&body)?;
        tracing::info!("Found {} products on {}", links.len(), self.name);
        Ok(links)
    }
}
