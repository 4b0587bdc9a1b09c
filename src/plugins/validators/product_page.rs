use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use scraper::Html;
use std::str::FromStr;

use crate::config::CatalogConfig;
use crate::models::{Candidate, IdentityResolver, Observation};
use crate::plugins::traits::ProductValidator;
use crate::scraper::{exists, first_text, selector, PageFetcher};
use crate::utils::error::Result;

const NAME_SELECTORS: &[&str] = &["h1.prod-name", "span[itemprop=name]"];
const BRAND_SELECTOR: &str = "span[itemprop=brand]";
const PRICE_SELECTORS: &[&str] = &["span.prod-price", "span[itemprop=price]"];
const OUT_OF_STOCK_SELECTOR: &str = "span.out-of-stock";

/// Positive buyability signals needed out of four.
const BUYABLE_QUORUM: usize = 3;

/// Availability signals read from a product page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuyabilitySignals {
    pub add_to_cart: bool,
    pub no_out_of_stock_marker: bool,
    pub price_displayed: bool,
    pub no_notify_me: bool,
}

impl BuyabilitySignals {
    pub fn positives(&self) -> usize {
        [
            self.add_to_cart,
            self.no_out_of_stock_marker,
            self.price_displayed,
            self.no_notify_me,
        ]
        .into_iter()
        .filter(|s| *s)
        .count()
    }

    /// Majority vote, so one stale widget on the page does not flip the result.
    pub fn is_buyable(&self) -> bool {
        self.positives() >= BUYABLE_QUORUM
    }
}

/// Reads a catalog product page into an [`Observation`].
pub struct ProductPageValidator {
    fetcher: PageFetcher,
    resolver: IdentityResolver,
    brand_keywords: Vec<String>,
}

impl ProductPageValidator {
    pub fn new(fetcher: PageFetcher, resolver: IdentityResolver, brand_keywords: Vec<String>) -> Self {
        Self {
            fetcher,
            resolver,
            brand_keywords: brand_keywords.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    pub fn from_config(catalog: &CatalogConfig, fetcher: &PageFetcher) -> Result<Self> {
        Ok(Self::new(
            fetcher.clone(),
            IdentityResolver::new(&catalog.product_id_pattern)?,
            catalog.brand_keywords.clone(),
        ))
    }

    /// Parses a fetched page. `Ok(None)` when the page has no product name or
    /// is not one of the watched brands.
    pub fn extract(
        &self,
        candidate: &Candidate,
        body: &str,
        observed_at: DateTime<Utc>,
    ) -> Result<Option<Observation>> {
        let document = Html::parse_document(body);

        let Some(name) = first_match(&document, NAME_SELECTORS)? else {
            tracing::debug!("No product name on {}", candidate.url);
            return Ok(None);
        };

        if !self.is_watched_brand(&document, &name)? {
            tracing::debug!("Skipping {}: brand not confirmed for '{}'", candidate.url, name);
            return Ok(None);
        }

        let price_text = first_match(&document, PRICE_SELECTORS)?;
        let signals = read_signals(&document)?;

        Ok(Some(Observation {
            identity: self.resolver.resolve(&candidate.url)?,
            name,
            url: candidate.url.clone(),
            price: price_text.as_deref().and_then(parse_price),
            buyable: signals.is_buyable(),
            source: candidate.primary_surface().to_string(),
            observed_at,
        }))
    }

    fn is_watched_brand(&self, document: &Html, name: &str) -> Result<bool> {
        if self.brand_keywords.is_empty() {
            return Ok(true);
        }
        let name = name.to_lowercase();
        if self.brand_keywords.iter().any(|k| name.contains(k)) {
            return Ok(true);
        }
        let brand = first_text(document, BRAND_SELECTOR)?.unwrap_or_default().to_lowercase();
        Ok(self.brand_keywords.iter().any(|k| brand.contains(k)))
    }
}

#[async_trait]
impl ProductValidator for ProductPageValidator {
    async fn validate(&self, candidate: &Candidate) -> Result<Option<Observation>> {
        let body = self.fetcher.fetch(&candidate.url).await?;
        self.extract(candidate, &body, Utc::now())
    }
}

fn first_match(document: &Html, selectors: &[&str]) -> Result<Option<String>> {
    for css in selectors {
        if let Some(text) = first_text(document, css)? {
            return Ok(Some(text));
        }
    }
    Ok(None)
}

pub fn read_signals(document: &Html) -> Result<BuyabilitySignals> {
    let buttons = selector("button")?;
    let add_to_cart = document.select(&buttons).any(|b| {
        b.text()
            .collect::<String>()
            .to_lowercase()
            .contains("add to cart")
    });

    let page_text = document.root_element().text().collect::<String>().to_lowercase();
    let out_of_stock = page_text.contains("out of stock") || exists(document, OUT_OF_STOCK_SELECTOR)?;

    let mut price_displayed = false;
    for css in PRICE_SELECTORS {
        price_displayed |= exists(document, css)?;
    }

    Ok(BuyabilitySignals {
        add_to_cart,
        no_out_of_stock_marker: !out_of_stock,
        price_displayed,
        no_notify_me: !page_text.contains("notify me"),
    })
}

/// Parses a displayed price such as `₹1,299.00` into minor units.
pub fn parse_price(text: &str) -> Option<i64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        return None;
    }
    let amount = Decimal::from_str(cleaned).ok()?;
    (amount * Decimal::ONE_HUNDRED).round().to_i64()
}
