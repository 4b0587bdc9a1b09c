use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::utils::error::{AppError, Result};

/// Stable key for a catalog product.
///
/// Either the catalog's own identifier or, when the URL carries none, the
/// canonical form of the product URL. Never derived from listing position or
/// the surface a product was found on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct ProductIdentity(String);

impl ProductIdentity {
    pub fn from_catalog_id(id: &str) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() {
            return Err(AppError::Validation("Catalog id cannot be empty".to_string()));
        }
        Ok(Self(id.to_string()))
    }

    /// Identity from a canonicalized product URL.
    pub fn from_url(raw: &str) -> Result<Self> {
        Ok(Self(canonical_url(raw)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalizes a URL so that the same product page always yields the same string.
pub fn canonical_url(raw: &str) -> Result<String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| AppError::Parse {
        message: format!("Invalid product URL '{}': {}", raw, e),
    })?;

    url.set_fragment(None);
    url.set_query(None);
    // `Url` already lowercases scheme and host and drops default ports.
    let trimmed = url.path().trim_end_matches('/').to_string();
    if trimmed.is_empty() {
        url.set_path("/");
    } else {
        url.set_path(&trimmed);
    }

    let mut canonical = url.to_string();
    if canonical.ends_with('/') && url.path() == "/" {
        canonical.pop();
    }
    Ok(canonical)
}

/// Resolves product URLs to identities using the catalog's URL scheme.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    id_pattern: Regex,
}

impl IdentityResolver {
    /// `id_pattern` must contain at least one capture group holding the catalog id.
    pub fn new(id_pattern: &str) -> Result<Self> {
        let id_pattern = Regex::new(id_pattern).map_err(|e| AppError::Parse {
            message: format!("Invalid product id pattern: {}", e),
        })?;
        if id_pattern.captures_len() < 2 {
            return Err(AppError::Validation(
                "Product id pattern needs a capture group".to_string(),
            ));
        }
        Ok(Self { id_pattern })
    }

    pub fn catalog_id(&self, url: &str) -> Option<String> {
        self.id_pattern
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|id| !id.is_empty())
    }

    pub fn resolve(&self, url: &str) -> Result<ProductIdentity> {
        match self.catalog_id(url) {
            Some(id) => ProductIdentity::from_catalog_id(&id),
            None => ProductIdentity::from_url(url),
        }
    }
}
