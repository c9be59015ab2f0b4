//! Product catalog rules: slug derivation and the YAML seed catalog.

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Base slug used when a name contains no slug-safe characters at all.
pub const FALLBACK_SLUG: &str = "item";

/// Largest price the `NUMERIC(12,2)` price columns can hold.
#[must_use]
pub fn max_price() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

/// Round a price to cents, halves away from zero as Postgres `NUMERIC` does.
#[must_use]
pub fn round_price(price: Decimal) -> Decimal {
    price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Derive a URL-safe slug from free text.
///
/// Lowercases, keeps ASCII letters and digits, turns runs of whitespace,
/// underscores and hyphens into a single hyphen, and drops everything else.
/// Leading and trailing separators never survive. The result may be empty.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;

    for c in text.trim().to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c);
        } else if c == '-' || c == '_' || c.is_whitespace() {
            pending_separator = true;
        }
    }

    slug
}

/// Candidate slugs for a name, in the order they should be tried:
/// `base`, `base-2`, `base-3`, …
///
/// The iterator is unbounded; callers stop at the first free candidate.
#[derive(Debug, Clone)]
pub struct SlugCandidates {
    base: String,
    next: u64,
}

impl SlugCandidates {
    #[must_use]
    pub fn new(name: &str) -> Self {
        let base = slugify(name);
        Self {
            base: if base.is_empty() {
                FALLBACK_SLUG.to_string()
            } else {
                base
            },
            next: 1,
        }
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }
}

impl Iterator for SlugCandidates {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let n = self.next;
        self.next += 1;
        if n == 1 {
            Some(self.base.clone())
        } else {
            Some(format!("{}-{n}", self.base))
        }
    }
}

/// One product entry in the seed catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSeed {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub price: Decimal,
    pub category: String,
    pub image: String,
}

impl ProductSeed {
    /// Slug for this entry: the explicit one when it slugifies to something,
    /// otherwise derived from the name.
    #[must_use]
    pub fn slug(&self) -> String {
        self.slug
            .as_deref()
            .map(slugify)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| SlugCandidates::new(&self.name).base().to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    pub products: Vec<ProductSeed>,
}

/// Load and validate the seed catalog from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_catalog(path: &Path) -> Result<CatalogFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CatalogFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let catalog: CatalogFile = serde_yaml::from_str(&content)?;

    validate_catalog(&catalog)?;

    Ok(catalog)
}

fn validate_catalog(catalog: &CatalogFile) -> Result<(), ConfigError> {
    let mut seen_names = HashSet::new();
    let mut seen_slugs = HashSet::new();

    for product in &catalog.products {
        if product.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "product name must be non-empty".to_string(),
            ));
        }

        if product.price.is_sign_negative() {
            return Err(ConfigError::Validation(format!(
                "product '{}' has negative price {}",
                product.name, product.price
            )));
        }

        if round_price(product.price) > max_price() {
            return Err(ConfigError::Validation(format!(
                "product '{}' price {} exceeds {}",
                product.name,
                product.price,
                max_price()
            )));
        }

        if product.category.trim().is_empty() || product.image.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "product '{}' needs a category and an image",
                product.name
            )));
        }

        if !seen_names.insert(product.name.trim().to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate product name: '{}'",
                product.name
            )));
        }

        let slug = product.slug();
        if !seen_slugs.insert(slug.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate product slug: '{}' (from product '{}')",
                slug, product.name
            )));
        }
    }

    Ok(())
}
