//! The site catalog: per-site crawl scope, regions, and selector fallbacks.
//!
//! Loaded from `config/sites.yaml`. Everything that distinguishes one retail
//! site from another at the crawl level lives here — start URLs, allowed
//! domains, blocklists, link-classification rules, and the DOM selectors
//! used when the browser extractor returns partial product data. The
//! interaction logic itself (clicks, scrolls, waits) lives in the per-site
//! extractors.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Regex patterns classifying listing-page links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRules {
    /// Matches product detail URLs (e.g. `-p\d+\.html`).
    pub product: String,
    /// Matches nested category URLs (e.g. `-l\d+\.html`).
    pub category: String,
}

/// CSS selectors used to fill product fields from rendered markup when the
/// extractor's structured output is missing them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackSelectors {
    pub name: String,
    pub description: String,
    pub prices: String,
    pub images: String,
    pub color: String,
}

/// One market a site is crawled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    pub code: String,
    pub start_url: String,
    /// Three-letter code; wins over anything parsed from price text.
    pub currency: Option<String>,
    /// Top-level menu labels to expand, in the region's locale.
    pub menu_labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub id: String,
    /// How the site is named on persisted records (e.g. `ZARA`).
    pub display_name: String,
    pub allowed_domains: Vec<String>,
    /// URL substrings discarded before navigation.
    #[serde(default)]
    pub blocklist: Vec<String>,
    pub link_rules: LinkRules,
    /// Image URLs must match this pattern when set.
    pub image_allow: Option<String>,
    pub fallback_selectors: FallbackSelectors,
    pub regions: Vec<RegionConfig>,
}

impl SiteConfig {
    #[must_use]
    pub fn region(&self, code: &str) -> Option<&RegionConfig> {
        self.regions.iter().find(|r| r.code == code)
    }

    /// True when any blocklist term appears in the URL.
    #[must_use]
    pub fn is_blocked(&self, url: &str) -> bool {
        self.blocklist.iter().any(|term| url.contains(term))
    }
}

#[derive(Debug, Deserialize)]
pub struct SitesFile {
    pub sites: Vec<SiteConfig>,
}

impl SitesFile {
    #[must_use]
    pub fn site(&self, id: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.id == id)
    }
}

/// Load and validate the site catalog from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_sites(path: &Path) -> Result<SitesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SitesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let sites_file: SitesFile =
        serde_yaml::from_str(&content).map_err(ConfigError::SitesFileParse)?;

    validate_sites(&sites_file)?;

    Ok(sites_file)
}

fn validate_sites(sites_file: &SitesFile) -> Result<(), ConfigError> {
    let mut seen_ids = HashSet::new();

    for site in &sites_file.sites {
        if site.id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "site id must be non-empty".to_string(),
            ));
        }

        if !seen_ids.insert(site.id.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate site id: '{}'",
                site.id
            )));
        }

        if site.allowed_domains.is_empty() {
            return Err(ConfigError::Validation(format!(
                "site '{}' has no allowed domains",
                site.id
            )));
        }

        if site.regions.is_empty() {
            return Err(ConfigError::Validation(format!(
                "site '{}' has no regions",
                site.id
            )));
        }

        validate_pattern(&site.id, "link_rules.product", &site.link_rules.product)?;
        validate_pattern(&site.id, "link_rules.category", &site.link_rules.category)?;
        if let Some(pattern) = &site.image_allow {
            validate_pattern(&site.id, "image_allow", pattern)?;
        }

        let mut seen_regions = HashSet::new();
        for region in &site.regions {
            if !seen_regions.insert(region.code.clone()) {
                return Err(ConfigError::Validation(format!(
                    "site '{}' has duplicate region code '{}'",
                    site.id, region.code
                )));
            }
            if !region.start_url.starts_with("http://") && !region.start_url.starts_with("https://")
            {
                return Err(ConfigError::Validation(format!(
                    "site '{}' region '{}' start_url must be http(s)",
                    site.id, region.code
                )));
            }
            if let Some(currency) = &region.currency {
                if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
                    return Err(ConfigError::Validation(format!(
                        "site '{}' region '{}' currency must be a 3-letter uppercase code",
                        site.id, region.code
                    )));
                }
            }
        }
    }

    Ok(())
}

fn validate_pattern(site_id: &str, field: &str, pattern: &str) -> Result<(), ConfigError> {
    Regex::new(pattern).map_err(|e| {
        ConfigError::Validation(format!(
            "site '{site_id}' has invalid {field} pattern '{pattern}': {e}"
        ))
    })?;
    Ok(())
}
