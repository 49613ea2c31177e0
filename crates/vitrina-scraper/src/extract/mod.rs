//! Per-site extractors.
//!
//! Each supported storefront gets a [`SiteExtractor`] implementation that
//! knows how to drive the live page: open the category menu, exhaust an
//! infinite-scroll listing, walk a product's color variants. Extractors
//! are looked up by site id through [`ExtractorRegistry::builtin`], which
//! is the single place a site becomes routable.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use vitrina_core::app_config::AppConfig;
use vitrina_core::extraction::{CategoryResult, MenuResult, ProductExtract};
use vitrina_core::records::ProductImage;
use vitrina_core::sites::{RegionConfig, SiteConfig};

use crate::error::{BrowserError, ScraperError};
use crate::image::best_image_url;
use crate::session::{BrowserSession, Locator};

pub mod mango;
pub mod zara;

pub use mango::MangoExtractor;
pub use zara::ZaraExtractor;

/// Attributes snapshotted from gallery `<img>` elements.
pub(crate) const IMAGE_ATTRS: &[&str] = &["data-srcset", "srcset", "data-src", "src", "alt"];

/// Wait, settle, and scroll knobs shared by every extractor.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Upper bound for explicit element waits.
    pub wait: Duration,
    /// Pause after an interaction, letting scripts redraw the page.
    pub settle: Duration,
    /// Pause between scroll steps while exhausting a listing.
    pub scroll_pause: Duration,
    pub max_scroll_attempts: u32,
    pub max_images_per_color: usize,
}

impl Timing {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            wait: Duration::from_secs(config.browser_wait_timeout_secs),
            settle: Duration::from_millis(config.browser_settle_ms),
            scroll_pause: Duration::from_millis(config.scroll_pause_ms),
            max_scroll_attempts: config.max_scroll_attempts,
            max_images_per_color: config.max_images_per_color,
        }
    }

    /// Zero-delay timing for scripted sessions in tests.
    #[must_use]
    pub fn instant() -> Self {
        Self {
            wait: Duration::ZERO,
            settle: Duration::ZERO,
            scroll_pause: Duration::ZERO,
            max_scroll_attempts: 20,
            max_images_per_color: 10,
        }
    }
}

/// Site-specific page-driving logic.
///
/// Implementations swallow their own non-fatal element misses (a missing
/// description is an empty field, not an error) and return `Err` only for
/// failures worth aborting the request or the session over.
#[async_trait]
pub trait SiteExtractor: Send {
    /// Open the navigation menu and collect category URLs.
    async fn extract_menu(
        &self,
        session: &mut dyn BrowserSession,
    ) -> Result<MenuResult, BrowserError>;

    /// Exhaust a category listing so every product link is in the DOM.
    async fn extract_category(
        &self,
        session: &mut dyn BrowserSession,
    ) -> Result<CategoryResult, BrowserError>;

    /// Read one product page: fields plus per-color image galleries.
    async fn extract_product(
        &self,
        session: &mut dyn BrowserSession,
    ) -> Result<ProductExtract, BrowserError>;
}

type ExtractorFactory = fn(&SiteConfig, &RegionConfig, Timing) -> Box<dyn SiteExtractor>;

fn zara_factory(site: &SiteConfig, region: &RegionConfig, timing: Timing) -> Box<dyn SiteExtractor> {
    Box::new(ZaraExtractor::new(site, region, timing))
}

fn mango_factory(
    site: &SiteConfig,
    region: &RegionConfig,
    timing: Timing,
) -> Box<dyn SiteExtractor> {
    Box::new(MangoExtractor::new(site, region, timing))
}

/// Maps site ids to extractor constructors.
pub struct ExtractorRegistry {
    factories: HashMap<String, ExtractorFactory>,
}

impl ExtractorRegistry {
    /// The registry with every built-in site wired up.
    #[must_use]
    pub fn builtin() -> Self {
        let mut factories: HashMap<String, ExtractorFactory> = HashMap::new();
        factories.insert("zara".to_string(), zara_factory as ExtractorFactory);
        factories.insert("mango".to_string(), mango_factory as ExtractorFactory);
        Self { factories }
    }

    /// Construct the extractor for a site.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::UnknownSite`] when no extractor is
    /// registered under the site's id.
    pub fn build(
        &self,
        site: &SiteConfig,
        region: &RegionConfig,
        timing: Timing,
    ) -> Result<Box<dyn SiteExtractor>, ScraperError> {
        let factory = self
            .factories
            .get(&site.id)
            .ok_or_else(|| ScraperError::UnknownSite(site.id.clone()))?;
        Ok(factory(site, region, timing))
    }

    /// Sorted ids of every registered site.
    #[must_use]
    pub fn registered(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.factories.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Try locators in order, returning the first one present on the page.
///
/// Non-fatal misses move on to the next candidate; only session-fatal
/// errors propagate.
pub(crate) async fn first_present(
    session: &mut dyn BrowserSession,
    candidates: &[Locator],
    timeout: Duration,
) -> Result<Option<Locator>, BrowserError> {
    for locator in candidates {
        match session.wait_for(locator, timeout).await {
            Ok(()) => return Ok(Some(locator.clone())),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => debug!(locator = %locator, error = %err, "candidate not present"),
        }
    }
    Ok(None)
}

/// Scroll until the document height stops growing.
///
/// `scroll_attempts` counts only the scrolls where the height grew; the
/// final confirming scroll is free. The attempt bound keeps a listing
/// that never settles (ads rotating, height jitter) from pinning the
/// crawl; hitting the bound still counts as completion since everything
/// reachable has been loaded.
pub(crate) async fn scroll_to_stable(
    session: &mut dyn BrowserSession,
    max_attempts: u32,
    pause: Duration,
) -> Result<CategoryResult, BrowserError> {
    let mut last = session.document_height().await?;
    let mut attempts = 0;
    while attempts < max_attempts {
        session.scroll_to_bottom().await?;
        tokio::time::sleep(pause).await;
        let current = session.document_height().await?;
        if current == last {
            break;
        }
        attempts += 1;
        last = current;
    }
    Ok(CategoryResult {
        scroll_completed: true,
        scroll_attempts: attempts,
    })
}

/// Trimmed text of every element matching `locator`.
///
/// A non-fatal failure reads as "no such elements"; only session-fatal
/// errors propagate.
pub(crate) async fn texts(
    session: &mut dyn BrowserSession,
    locator: &Locator,
) -> Result<Vec<String>, BrowserError> {
    match session.snapshot_all(locator, &[]).await {
        Ok(snapshots) => Ok(snapshots
            .into_iter()
            .map(|s| s.text)
            .filter(|t| !t.is_empty())
            .collect()),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            debug!(locator = %locator, error = %err, "text snapshot failed");
            Ok(Vec::new())
        }
    }
}

/// First non-empty text matching `locator`, if any.
pub(crate) async fn first_text(
    session: &mut dyn BrowserSession,
    locator: &Locator,
) -> Result<Option<String>, BrowserError> {
    Ok(texts(session, locator).await?.into_iter().next())
}

/// Capture the gallery images currently matching `locator`.
///
/// Deduplicates by URL and caps the list, since variant galleries repeat
/// frames across carousel clones.
pub(crate) async fn capture_images(
    session: &mut dyn BrowserSession,
    locator: &Locator,
    allow: Option<&regex::Regex>,
    max_images: usize,
) -> Result<Vec<ProductImage>, BrowserError> {
    let snapshots = match session.snapshot_all(locator, IMAGE_ATTRS).await {
        Ok(snapshots) => snapshots,
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => {
            debug!(locator = %locator, error = %err, "image snapshot failed");
            return Ok(Vec::new());
        }
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut images = Vec::new();
    for snapshot in snapshots {
        if images.len() >= max_images {
            break;
        }
        let Some(url) = best_image_url(&snapshot, allow) else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }
        let alt = snapshot.attr("alt").unwrap_or("").to_string();
        images.push(ProductImage::new(url, alt));
    }
    Ok(images)
}
