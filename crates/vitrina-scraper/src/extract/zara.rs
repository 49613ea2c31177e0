//! Zara storefront extractor.
//!
//! Zara renders its category menu behind a hamburger button and its
//! product galleries swap in place when a color swatch is clicked, so all
//! three extraction kinds drive the live page rather than parse static
//! markup.

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use vitrina_core::extraction::{CategoryResult, MenuResult, ProductData, ProductExtract};
use vitrina_core::sites::{RegionConfig, SiteConfig};
use vitrina_core::text::clean_color_name;

use crate::error::BrowserError;
use crate::session::{BrowserSession, Locator};

use super::{
    capture_images, first_present, first_text, scroll_to_stable, texts, SiteExtractor, Timing,
};

pub struct ZaraExtractor {
    menu_labels: Vec<String>,
    image_allow: Option<Regex>,
    timing: Timing,
}

impl ZaraExtractor {
    #[must_use]
    pub fn new(site: &SiteConfig, region: &RegionConfig, timing: Timing) -> Self {
        let image_allow = site.image_allow.as_deref().and_then(|pattern| {
            Regex::new(pattern)
                .map_err(|err| warn!(pattern, error = %err, "image allow pattern rejected"))
                .ok()
        });
        Self {
            menu_labels: region.menu_labels.clone(),
            image_allow,
            timing,
        }
    }
}

// The header redesigns often; several generations of the hamburger button
// are tried in order.
pub(crate) fn hamburger_candidates() -> Vec<Locator> {
    vec![
        Locator::xpath("//button[@aria-label='Abrir menú']"),
        Locator::xpath("//button[@aria-label='Abrir menú']//*[name()='svg']"),
        Locator::css(".layout-header-icon__icon"),
        Locator::xpath("//button[contains(@class, 'layout-header-icon')]"),
    ]
}

pub(crate) fn menu_panel() -> Locator {
    Locator::xpath("//div[@aria-label='Menú de categorías']")
}

pub(crate) fn category_label(label: &str) -> Locator {
    Locator::xpath(format!(
        "//span[@class='layout-categories-category__name'][normalize-space()='{label}']"
    ))
}

/// The nth top-level category owns the nth subcategory list (1-based).
pub(crate) fn subcategory_links(position: usize) -> Locator {
    Locator::xpath(format!(
        "(//ul[@class='layout-categories-category__subcategory-main'])[{position}]//a[@href]"
    ))
}

pub(crate) fn product_name() -> Locator {
    Locator::css("h1[class*='product-detail-info__header-name']")
}

pub(crate) fn product_prices() -> Locator {
    Locator::css("div.product-detail-info__price-amount.price span.money-amount__main")
}

pub(crate) fn product_description() -> Locator {
    Locator::css("div[class='expandable-text__inner-content'] p")
}

pub(crate) fn color_buttons() -> Locator {
    Locator::css(".product-detail-color-selector__colors li button")
}

fn color_name_candidates() -> Vec<Locator> {
    vec![
        Locator::css(".product-color-extended-name.product-detail-color-selector__selected-color-name"),
        Locator::css(".product-color-extended-name.product-detail-info__color"),
    ]
}

pub(crate) fn gallery() -> Locator {
    Locator::css("img.media-image__image.media__wrapper--media")
}

impl ZaraExtractor {
    async fn current_color(
        &self,
        session: &mut dyn BrowserSession,
    ) -> Result<Option<String>, BrowserError> {
        for locator in color_name_candidates() {
            if let Some(text) = first_text(session, &locator).await? {
                if let Some(name) = clean_color_name(&text) {
                    return Ok(Some(name));
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl SiteExtractor for ZaraExtractor {
    async fn extract_menu(
        &self,
        session: &mut dyn BrowserSession,
    ) -> Result<MenuResult, BrowserError> {
        let Some(hamburger) =
            first_present(session, &hamburger_candidates(), self.timing.wait).await?
        else {
            warn!("hamburger button not found, menu yields nothing");
            return Ok(MenuResult::default());
        };
        session.click_nth(&hamburger, 0).await?;
        session.wait_for(&menu_panel(), self.timing.wait).await?;

        let mut extracted_urls = Vec::new();
        for (index, label) in self.menu_labels.iter().enumerate() {
            let label_locator = category_label(label);
            match session.click_nth(&label_locator, 0).await {
                Ok(()) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(label, error = %err, "category label not clickable, skipping");
                    continue;
                }
            }
            tokio::time::sleep(self.timing.settle).await;

            let links = session
                .snapshot_all(&subcategory_links(index + 1), &["href"])
                .await?;
            debug!(label, links = links.len(), "collected subcategory links");
            for link in links {
                if let Some(href) = link.attr("href") {
                    if !href.is_empty() {
                        extracted_urls.push(href.to_string());
                    }
                }
            }
        }

        Ok(MenuResult { extracted_urls })
    }

    async fn extract_category(
        &self,
        session: &mut dyn BrowserSession,
    ) -> Result<CategoryResult, BrowserError> {
        scroll_to_stable(
            session,
            self.timing.max_scroll_attempts,
            self.timing.scroll_pause,
        )
        .await
    }

    async fn extract_product(
        &self,
        session: &mut dyn BrowserSession,
    ) -> Result<ProductExtract, BrowserError> {
        session.wait_for(&product_name(), self.timing.wait).await?;
        tokio::time::sleep(self.timing.settle).await;

        let name = first_text(session, &product_name()).await?;
        let raw_prices = texts(session, &product_prices()).await?;
        let description = {
            let paragraphs = texts(session, &product_description()).await?;
            if paragraphs.is_empty() {
                None
            } else {
                Some(paragraphs.join(" "))
            }
        };
        let current_color = self.current_color(session).await?;

        let mut extract = ProductExtract {
            data: ProductData {
                name,
                description,
                raw_prices,
                current_color: current_color.clone(),
            },
            ..ProductExtract::default()
        };

        let color_count = session.count(&color_buttons()).await?;
        if color_count == 0 {
            // Single-color product, read the gallery as it stands.
            let color = current_color.unwrap_or_else(|| "Color_1".to_string());
            let images = capture_images(
                session,
                &gallery(),
                self.image_allow.as_ref(),
                self.timing.max_images_per_color,
            )
            .await?;
            if !images.is_empty() {
                extract.images_by_color.insert(color, images);
            }
            return Ok(extract);
        }

        for index in 0..color_count {
            // Swatches are re-resolved by index on every pass: clicking one
            // redraws the selector, so a retained handle would go stale.
            match session.click_nth(&color_buttons(), index).await {
                Ok(()) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(index, error = %err, "color swatch not clickable, skipping");
                    continue;
                }
            }
            tokio::time::sleep(self.timing.settle).await;

            let color = self
                .current_color(session)
                .await?
                .unwrap_or_else(|| format!("Color_{}", index + 1));
            let images = capture_images(
                session,
                &gallery(),
                self.image_allow.as_ref(),
                self.timing.max_images_per_color,
            )
            .await?;
            if !images.is_empty() {
                extract.images_by_color.insert(color, images);
            }
        }

        Ok(extract)
    }
}
