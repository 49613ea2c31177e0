//! Mango storefront extractor.
//!
//! Mango differs from Zara in two structural ways: the menu is a flat CSS
//! link list rather than labeled accordion panels, and listings paginate
//! through a "load more" button when present, with infinite scroll as the
//! fallback.

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use vitrina_core::extraction::{CategoryResult, MenuResult, ProductData, ProductExtract};
use vitrina_core::sites::{RegionConfig, SiteConfig};

use crate::error::BrowserError;
use crate::session::{BrowserSession, Locator};

use super::{
    capture_images, first_present, first_text, scroll_to_stable, texts, SiteExtractor, Timing,
};

/// Load-more click ceiling; beyond this the listing is treated as loaded.
const MAX_LOAD_MORE_CLICKS: u32 = 10;

pub struct MangoExtractor {
    image_allow: Option<Regex>,
    timing: Timing,
}

impl MangoExtractor {
    #[must_use]
    pub fn new(site: &SiteConfig, _region: &RegionConfig, timing: Timing) -> Self {
        let image_allow = site.image_allow.as_deref().and_then(|pattern| {
            Regex::new(pattern)
                .map_err(|err| warn!(pattern, error = %err, "image allow pattern rejected"))
                .ok()
        });
        Self {
            image_allow,
            timing,
        }
    }
}

pub(crate) fn menu_button_candidates() -> Vec<Locator> {
    vec![
        Locator::css(".header-menu-button"),
        Locator::css("[data-testid='menu-button']"),
        Locator::css(".menu-toggle"),
    ]
}

pub(crate) fn menu_category_links() -> Locator {
    Locator::css(".main-menu .category-link")
}

pub(crate) fn load_more_trigger() -> Locator {
    Locator::css(".load-more-products, .infinite-scroll-trigger")
}

pub(crate) fn product_name() -> Locator {
    Locator::css(".product-name h1, .pdp-product-name")
}

pub(crate) fn product_prices() -> Locator {
    Locator::css(".current-price, .price-current")
}

pub(crate) fn product_description() -> Locator {
    Locator::css(".product-description p, .pdp-description")
}

pub(crate) fn color_options() -> Locator {
    Locator::css(".color-selector .color-option")
}

fn color_name() -> Locator {
    Locator::css(".selected-color-name, .color-name-selected")
}

pub(crate) fn gallery() -> Locator {
    Locator::css(".product-gallery img, .pdp-images img")
}

#[async_trait]
impl SiteExtractor for MangoExtractor {
    async fn extract_menu(
        &self,
        session: &mut dyn BrowserSession,
    ) -> Result<MenuResult, BrowserError> {
        let Some(button) =
            first_present(session, &menu_button_candidates(), self.timing.wait).await?
        else {
            warn!("menu button not found, menu yields nothing");
            return Ok(MenuResult::default());
        };
        session.click_nth(&button, 0).await?;
        tokio::time::sleep(self.timing.settle).await;

        let links = session
            .snapshot_all(&menu_category_links(), &["href"])
            .await?;
        let extracted_urls: Vec<String> = links
            .iter()
            .filter_map(|link| link.attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .map(str::to_string)
            .collect();
        debug!(urls = extracted_urls.len(), "collected menu links");
        Ok(MenuResult { extracted_urls })
    }

    async fn extract_category(
        &self,
        session: &mut dyn BrowserSession,
    ) -> Result<CategoryResult, BrowserError> {
        // Listings with a load-more button paginate by clicking it until it
        // disappears; everything else falls back to height-stable scrolling.
        if session.count(&load_more_trigger()).await? == 0 {
            return scroll_to_stable(
                session,
                self.timing.max_scroll_attempts,
                self.timing.scroll_pause,
            )
            .await;
        }

        let mut clicks = 0;
        while clicks < MAX_LOAD_MORE_CLICKS {
            match session.click_nth(&load_more_trigger(), 0).await {
                Ok(()) => {
                    tokio::time::sleep(self.timing.scroll_pause).await;
                    clicks += 1;
                }
                Err(err) if err.is_fatal() => return Err(err),
                // Button gone: everything is loaded.
                Err(_) => break,
            }
        }
        Ok(CategoryResult {
            scroll_completed: true,
            scroll_attempts: clicks,
        })
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
        let current_color = first_text(session, &color_name()).await?;

        let mut extract = ProductExtract {
            data: ProductData {
                name,
                description,
                raw_prices,
                current_color,
            },
            ..ProductExtract::default()
        };

        let options = match session
            .snapshot_all(&color_options(), &["data-color-name", "title"])
            .await
        {
            Ok(options) => options,
            Err(err) if err.is_fatal() => return Err(err),
            Err(_) => Vec::new(),
        };

        if options.is_empty() {
            let images = capture_images(
                session,
                &gallery(),
                self.image_allow.as_ref(),
                self.timing.max_images_per_color,
            )
            .await?;
            if !images.is_empty() {
                extract.images_by_color.insert("default".to_string(), images);
            }
            return Ok(extract);
        }

        for (index, option) in options.iter().enumerate() {
            match session.click_nth(&color_options(), index).await {
                Ok(()) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(index, error = %err, "color option not clickable, skipping");
                    continue;
                }
            }
            tokio::time::sleep(self.timing.settle).await;

            let color = option
                .attr("data-color-name")
                .or_else(|| option.attr("title"))
                .map(str::to_string)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ElementSnapshot, FakePage, FakeSession};
    use vitrina_core::sites::{FallbackSelectors, LinkRules};

    fn mango_site() -> SiteConfig {
        SiteConfig {
            id: "mango".to_string(),
            display_name: "MANGO".to_string(),
            allowed_domains: vec!["shop.mango.com".to_string()],
            blocklist: Vec::new(),
            link_rules: LinkRules {
                product: "/p/".to_string(),
                category: "/c/".to_string(),
            },
            image_allow: None,
            fallback_selectors: FallbackSelectors::default(),
            regions: Vec::new(),
        }
    }

    fn mango_region() -> RegionConfig {
        RegionConfig {
            code: "co".to_string(),
            start_url: "https://shop.mango.com/co".to_string(),
            currency: Some("COP".to_string()),
            menu_labels: Vec::new(),
        }
    }

    fn extractor() -> MangoExtractor {
        MangoExtractor::new(&mango_site(), &mango_region(), Timing::instant())
    }

    #[tokio::test]
    async fn menu_collects_category_links() {
        let button = Locator::css(".header-menu-button");
        let page = FakePage::new("")
            .set(&button, vec![ElementSnapshot::new("")])
            .set(
                &menu_category_links(),
                vec![
                    ElementSnapshot::new("Vestidos")
                        .with_attr("href", "https://shop.mango.com/co/c/mujer/vestidos"),
                    ElementSnapshot::new("Camisas")
                        .with_attr("href", "https://shop.mango.com/co/c/hombre/camisas"),
                    ElementSnapshot::new("sin enlace"),
                ],
            );
        let mut session = FakeSession::new();
        session.add_page("https://shop.mango.com/co", page);
        session.navigate("https://shop.mango.com/co").await.unwrap();

        let result = extractor().extract_menu(&mut session).await.unwrap();
        assert_eq!(
            result.extracted_urls,
            vec![
                "https://shop.mango.com/co/c/mujer/vestidos",
                "https://shop.mango.com/co/c/hombre/camisas",
            ]
        );
    }

    #[tokio::test]
    async fn category_clicks_load_more_until_it_disappears() {
        let trigger = load_more_trigger();
        // The first click loads the last batch and removes the button.
        let page = FakePage::new("")
            .set(&trigger, vec![ElementSnapshot::new("Ver más")])
            .on_click(&trigger, 0, vec![(&trigger, vec![])])
            .heights([500]);
        let mut session = FakeSession::new();
        session.add_page("https://shop.mango.com/co/c/mujer/vestidos", page);
        session
            .navigate("https://shop.mango.com/co/c/mujer/vestidos")
            .await
            .unwrap();

        let result = extractor().extract_category(&mut session).await.unwrap();
        assert!(result.scroll_completed);
        assert_eq!(result.scroll_attempts, 1);
        assert!(session.scrolls == 0);
    }

    #[tokio::test]
    async fn load_more_clicks_are_bounded() {
        // Button never disappears.
        let page = FakePage::new("")
            .set(&load_more_trigger(), vec![ElementSnapshot::new("Ver más")]);
        let mut session = FakeSession::new();
        session.add_page("https://shop.mango.com/co/c/mujer/abrigos", page);
        session
            .navigate("https://shop.mango.com/co/c/mujer/abrigos")
            .await
            .unwrap();

        let result = extractor().extract_category(&mut session).await.unwrap();
        assert!(result.scroll_completed);
        assert_eq!(result.scroll_attempts, MAX_LOAD_MORE_CLICKS);
    }

    #[tokio::test]
    async fn category_without_trigger_scrolls_to_stable() {
        let page = FakePage::new("").heights([400, 800, 800]);
        let mut session = FakeSession::new();
        session.add_page("https://shop.mango.com/co/c/mujer/tops", page);
        session
            .navigate("https://shop.mango.com/co/c/mujer/tops")
            .await
            .unwrap();

        let result = extractor().extract_category(&mut session).await.unwrap();
        assert!(result.scroll_completed);
        assert!(session.scrolls > 0);
    }

    #[tokio::test]
    async fn product_names_colors_from_attributes() {
        let photo = |url: &str| ElementSnapshot::new("").with_attr("src", url);
        let page = FakePage::new("")
            .set(&product_name(), vec![ElementSnapshot::new("Vestido lino")])
            .set(&product_prices(), vec![ElementSnapshot::new("$ 199.900")])
            .set(
                &color_options(),
                vec![
                    ElementSnapshot::new("").with_attr("data-color-name", "Arena"),
                    ElementSnapshot::new("").with_attr("title", "Azul"),
                    ElementSnapshot::new(""),
                ],
            )
            .set(
                &gallery(),
                vec![photo("https://st.mango.com/images/v1.jpg")],
            );
        let mut session = FakeSession::new();
        let url = "https://shop.mango.com/co/p/mujer/vestido-lino";
        session.add_page(url, page);
        session.navigate(url).await.unwrap();

        let extract = extractor().extract_product(&mut session).await.unwrap();
        assert_eq!(extract.data.name.as_deref(), Some("Vestido lino"));
        let colors: Vec<&str> = extract.images_by_color.keys().map(String::as_str).collect();
        assert_eq!(colors, vec!["Arena", "Azul", "Color_3"]);
    }

    #[tokio::test]
    async fn product_without_color_options_uses_default() {
        let page = FakePage::new("")
            .set(&product_name(), vec![ElementSnapshot::new("Cinturón")])
            .set(
                &gallery(),
                vec![ElementSnapshot::new("")
                    .with_attr("src", "https://st.mango.com/images/belt.jpg")],
            );
        let mut session = FakeSession::new();
        let url = "https://shop.mango.com/co/p/hombre/cinturon";
        session.add_page(url, page);
        session.navigate(url).await.unwrap();

        let extract = extractor().extract_product(&mut session).await.unwrap();
        let colors: Vec<&str> = extract.images_by_color.keys().map(String::as_str).collect();
        assert_eq!(colors, vec!["default"]);
    }
}
