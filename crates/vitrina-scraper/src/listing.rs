//! Static-markup processing of rendered pages.
//!
//! Once the browser has exhausted a listing (or rendered a product), the
//! page body is plain HTML: link harvesting and selector-based field
//! fallbacks happen here, off the live session.

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use vitrina_core::extraction::ProductExtract;
use vitrina_core::sites::{FallbackSelectors, LinkRules};
use vitrina_core::text::clean_color_name;

use crate::error::ScraperError;
use crate::image::best_image_url;
use crate::session::ElementSnapshot;

/// Compiled link-classification rules for one site.
pub struct LinkClassifier {
    product: Regex,
    category: Regex,
}

impl LinkClassifier {
    /// # Errors
    ///
    /// Returns [`ScraperError::Pattern`] when a rule does not compile.
    /// Site-catalog validation rejects these earlier, so hitting this means
    /// the rules were built outside the catalog.
    pub fn new(rules: &LinkRules) -> Result<Self, ScraperError> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|source| ScraperError::Pattern {
                pattern: pattern.to_string(),
                source,
            })
        };
        Ok(Self {
            product: compile(&rules.product)?,
            category: compile(&rules.category)?,
        })
    }

    #[must_use]
    pub fn is_product(&self, url: &str) -> bool {
        self.product.is_match(url)
    }

    #[must_use]
    pub fn is_category(&self, url: &str) -> bool {
        self.category.is_match(url)
    }

    /// Split listing links into product URLs and nested category URLs.
    /// Product rules win when both match; unclassified links are dropped.
    #[must_use]
    pub fn classify<'a, I>(&self, urls: I) -> (Vec<String>, Vec<String>)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut products = Vec::new();
        let mut categories = Vec::new();
        for url in urls {
            if self.is_product(url) {
                products.push(url.to_string());
            } else if self.is_category(url) {
                categories.push(url.to_string());
            }
        }
        (products, categories)
    }
}

/// Collect every `<a href>` in `html`, absolutized against `base`.
///
/// Mail, script, and fragment links are dropped; order is preserved with
/// duplicates removed.
#[must_use]
pub fn extract_links(html: &str, base: &str) -> Vec<String> {
    let Ok(base) = Url::parse(base) else {
        debug!(base, "unparseable base URL, no links extracted");
        return Vec::new();
    };
    let Ok(anchor) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();
    for element in document.select(&anchor) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("mailto:")
            || href.starts_with("javascript:")
        {
            continue;
        }
        let Ok(resolved) = base.join(href) else {
            debug!(href, "unjoinable link skipped");
            continue;
        };
        let url = resolved.to_string();
        if seen.insert(url.clone()) {
            links.push(url);
        }
    }
    links
}

fn select(html: &Html, selector: &str) -> Vec<ElementSnapshot> {
    let parsed = match Selector::parse(selector) {
        Ok(parsed) => parsed,
        Err(err) => {
            debug!(selector, error = %err, "fallback selector rejected");
            return Vec::new();
        }
    };
    html.select(&parsed)
        .map(|element| {
            let mut snapshot =
                ElementSnapshot::new(element.text().collect::<String>().trim().to_string());
            for (name, value) in element.value().attrs() {
                snapshot.attrs.insert(name.to_string(), value.to_string());
            }
            snapshot
        })
        .collect()
}

/// Fill fields the live extractor missed from the rendered markup.
///
/// Only empty fields are touched; structured output from the extractor
/// always wins over selector scraping.
pub fn fill_product_fallback(
    extract: &mut ProductExtract,
    html: &str,
    selectors: &FallbackSelectors,
    allow: Option<&Regex>,
    max_images: usize,
) {
    let document = Html::parse_document(html);

    if extract.data.name.is_none() {
        extract.data.name = select(&document, &selectors.name)
            .into_iter()
            .map(|s| s.text)
            .find(|t| !t.is_empty());
    }

    if extract.data.description.is_none() {
        let paragraphs: Vec<String> = select(&document, &selectors.description)
            .into_iter()
            .map(|s| s.text)
            .filter(|t| !t.is_empty())
            .collect();
        if !paragraphs.is_empty() {
            extract.data.description = Some(paragraphs.join(" "));
        }
    }

    if extract.data.raw_prices.is_empty() {
        extract.data.raw_prices = select(&document, &selectors.prices)
            .into_iter()
            .map(|s| s.text)
            .filter(|t| !t.is_empty())
            .collect();
    }

    if extract.data.current_color.is_none() {
        extract.data.current_color = select(&document, &selectors.color)
            .into_iter()
            .find_map(|s| clean_color_name(&s.text));
    }

    if extract.images_by_color.is_empty() {
        let mut seen = std::collections::HashSet::new();
        let mut images = Vec::new();
        for snapshot in select(&document, &selectors.images) {
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
            images.push(vitrina_core::records::ProductImage::new(url, alt));
        }
        if !images.is_empty() {
            let color = extract
                .data
                .current_color
                .clone()
                .unwrap_or_else(|| "default".to_string());
            extract.images_by_color.insert(color, images);
        }
    }
}
