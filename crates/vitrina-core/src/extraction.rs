//! Request and result types exchanged between the crawl loop, the render
//! middleware, and site extractors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::records::ProductImage;

/// What kind of page a navigation step expects to land on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionKind {
    Menu,
    Category,
    Product,
}

impl std::fmt::Display for ExtractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionKind::Menu => write!(f, "menu"),
            ExtractionKind::Category => write!(f, "category"),
            ExtractionKind::Product => write!(f, "product"),
        }
    }
}

/// One unit of crawl work: navigate to `url` and run the `kind` extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub url: String,
    pub site: String,
    pub kind: ExtractionKind,
}

/// Category URLs harvested from a site's navigation menu.
///
/// Order carries no meaning; the crawl loop deduplicates downstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuResult {
    pub extracted_urls: Vec<String>,
}

/// Outcome of preparing a listing page (scrolling until content stops growing).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryResult {
    pub scroll_completed: bool,
    pub scroll_attempts: u32,
}

/// Basic product fields read off a detail page, pre-normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductData {
    pub name: Option<String>,
    pub description: Option<String>,
    pub raw_prices: Vec<String>,
    pub current_color: Option<String>,
}

/// Full structured output of a product-page extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductExtract {
    pub data: ProductData,
    pub images_by_color: BTreeMap<String, Vec<ProductImage>>,
}

impl ProductExtract {
    /// True when extraction produced neither fields nor images.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data == ProductData::default() && self.images_by_color.is_empty()
    }
}

/// Structured result attached to a rendered response.
///
/// `None` marks pages rendered without a registered extractor (generic wait
/// fallback): the body is still available, the structured payload is not.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Menu(MenuResult),
    Category(CategoryResult),
    Product(ProductExtract),
    None,
}
