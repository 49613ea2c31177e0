//! Domain records shared across the scraper, pipeline, and store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One image attached to a product, always belonging to a color group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub src: String,
    /// Alt text, upper-cased during enrichment; empty when the site omits it.
    pub alt: String,
    pub image_type: String,
}

impl ProductImage {
    #[must_use]
    pub fn new(src: impl Into<String>, alt: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            alt: alt.into(),
            image_type: "product_image".to_string(),
        }
    }
}

/// A product as it leaves the scraper: raw field texts, nothing normalized.
///
/// The reconciliation pipeline turns this into a [`ProductRecord`]. Price
/// texts stay exactly as displayed on the page (`"$ 259.900"`); color keys
/// are already cleaned of trailing `"| <code>"` metadata at extraction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawProduct {
    pub url: String,
    pub site: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub raw_prices: Vec<String>,
    pub images_by_color: BTreeMap<String, Vec<ProductImage>>,
    pub datetime: DateTime<Utc>,
    pub last_visited: DateTime<Utc>,
}

/// The persisted shape of a product. One live record per URL.
///
/// Invariant: when `has_discount` is true, `original_price_amount` is
/// greater than or equal to `current_price_amount`. `last_visited` never
/// moves backwards for a given URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub url: String,
    pub site: String,
    /// Upper-cased at enrichment; `None` when extraction found nothing.
    pub name: Option<String>,
    /// Lower-cased at enrichment.
    pub description: Option<String>,
    pub original_price: Option<String>,
    pub current_price: Option<String>,
    pub original_price_amount: Option<Decimal>,
    pub current_price_amount: Option<Decimal>,
    /// Three-letter code; region config wins over text parsing.
    pub currency: Option<String>,
    pub has_discount: bool,
    pub discount_amount: Decimal,
    /// Nearest-integer percentage, 0 when no discount.
    pub discount_percentage: i32,
    pub images_by_color: BTreeMap<String, Vec<ProductImage>>,
    pub datetime: DateTime<Utc>,
    pub last_visited: DateTime<Utc>,
}

/// Append-only audit entry recording what changed on a revisit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub product_url: String,
    pub change_date: DateTime<Utc>,
    pub changes: Vec<String>,
    /// Full JSON snapshot of the record as persisted at change time.
    pub snapshot: serde_json::Value,
}
