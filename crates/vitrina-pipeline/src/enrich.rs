//! Turn a [`RawProduct`] into a persistable [`ProductRecord`].

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use vitrina_core::price::{normalize_price, select_price_pair};
use vitrina_core::records::{ProductImage, ProductRecord, RawProduct};
use vitrina_core::text::{normalize_lower, normalize_upper};

/// Normalize texts, parse prices, and derive discount figures.
///
/// `fallback_currency` is the region's configured code; when set it wins
/// over anything parsed out of the price texts. A discount exists only when
/// both prices parsed and the original is strictly greater.
#[must_use]
pub fn enrich(raw: RawProduct, fallback_currency: Option<&str>) -> ProductRecord {
    let name = raw
        .name
        .as_deref()
        .map(normalize_upper)
        .filter(|n| !n.is_empty());
    let description = raw
        .description
        .as_deref()
        .map(normalize_lower)
        .filter(|d| !d.is_empty());

    let pair = select_price_pair(&raw.raw_prices);
    let original = pair
        .original
        .as_deref()
        .map(|text| normalize_price(text, fallback_currency));
    let current = pair
        .current
        .as_deref()
        .map(|text| normalize_price(text, fallback_currency));

    let original_price_amount = original.as_ref().and_then(|p| p.amount);
    let current_price_amount = current.as_ref().and_then(|p| p.amount);
    let currency = original
        .as_ref()
        .and_then(|p| p.currency.clone())
        .or_else(|| current.as_ref().and_then(|p| p.currency.clone()));

    let (has_discount, discount_amount, discount_percentage) =
        match (original_price_amount, current_price_amount) {
            (Some(o), Some(c)) if o > c => {
                let amount = (o - c).round_dp(2);
                let percentage = if o.is_zero() {
                    0
                } else {
                    ((o - c) * Decimal::ONE_HUNDRED / o)
                        .round()
                        .to_i32()
                        .unwrap_or(0)
                };
                (true, amount, percentage)
            }
            _ => (false, Decimal::ZERO, 0),
        };

    let images_by_color = raw
        .images_by_color
        .into_iter()
        .map(|(color, images)| {
            let images = images
                .into_iter()
                .map(|image| ProductImage {
                    alt: normalize_upper(&image.alt),
                    ..image
                })
                .collect();
            (color, images)
        })
        .collect();

    ProductRecord {
        url: raw.url,
        site: raw.site,
        name,
        description,
        original_price: pair.original,
        current_price: pair.current,
        original_price_amount,
        current_price_amount,
        currency,
        has_discount,
        discount_amount,
        discount_percentage,
        images_by_color,
        datetime: raw.datetime,
        last_visited: raw.last_visited,
    }
}
