//! Reconcile an enriched record against what the store already holds.

use tracing::{debug, info};
use uuid::Uuid;

use vitrina_core::records::{HistoryRecord, ProductRecord};
use vitrina_db::{ProductStore, StoreError};

/// What persisting one record did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// First sighting of the URL.
    Inserted,
    /// A tracked field changed; the record was replaced and the changes
    /// recorded in history.
    Updated(Vec<String>),
    /// Nothing tracked changed; only `last_visited` moved.
    Unchanged,
}

fn fmt_opt<T: std::fmt::Display>(value: Option<&T>) -> String {
    value.map_or_else(|| "none".to_string(), ToString::to_string)
}

/// Compare the fields that constitute a product change.
///
/// Timestamps and display price strings are excluded: a revisit always
/// refreshes those, and counting them would turn every crawl into a
/// rewrite.
#[must_use]
pub fn detect_changes(existing: &ProductRecord, incoming: &ProductRecord) -> Vec<String> {
    let mut changes = Vec::new();

    if existing.name != incoming.name {
        changes.push(format!(
            "field 'name' changed from '{}' to '{}'",
            fmt_opt(existing.name.as_ref()),
            fmt_opt(incoming.name.as_ref())
        ));
    }
    if existing.description != incoming.description {
        changes.push(format!(
            "field 'description' changed from '{}' to '{}'",
            fmt_opt(existing.description.as_ref()),
            fmt_opt(incoming.description.as_ref())
        ));
    }
    if existing.original_price_amount != incoming.original_price_amount {
        changes.push(format!(
            "field 'original_price_amount' changed from '{}' to '{}'",
            fmt_opt(existing.original_price_amount.as_ref()),
            fmt_opt(incoming.original_price_amount.as_ref())
        ));
    }
    if existing.current_price_amount != incoming.current_price_amount {
        changes.push(format!(
            "field 'current_price_amount' changed from '{}' to '{}'",
            fmt_opt(existing.current_price_amount.as_ref()),
            fmt_opt(incoming.current_price_amount.as_ref())
        ));
    }
    if existing.currency != incoming.currency {
        changes.push(format!(
            "field 'currency' changed from '{}' to '{}'",
            fmt_opt(existing.currency.as_ref()),
            fmt_opt(incoming.currency.as_ref())
        ));
    }
    if existing.has_discount != incoming.has_discount {
        changes.push(format!(
            "field 'has_discount' changed from '{}' to '{}'",
            existing.has_discount, incoming.has_discount
        ));
    }
    if existing.images_by_color != incoming.images_by_color {
        changes.push(format!(
            "field 'images_by_color' changed from {} colors to {} colors",
            existing.images_by_color.len(),
            incoming.images_by_color.len()
        ));
    }

    changes
}

/// Insert, replace-with-history, or touch, depending on what changed.
///
/// # Errors
///
/// Propagates [`StoreError`] from the underlying store, including
/// serialization of the history snapshot.
pub async fn persist(
    store: &dyn ProductStore,
    incoming: ProductRecord,
) -> Result<PersistOutcome, StoreError> {
    let Some(existing) = store.find_by_url(&incoming.url).await? else {
        info!(url = %incoming.url, "new product");
        store.insert(&incoming).await?;
        return Ok(PersistOutcome::Inserted);
    };

    let changes = detect_changes(&existing, &incoming);
    if changes.is_empty() {
        debug!(url = %incoming.url, "unchanged, touching last_visited");
        store
            .touch_last_visited(&incoming.url, incoming.last_visited)
            .await?;
        return Ok(PersistOutcome::Unchanged);
    }

    info!(url = %incoming.url, changes = changes.len(), "product changed");
    let snapshot = serde_json::to_value(&incoming)?;
    store.replace(&incoming).await?;
    store
        .append_history(&HistoryRecord {
            id: Uuid::new_v4(),
            product_url: incoming.url.clone(),
            change_date: incoming.last_visited,
            changes: changes.clone(),
            snapshot,
        })
        .await?;
    Ok(PersistOutcome::Updated(changes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;
    use std::str::FromStr;
    use vitrina_core::records::ProductImage;
    use vitrina_db::MemoryProductStore;

    fn record() -> ProductRecord {
        let at = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        ProductRecord {
            url: "https://www.zara.com/co/vestido-p01234.html".to_string(),
            site: "ZARA".to_string(),
            name: Some("VESTIDO MIDI".to_string()),
            description: Some("vestido de cuello redondo.".to_string()),
            original_price: Some("$ 259.900".to_string()),
            current_price: Some("$ 159.900".to_string()),
            original_price_amount: Some(Decimal::from_str("259900").unwrap()),
            current_price_amount: Some(Decimal::from_str("159900").unwrap()),
            currency: Some("COP".to_string()),
            has_discount: true,
            discount_amount: Decimal::from_str("100000").unwrap(),
            discount_percentage: 38,
            images_by_color: BTreeMap::from([(
                "NEGRO".to_string(),
                vec![ProductImage::new(
                    "https://static.zara.net/photos/negro-1.jpg",
                    "VISTA FRONTAL",
                )],
            )]),
            datetime: at,
            last_visited: at,
        }
    }

    #[tokio::test]
    async fn first_sighting_inserts() {
        let store = MemoryProductStore::new();
        let outcome = persist(&store, record()).await.unwrap();
        assert_eq!(outcome, PersistOutcome::Inserted);
        assert_eq!(store.products().len(), 1);
        assert!(store.history().is_empty());
    }

    #[tokio::test]
    async fn identical_revisit_only_touches() {
        let store = MemoryProductStore::new();
        persist(&store, record()).await.unwrap();

        let mut revisit = record();
        revisit.last_visited = record().last_visited + Duration::days(1);
        revisit.datetime = revisit.last_visited;
        let outcome = persist(&store, revisit.clone()).await.unwrap();

        assert_eq!(outcome, PersistOutcome::Unchanged);
        assert!(store.history().is_empty());
        let stored = &store.products()[0];
        assert_eq!(stored.last_visited, revisit.last_visited);
        // The record body was not replaced.
        assert_eq!(stored.datetime, record().datetime);
    }

    #[tokio::test]
    async fn price_drop_replaces_and_records_history() {
        let store = MemoryProductStore::new();
        persist(&store, record()).await.unwrap();

        let mut cheaper = record();
        cheaper.current_price_amount = Some(Decimal::from_str("99900").unwrap());
        cheaper.last_visited = record().last_visited + Duration::days(2);
        let outcome = persist(&store, cheaper.clone()).await.unwrap();

        match outcome {
            PersistOutcome::Updated(changes) => {
                assert_eq!(changes.len(), 1);
                assert!(changes[0].contains("current_price_amount"));
                assert!(changes[0].contains("159900"));
                assert!(changes[0].contains("99900"));
            }
            other => panic!("expected update, got {other:?}"),
        }

        let stored = &store.products()[0];
        assert_eq!(
            stored.current_price_amount,
            Some(Decimal::from_str("99900").unwrap())
        );
        let history = store.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].product_url, cheaper.url);
        assert_eq!(history[0].change_date, cheaper.last_visited);
        assert_eq!(history[0].snapshot["currency"], "COP");
    }

    #[tokio::test]
    async fn multiple_field_changes_are_all_listed() {
        let old = record();
        let mut new = record();
        new.name = Some("VESTIDO LARGO".to_string());
        new.currency = Some("USD".to_string());
        new.images_by_color.clear();

        let changes = detect_changes(&old, &new);
        assert_eq!(changes.len(), 3);
        assert!(changes.iter().any(|c| c.contains("'name'")));
        assert!(changes.iter().any(|c| c.contains("'currency'")));
        assert!(changes.iter().any(|c| c.contains("'images_by_color'")));
    }

    #[tokio::test]
    async fn timestamps_and_display_strings_are_not_changes() {
        let old = record();
        let mut new = record();
        new.datetime = old.datetime + Duration::days(7);
        new.last_visited = old.last_visited + Duration::days(7);
        new.original_price = Some("COP 259.900".to_string());
        assert!(detect_changes(&old, &new).is_empty());
    }
}
