//! The pipeline as an [`ItemSink`], plugged into the crawl loop.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use vitrina_core::records::RawProduct;
use vitrina_core::sink::{ItemSink, SinkError};
use vitrina_db::ProductStore;

use crate::enrich::enrich;
use crate::persist::{persist, PersistOutcome};

/// Counters for one crawl's worth of pipeline work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub received: usize,
    pub duplicates: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Items dropped because the store rejected them.
    pub failures: usize,
}

/// Dedup, enrich, persist.
///
/// URL dedup is scoped to the pipeline's lifetime (one crawl): the same
/// product reached through two categories is processed once. Store errors
/// on a single item are logged and the item dropped; they do not stop the
/// crawl.
pub struct ProductPipeline {
    store: Arc<dyn ProductStore>,
    fallback_currency: Option<String>,
    seen_urls: HashSet<String>,
    stats: PipelineStats,
}

impl ProductPipeline {
    #[must_use]
    pub fn new(store: Arc<dyn ProductStore>, fallback_currency: Option<String>) -> Self {
        Self {
            store,
            fallback_currency,
            seen_urls: HashSet::new(),
            stats: PipelineStats::default(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        self.stats
    }
}

#[async_trait]
impl ItemSink for ProductPipeline {
    async fn deliver(&mut self, product: RawProduct) -> Result<(), SinkError> {
        self.stats.received += 1;

        if !self.seen_urls.insert(product.url.clone()) {
            debug!(url = %product.url, "duplicate URL dropped");
            self.stats.duplicates += 1;
            return Ok(());
        }

        let record = enrich(product, self.fallback_currency.as_deref());
        match persist(self.store.as_ref(), record).await {
            Ok(PersistOutcome::Inserted) => self.stats.inserted += 1,
            Ok(PersistOutcome::Updated(_)) => self.stats.updated += 1,
            Ok(PersistOutcome::Unchanged) => self.stats.unchanged += 1,
            Err(err) => {
                warn!(error = %err, "item dropped, store rejected it");
                self.stats.failures += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use vitrina_db::MemoryProductStore;

    fn raw(url: &str, prices: &[&str]) -> RawProduct {
        let now = Utc::now();
        RawProduct {
            url: url.to_string(),
            site: "ZARA".to_string(),
            name: Some("Vestido Midi".to_string()),
            description: Some("Vestido de cuello redondo.".to_string()),
            raw_prices: prices.iter().map(|s| (*s).to_string()).collect(),
            images_by_color: BTreeMap::new(),
            datetime: now,
            last_visited: now,
        }
    }

    #[tokio::test]
    async fn duplicates_within_a_crawl_are_dropped() {
        let store = Arc::new(MemoryProductStore::new());
        let mut pipeline = ProductPipeline::new(store.clone(), Some("COP".to_string()));

        let url = "https://www.zara.com/co/vestido-p01234.html";
        pipeline
            .deliver(raw(url, &["$ 259.900", "$ 159.900"]))
            .await
            .unwrap();
        pipeline
            .deliver(raw(url, &["$ 259.900", "$ 159.900"]))
            .await
            .unwrap();

        let stats = pipeline.stats();
        assert_eq!(stats.received, 2);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.inserted, 1);
        assert_eq!(store.products().len(), 1);
    }

    #[tokio::test]
    async fn end_to_end_enrichment_and_persistence() {
        let store = Arc::new(MemoryProductStore::new());
        let mut pipeline = ProductPipeline::new(store.clone(), Some("COP".to_string()));

        pipeline
            .deliver(raw(
                "https://www.zara.com/co/vestido-p01234.html",
                &["$ 259.900", "$ 159.900"],
            ))
            .await
            .unwrap();

        let record = &store.products()[0];
        assert_eq!(record.name.as_deref(), Some("VESTIDO MIDI"));
        assert_eq!(record.currency.as_deref(), Some("COP"));
        assert_eq!(
            record.original_price_amount.map(|d| d.to_string()),
            Some("259900".to_string())
        );
        assert_eq!(
            record.current_price_amount.map(|d| d.to_string()),
            Some("159900".to_string())
        );
        assert!(record.has_discount);
        assert_eq!(record.discount_amount.to_string(), "100000");
        assert_eq!(record.discount_percentage, 38);
    }

    #[tokio::test]
    async fn second_crawl_with_same_data_records_nothing() {
        let store = Arc::new(MemoryProductStore::new());
        let url = "https://www.zara.com/co/vestido-p01234.html";

        let mut first = ProductPipeline::new(store.clone(), Some("COP".to_string()));
        first.deliver(raw(url, &["$ 159.900"])).await.unwrap();

        // A fresh pipeline simulates the next scheduled crawl.
        let mut second = ProductPipeline::new(store.clone(), Some("COP".to_string()));
        second.deliver(raw(url, &["$ 159.900"])).await.unwrap();

        assert_eq!(second.stats().unchanged, 1);
        assert!(store.history().is_empty());
        assert_eq!(store.products().len(), 1);
    }

    #[tokio::test]
    async fn price_change_across_crawls_lands_in_history() {
        let store = Arc::new(MemoryProductStore::new());
        let url = "https://www.zara.com/co/vestido-p01234.html";

        let mut first = ProductPipeline::new(store.clone(), Some("COP".to_string()));
        first
            .deliver(raw(url, &["$ 259.900", "$ 199.900"]))
            .await
            .unwrap();

        let mut second = ProductPipeline::new(store.clone(), Some("COP".to_string()));
        second
            .deliver(raw(url, &["$ 259.900", "$ 159.900"]))
            .await
            .unwrap();

        assert_eq!(second.stats().updated, 1);
        let history = store.history();
        assert_eq!(history.len(), 1);
        assert!(history[0]
            .changes
            .iter()
            .any(|c| c.contains("current_price_amount")));
    }
}
