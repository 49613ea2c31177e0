//! In-memory [`ProductStore`] for tests and `--dry-run` crawls.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use vitrina_core::records::{HistoryRecord, ProductRecord};

use crate::store::ProductStore;
use crate::StoreError;

#[derive(Debug, Default)]
struct Inner {
    products: HashMap<String, ProductRecord>,
    history: Vec<HistoryRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryProductStore {
    inner: Mutex<Inner>,
}

impl MemoryProductStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every stored record, sorted by URL.
    #[must_use]
    pub fn products(&self) -> Vec<ProductRecord> {
        let guard = self.lock();
        let mut records: Vec<ProductRecord> = guard.products.values().cloned().collect();
        records.sort_by(|a, b| a.url.cmp(&b.url));
        records
    }

    /// Every history entry, in append order.
    #[must_use]
    pub fn history(&self) -> Vec<HistoryRecord> {
        self.lock().history.clone()
    }
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    async fn find_by_url(&self, url: &str) -> Result<Option<ProductRecord>, StoreError> {
        Ok(self.lock().products.get(url).cloned())
    }

    async fn insert(&self, record: &ProductRecord) -> Result<(), StoreError> {
        self.lock()
            .products
            .insert(record.url.clone(), record.clone());
        Ok(())
    }

    async fn replace(&self, record: &ProductRecord) -> Result<(), StoreError> {
        let mut guard = self.lock();
        if !guard.products.contains_key(&record.url) {
            return Err(StoreError::NotFound);
        }
        guard.products.insert(record.url.clone(), record.clone());
        Ok(())
    }

    async fn touch_last_visited(&self, url: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut guard = self.lock();
        let record = guard.products.get_mut(url).ok_or(StoreError::NotFound)?;
        if at > record.last_visited {
            record.last_visited = at;
        }
        Ok(())
    }

    async fn append_history(&self, entry: &HistoryRecord) -> Result<(), StoreError> {
        self.lock().history.push(entry.clone());
        Ok(())
    }
}
