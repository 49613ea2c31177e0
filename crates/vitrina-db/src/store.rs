//! The persistence seam for the reconciliation pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use vitrina_core::records::{HistoryRecord, ProductRecord};

use crate::StoreError;

/// Product persistence keyed by URL, with an append-only change history.
///
/// Backed by Postgres in production and an in-memory map in tests and
/// dry runs.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn find_by_url(&self, url: &str) -> Result<Option<ProductRecord>, StoreError>;

    /// Insert a record for a URL not yet stored.
    async fn insert(&self, record: &ProductRecord) -> Result<(), StoreError>;

    /// Overwrite the live record for `record.url` in full.
    async fn replace(&self, record: &ProductRecord) -> Result<(), StoreError>;

    /// Bump `last_visited` without touching anything else.
    async fn touch_last_visited(&self, url: &str, at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn append_history(&self, entry: &HistoryRecord) -> Result<(), StoreError>;
}
