//! The seam between the crawl loop and whatever consumes scraped products.

use async_trait::async_trait;
use thiserror::Error;

use crate::records::RawProduct;

/// A sink could not accept any further items.
///
/// Per-item problems (duplicates, parse failures, store errors on one
/// record) are handled inside the sink and never surface here; this error
/// means the sink as a whole is unusable.
#[derive(Debug, Error)]
#[error("item sink failure: {0}")]
pub struct SinkError(pub String);

/// Receives raw products as the crawl discovers them.
///
/// Implemented by the reconciliation pipeline; test crawls use a simple
/// collecting implementation.
#[async_trait]
pub trait ItemSink: Send {
    async fn deliver(&mut self, product: RawProduct) -> Result<(), SinkError>;
}
