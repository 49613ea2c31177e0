//! The reconciliation pipeline: raw scraped products in, one live record
//! per URL plus an audit trail out.
//!
//! Three stages run per item: in-crawl URL dedup, enrichment (text
//! normalization and price parsing), and persistence (insert, or
//! field-compare against the stored record to decide between a full
//! replace with a history entry and a `last_visited` touch).

pub mod chain;
pub mod enrich;
pub mod persist;

pub use chain::{PipelineStats, ProductPipeline};
pub use enrich::enrich;
pub use persist::{detect_changes, persist, PersistOutcome};
