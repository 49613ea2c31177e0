use thiserror::Error;

use vitrina_core::SinkError;

/// A browser-level failure.
///
/// Only [`BrowserError::Session`] is fatal to the session; everything else
/// is scoped to the element or navigation that produced it and leaves the
/// browser usable for the next request.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("timed out after {timeout_secs}s waiting for {locator}")]
    Timeout { locator: String, timeout_secs: u64 },

    #[error("no element at {locator}[{index}]")]
    NotFound { locator: String, index: usize },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("browser session failure: {0}")]
    Session(String),
}

impl BrowserError {
    /// True when the session cannot be reused after this error.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, BrowserError::Session(_))
    }
}

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("no extractor registered for site '{0}'")]
    UnknownSite(String),

    #[error("URL blocked by policy: {url}")]
    Blocked { url: String },

    #[error("request for {url} aborted: {source}")]
    RequestAborted {
        url: String,
        #[source]
        source: BrowserError,
    },

    #[error("browser session unusable, aborting run: {reason}")]
    SessionFatal { reason: String },

    #[error("invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    Sink(#[from] SinkError),
}
