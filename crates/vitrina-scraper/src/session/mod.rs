//! The browser seam.
//!
//! Extractors and the render middleware talk to a [`BrowserSession`], never
//! to CDP types. The trait exposes only locator-plus-index operations:
//! element handles do not exist in this API, so code cannot hold a
//! reference to a DOM node across a mutation — every access re-resolves
//! the locator against the live document.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::BrowserError;

pub mod cdp;
pub mod fake;

pub use cdp::{CdpConfig, CdpSession};
pub use fake::{FakePage, FakeSession};

/// How to find elements on the live page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Locator::XPath(expression.into())
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css({s})"),
            Locator::XPath(s) => write!(f, "xpath({s})"),
        }
    }
}

/// A point-in-time copy of one element: visible text plus requested
/// attributes. Snapshots are plain data — they stay valid after the DOM
/// moves on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ElementSnapshot {
    #[serde(default)]
    pub text: String,
    /// Only attributes that were present on the element.
    #[serde(default)]
    pub attrs: HashMap<String, String>,
}

impl ElementSnapshot {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attrs: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

/// One live browser page, driven serially.
///
/// All element operations re-resolve their locator on every call; an index
/// refers to position in the current match list, not to a retained node.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    async fn current_url(&mut self) -> Result<String, BrowserError>;

    /// The rendered markup of the current page.
    async fn page_source(&mut self) -> Result<String, BrowserError>;

    /// Block until at least one element matches, or time out.
    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError>;

    async fn count(&mut self, locator: &Locator) -> Result<usize, BrowserError>;

    /// Click the element at `index` in the current match list.
    async fn click_nth(&mut self, locator: &Locator, index: usize) -> Result<(), BrowserError>;

    /// Snapshot every matching element: trimmed text plus the listed
    /// attributes where present.
    async fn snapshot_all(
        &mut self,
        locator: &Locator,
        attrs: &[&str],
    ) -> Result<Vec<ElementSnapshot>, BrowserError>;

    async fn scroll_to_bottom(&mut self) -> Result<(), BrowserError>;

    async fn document_height(&mut self) -> Result<u64, BrowserError>;

    async fn close(&mut self) -> Result<(), BrowserError>;
}
