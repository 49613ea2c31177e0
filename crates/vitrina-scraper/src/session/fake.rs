//! Scripted in-memory [`BrowserSession`] for tests.
//!
//! A [`FakeSession`] holds a set of [`FakePage`]s keyed by URL. Each page
//! scripts what every locator resolves to, what a click at a given index
//! does to the page, and the sequence of document heights reported while
//! scrolling. Tests assert against the recorded clicks and navigations.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;

use super::{BrowserSession, ElementSnapshot, Locator};
use crate::error::BrowserError;

/// One scripted page.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub body: String,
    elements: HashMap<String, Vec<ElementSnapshot>>,
    on_click: HashMap<(String, usize), Vec<(String, Vec<ElementSnapshot>)>>,
    heights: VecDeque<u64>,
    last_height: u64,
}

impl FakePage {
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Script what `locator` resolves to on this page.
    #[must_use]
    pub fn set(mut self, locator: &Locator, snapshots: Vec<ElementSnapshot>) -> Self {
        self.elements.insert(locator.to_string(), snapshots);
        self
    }

    /// Script a click: clicking `locator[index]` replaces the entries for
    /// each affected locator, simulating the DOM mutating in response.
    #[must_use]
    pub fn on_click(
        mut self,
        locator: &Locator,
        index: usize,
        effects: Vec<(&Locator, Vec<ElementSnapshot>)>,
    ) -> Self {
        self.on_click.insert(
            (locator.to_string(), index),
            effects
                .into_iter()
                .map(|(l, snaps)| (l.to_string(), snaps))
                .collect(),
        );
        self
    }

    /// Script the sequence of heights reported across scrolls. Once the
    /// sequence is exhausted the last value repeats, which is how an
    /// infinite-scroll listing looks once it runs out of products.
    #[must_use]
    pub fn heights(mut self, heights: impl IntoIterator<Item = u64>) -> Self {
        self.heights = heights.into_iter().collect();
        if let Some(&last) = self.heights.back() {
            self.last_height = last;
        }
        self
    }

    fn matches(&self, locator: &Locator) -> &[ElementSnapshot] {
        self.elements
            .get(&locator.to_string())
            .map_or(&[], Vec::as_slice)
    }
}

#[derive(Debug, Default)]
pub struct FakeSession {
    pages: HashMap<String, FakePage>,
    current: Option<String>,
    navigation_error: Option<String>,
    pub navigations: Vec<String>,
    pub clicks: Vec<(String, usize)>,
    pub scrolls: usize,
    pub closed: bool,
}

impl FakeSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&mut self, url: impl Into<String>, page: FakePage) {
        self.pages.insert(url.into(), page);
    }

    /// Every subsequent `navigate` fails with this reason.
    pub fn fail_navigation(&mut self, reason: impl Into<String>) {
        self.navigation_error = Some(reason.into());
    }

    fn current_page(&self) -> Result<&FakePage, BrowserError> {
        let url = self
            .current
            .as_ref()
            .ok_or_else(|| BrowserError::Session("no page loaded".to_string()))?;
        self.pages
            .get(url)
            .ok_or_else(|| BrowserError::Session(format!("no page scripted for {url}")))
    }

    fn current_page_mut(&mut self) -> Result<&mut FakePage, BrowserError> {
        let url = self
            .current
            .clone()
            .ok_or_else(|| BrowserError::Session("no page loaded".to_string()))?;
        self.pages
            .get_mut(&url)
            .ok_or_else(|| BrowserError::Session(format!("no page scripted for {url}")))
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.navigations.push(url.to_string());
        if let Some(reason) = &self.navigation_error {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: reason.clone(),
            });
        }
        // Unscripted URLs load as empty pages, like a storefront 404.
        self.pages.entry(url.to_string()).or_default();
        self.current = Some(url.to_string());
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        self.current
            .clone()
            .ok_or_else(|| BrowserError::Session("no page loaded".to_string()))
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        Ok(self.current_page()?.body.clone())
    }

    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError> {
        if self.current_page()?.matches(locator).is_empty() {
            Err(BrowserError::Timeout {
                locator: locator.to_string(),
                timeout_secs: timeout.as_secs(),
            })
        } else {
            Ok(())
        }
    }

    async fn count(&mut self, locator: &Locator) -> Result<usize, BrowserError> {
        Ok(self.current_page()?.matches(locator).len())
    }

    async fn click_nth(&mut self, locator: &Locator, index: usize) -> Result<(), BrowserError> {
        let page = self.current_page_mut()?;
        if page.matches(locator).len() <= index {
            return Err(BrowserError::NotFound {
                locator: locator.to_string(),
                index,
            });
        }
        if let Some(effects) = page.on_click.remove(&(locator.to_string(), index)) {
            for (key, snaps) in effects {
                page.elements.insert(key, snaps);
            }
        }
        self.clicks.push((locator.to_string(), index));
        Ok(())
    }

    async fn snapshot_all(
        &mut self,
        locator: &Locator,
        _attrs: &[&str],
    ) -> Result<Vec<ElementSnapshot>, BrowserError> {
        Ok(self.current_page()?.matches(locator).to_vec())
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), BrowserError> {
        self.scrolls += 1;
        Ok(())
    }

    async fn document_height(&mut self) -> Result<u64, BrowserError> {
        let page = self.current_page_mut()?;
        Ok(page.heights.pop_front().unwrap_or(page.last_height))
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.closed = true;
        Ok(())
    }
}
