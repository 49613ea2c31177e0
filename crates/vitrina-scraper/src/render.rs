//! The render middleware: one browser session serving a crawl.
//!
//! Sits between the crawl loop and the [`BrowserSession`]: navigates,
//! dispatches to the site's extractor by request kind, and attaches the
//! structured outcome to the rendered body. Failure policy lives here —
//! an element-level failure aborts only the request it hit, while a
//! session-level failure (or too many aborts in a row) ends the run.

use std::time::Duration;

use tracing::{info, warn};

use vitrina_core::extraction::{ExtractionKind, ExtractionOutcome, ExtractionRequest};
use vitrina_core::sites::{RegionConfig, SiteConfig};

use crate::error::{BrowserError, ScraperError};
use crate::extract::{ExtractorRegistry, SiteExtractor, Timing};
use crate::session::{BrowserSession, Locator};

/// A page the browser finished rendering, plus what the extractor read
/// from it.
#[derive(Debug)]
pub struct RenderedResponse {
    /// Where the browser actually ended up (redirects followed).
    pub url: String,
    pub body: String,
    pub outcome: ExtractionOutcome,
}

pub struct RenderMiddleware {
    session: Box<dyn BrowserSession>,
    /// `None` when the site has no registered extractor; pages then get a
    /// generic body wait and no structured outcome.
    extractor: Option<Box<dyn SiteExtractor>>,
    site: SiteConfig,
    wait: Duration,
    consecutive_failures: u32,
    max_consecutive_failures: u32,
}

impl RenderMiddleware {
    #[must_use]
    pub fn new(
        session: Box<dyn BrowserSession>,
        registry: &ExtractorRegistry,
        site: SiteConfig,
        region: &RegionConfig,
        timing: Timing,
        max_consecutive_failures: u32,
    ) -> Self {
        let extractor = match registry.build(&site, region, timing) {
            Ok(extractor) => Some(extractor),
            Err(err) => {
                warn!(site = %site.id, error = %err, "no extractor, falling back to generic rendering");
                None
            }
        };
        Self {
            session,
            extractor,
            site,
            wait: timing.wait,
            consecutive_failures: 0,
            max_consecutive_failures,
        }
    }

    /// Render one request.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::Blocked`] when the URL matches the site blocklist.
    /// - [`ScraperError::RequestAborted`] on a non-fatal browser failure.
    /// - [`ScraperError::SessionFatal`] when the session died, or when too
    ///   many requests in a row aborted.
    pub async fn process(
        &mut self,
        request: &ExtractionRequest,
    ) -> Result<RenderedResponse, ScraperError> {
        if self.site.is_blocked(&request.url) {
            return Err(ScraperError::Blocked {
                url: request.url.clone(),
            });
        }

        match self.render(request).await {
            Ok(response) => {
                self.consecutive_failures = 0;
                Ok(response)
            }
            Err(err) if err.is_fatal() => Err(ScraperError::SessionFatal {
                reason: err.to_string(),
            }),
            Err(err) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.max_consecutive_failures {
                    Err(ScraperError::SessionFatal {
                        reason: format!(
                            "{} consecutive request failures, last: {err}",
                            self.consecutive_failures
                        ),
                    })
                } else {
                    Err(ScraperError::RequestAborted {
                        url: request.url.clone(),
                        source: err,
                    })
                }
            }
        }
    }

    async fn render(
        &mut self,
        request: &ExtractionRequest,
    ) -> Result<RenderedResponse, BrowserError> {
        info!(url = %request.url, kind = %request.kind, "rendering");
        self.session.navigate(&request.url).await?;

        let outcome = match &self.extractor {
            Some(extractor) => match request.kind {
                ExtractionKind::Menu => {
                    ExtractionOutcome::Menu(extractor.extract_menu(self.session.as_mut()).await?)
                }
                ExtractionKind::Category => ExtractionOutcome::Category(
                    extractor.extract_category(self.session.as_mut()).await?,
                ),
                ExtractionKind::Product => ExtractionOutcome::Product(
                    extractor.extract_product(self.session.as_mut()).await?,
                ),
            },
            None => {
                self.session
                    .wait_for(&Locator::css("body"), self.wait)
                    .await?;
                ExtractionOutcome::None
            }
        };

        // Redirects are common on storefronts; record where we landed, but
        // do not fail the request over a URL read.
        let url = match self.session.current_url().await {
            Ok(url) => url,
            Err(err) if err.is_fatal() => return Err(err),
            Err(_) => request.url.clone(),
        };
        let body = self.session.page_source().await?;

        Ok(RenderedResponse { url, body, outcome })
    }

    /// Shut the browser down.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::SessionFatal`] when the browser did not shut
    /// down cleanly.
    pub async fn close(mut self) -> Result<(), ScraperError> {
        self.session
            .close()
            .await
            .map_err(|err| ScraperError::SessionFatal {
                reason: err.to_string(),
            })
    }
}
