//! Chrome DevTools Protocol implementation of [`BrowserSession`].
//!
//! One launched browser, one page, driven through chromiumoxide. Element
//! operations are JavaScript evaluations that resolve the locator against
//! the live document on every call; clicks are programmatic
//! (`element.click()`), matching how overlay-heavy storefronts respond
//! best.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{BrowserSession, ElementSnapshot, Locator};
use crate::error::BrowserError;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Launch options for the real browser.
#[derive(Debug, Clone)]
pub struct CdpConfig {
    pub headless: bool,
    pub user_agent: String,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: String::new(),
            window_width: 1920,
            window_height: 1080,
        }
    }
}

pub struct CdpSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl CdpSession {
    /// Launch a browser and open a blank page.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::Session`] when the browser cannot be
    /// launched or the initial page cannot be created.
    pub async fn launch(config: &CdpConfig) -> Result<Self, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .window_size(config.window_width, config.window_height)
            .no_sandbox()
            .args(vec![
                "--disable-dev-shm-usage",
                "--disable-blink-features=AutomationControlled",
                "--blink-settings=imagesEnabled=false",
            ]);
        if !config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder.build().map_err(BrowserError::Session)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| BrowserError::Session(e.to_string()))?;

        // The handler stream must be pumped for the lifetime of the browser.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Session(e.to_string()))?;

        if !config.user_agent.is_empty() {
            page.set_user_agent(config.user_agent.as_str())
                .await
                .map_err(|e| BrowserError::Session(e.to_string()))?;
        }

        Ok(Self {
            browser,
            page,
            handler_task,
        })
    }

    async fn eval<T>(&self, script: String) -> Result<T, BrowserError>
    where
        T: serde::de::DeserializeOwned,
    {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        result
            .into_value::<T>()
            .map_err(|e| BrowserError::Script(e.to_string()))
    }
}

/// JS expression evaluating to an array of elements matching the locator.
fn js_match_all(locator: &Locator) -> Result<String, BrowserError> {
    let quoted = |s: &str| {
        serde_json::to_string(s).map_err(|e| BrowserError::Script(e.to_string()))
    };
    match locator {
        Locator::Css(selector) => Ok(format!(
            "Array.from(document.querySelectorAll({}))",
            quoted(selector)?
        )),
        Locator::XPath(expression) => Ok(format!(
            "(() => {{ \
                 const r = document.evaluate({}, document, null, \
                     XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
                 const out = []; \
                 for (let i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i)); \
                 return out; \
             }})()",
            quoted(expression)?
        )),
    }
}

#[async_trait]
impl BrowserSession for CdpSession {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| BrowserError::Session(e.to_string()))?;
        url.ok_or_else(|| BrowserError::Session("page reports no URL".to_string()))
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::Session(e.to_string()))
    }

    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.count(locator).await? > 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    locator: locator.to_string(),
                    timeout_secs: timeout.as_secs(),
                });
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL.min(timeout)).await;
        }
    }

    async fn count(&mut self, locator: &Locator) -> Result<usize, BrowserError> {
        let script = format!("(function() {{ return {}.length; }})()", js_match_all(locator)?);
        self.eval::<usize>(script).await
    }

    async fn click_nth(&mut self, locator: &Locator, index: usize) -> Result<(), BrowserError> {
        let script = format!(
            "(function() {{ \
                 const els = {}; \
                 if (els.length <= {index}) return false; \
                 els[{index}].click(); \
                 return true; \
             }})()",
            js_match_all(locator)?
        );
        let clicked = self.eval::<bool>(script).await?;
        if clicked {
            Ok(())
        } else {
            Err(BrowserError::NotFound {
                locator: locator.to_string(),
                index,
            })
        }
    }

    async fn snapshot_all(
        &mut self,
        locator: &Locator,
        attrs: &[&str],
    ) -> Result<Vec<ElementSnapshot>, BrowserError> {
        let names =
            serde_json::to_string(attrs).map_err(|e| BrowserError::Script(e.to_string()))?;
        let script = format!(
            "(function() {{ \
                 const els = {}; \
                 const names = {names}; \
                 return els.map(el => {{ \
                     const attrs = {{}}; \
                     for (const n of names) {{ \
                         const v = el.getAttribute(n); \
                         if (v !== null) attrs[n] = v; \
                     }} \
                     const text = (el.innerText || el.textContent || '').trim(); \
                     return {{ text, attrs }}; \
                 }}); \
             }})()",
            js_match_all(locator)?
        );
        self.eval::<Vec<ElementSnapshot>>(script).await
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), BrowserError> {
        self.eval::<serde_json::Value>(
            "(function() { window.scrollTo(0, document.body.scrollHeight); return null; })()"
                .to_string(),
        )
        .await?;
        Ok(())
    }

    async fn document_height(&mut self) -> Result<u64, BrowserError> {
        self.eval::<u64>("(function() { return document.body.scrollHeight; })()".to_string())
            .await
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.browser
            .close()
            .await
            .map_err(|e| BrowserError::Session(e.to_string()))?;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        Ok(())
    }
}
