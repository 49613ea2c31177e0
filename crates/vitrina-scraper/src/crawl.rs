//! The crawl loop: menu, categories, products, in one browser session.
//!
//! Breadth-first over a URL frontier with global dedup. Every navigation
//! goes through the render middleware; products land in the [`ItemSink`]
//! as they are extracted. A fatal session error ends the run; anything
//! smaller costs at most one request.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use tracing::{info, warn};
use url::Url;

use vitrina_core::extraction::{ExtractionKind, ExtractionOutcome, ExtractionRequest};
use vitrina_core::records::RawProduct;
use vitrina_core::sink::ItemSink;
use vitrina_core::sites::{RegionConfig, SiteConfig};

use crate::error::ScraperError;
use crate::listing::{extract_links, fill_product_fallback, LinkClassifier};
use crate::render::{RenderedResponse, RenderMiddleware};

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Pause between requests; storefronts throttle aggressive crawlers.
    pub delay: Duration,
    /// Crawl exactly one product URL instead of walking from the menu.
    pub single_url: Option<String>,
    /// Stop after this many rendered requests.
    pub max_requests: Option<usize>,
    /// Per-color image cap, applied to markup-fallback extraction the same
    /// way the live extractors apply it to gallery captures.
    pub max_images_per_color: usize,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            single_url: None,
            max_requests: None,
            max_images_per_color: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub requests: usize,
    pub menus: usize,
    pub categories: usize,
    pub products_delivered: usize,
    /// Blocked, off-domain, empty, or unextractable pages.
    pub skipped: usize,
    pub aborted_requests: usize,
}

/// True when `url` falls under one of the site's allowed domains.
fn domain_allowed(url: &str, allowed_domains: &[String]) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    allowed_domains
        .iter()
        .any(|domain| host == domain || host.ends_with(&format!(".{domain}")))
}

fn absolutize(href: &str, base: &str) -> Option<String> {
    Url::parse(base)
        .ok()?
        .join(href)
        .ok()
        .map(|url| url.to_string())
}

/// Run one crawl of `site` in `region`, delivering products to `sink`.
///
/// # Errors
///
/// Returns [`ScraperError::SessionFatal`] when the browser session dies or
/// keeps failing, [`ScraperError::Pattern`] when the site's link rules do
/// not compile, and [`ScraperError::Sink`] when the sink stops accepting
/// items. Per-request failures are counted, not returned.
pub async fn run_crawl(
    middleware: &mut RenderMiddleware,
    site: &SiteConfig,
    region: &RegionConfig,
    sink: &mut dyn ItemSink,
    options: &CrawlOptions,
) -> Result<CrawlStats, ScraperError> {
    let classifier = LinkClassifier::new(&site.link_rules)?;
    let image_allow = site
        .image_allow
        .as_deref()
        .and_then(|pattern| Regex::new(pattern).ok());

    let mut stats = CrawlStats::default();
    let mut visited: HashSet<String> = HashSet::new();
    let mut frontier: VecDeque<ExtractionRequest> = VecDeque::new();

    let seed = match &options.single_url {
        Some(url) => ExtractionRequest {
            url: url.clone(),
            site: site.id.clone(),
            kind: ExtractionKind::Product,
        },
        None => ExtractionRequest {
            url: region.start_url.clone(),
            site: site.id.clone(),
            kind: ExtractionKind::Menu,
        },
    };
    visited.insert(seed.url.clone());
    frontier.push_back(seed);

    while let Some(request) = frontier.pop_front() {
        if let Some(max) = options.max_requests {
            if stats.requests >= max {
                info!(max, "request ceiling reached, stopping");
                break;
            }
        }
        stats.requests += 1;

        let response = match middleware.process(&request).await {
            Ok(response) => response,
            Err(ScraperError::Blocked { url }) => {
                info!(url, "blocked URL skipped");
                stats.skipped += 1;
                continue;
            }
            Err(ScraperError::RequestAborted { url, source }) => {
                warn!(url, error = %source, "request aborted");
                stats.aborted_requests += 1;
                continue;
            }
            Err(err) => return Err(err),
        };

        handle_response(
            site,
            &classifier,
            image_allow.as_ref(),
            options.max_images_per_color,
            response,
            &mut visited,
            &mut frontier,
            sink,
            &mut stats,
        )
        .await?;

        if !frontier.is_empty() && !options.delay.is_zero() {
            tokio::time::sleep(options.delay).await;
        }
    }

    info!(
        requests = stats.requests,
        products = stats.products_delivered,
        aborted = stats.aborted_requests,
        "crawl finished"
    );
    Ok(stats)
}

fn enqueue(
    site: &SiteConfig,
    url: String,
    kind: ExtractionKind,
    visited: &mut HashSet<String>,
    frontier: &mut VecDeque<ExtractionRequest>,
    stats: &mut CrawlStats,
) {
    if !domain_allowed(&url, &site.allowed_domains) || site.is_blocked(&url) {
        stats.skipped += 1;
        return;
    }
    if !visited.insert(url.clone()) {
        return;
    }
    frontier.push_back(ExtractionRequest {
        url,
        site: site.id.clone(),
        kind,
    });
}

#[allow(clippy::too_many_arguments)]
async fn handle_response(
    site: &SiteConfig,
    classifier: &LinkClassifier,
    image_allow: Option<&Regex>,
    max_images_per_color: usize,
    response: RenderedResponse,
    visited: &mut HashSet<String>,
    frontier: &mut VecDeque<ExtractionRequest>,
    sink: &mut dyn ItemSink,
    stats: &mut CrawlStats,
) -> Result<(), ScraperError> {
    match response.outcome {
        ExtractionOutcome::Menu(menu) => {
            stats.menus += 1;
            info!(urls = menu.extracted_urls.len(), "menu rendered");
            for href in menu.extracted_urls {
                let Some(url) = absolutize(&href, &response.url) else {
                    continue;
                };
                enqueue(site, url, ExtractionKind::Category, visited, frontier, stats);
            }
        }
        ExtractionOutcome::Category(result) => {
            stats.categories += 1;
            if !result.scroll_completed {
                warn!(url = %response.url, "listing did not finish loading");
            }
            let links = extract_links(&response.body, &response.url);
            let (products, categories) =
                classifier.classify(links.iter().map(String::as_str));
            info!(
                url = %response.url,
                products = products.len(),
                categories = categories.len(),
                "listing rendered"
            );
            for url in products {
                enqueue(site, url, ExtractionKind::Product, visited, frontier, stats);
            }
            for url in categories {
                enqueue(site, url, ExtractionKind::Category, visited, frontier, stats);
            }
        }
        ExtractionOutcome::Product(mut extract) => {
            fill_product_fallback(
                &mut extract,
                &response.body,
                &site.fallback_selectors,
                image_allow,
                max_images_per_color,
            );
            if extract.is_empty() {
                warn!(url = %response.url, "product page yielded nothing");
                stats.skipped += 1;
                return Ok(());
            }
            let now = Utc::now();
            let product = RawProduct {
                url: response.url,
                site: site.display_name.clone(),
                name: extract.data.name,
                description: extract.data.description,
                raw_prices: extract.data.raw_prices,
                images_by_color: extract.images_by_color,
                datetime: now,
                last_visited: now,
            };
            sink.deliver(product).await?;
            stats.products_delivered += 1;
        }
        ExtractionOutcome::None => {
            warn!(url = %response.url, "no extractor output for page, skipping");
            stats.skipped += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::zara;
    use crate::extract::{ExtractorRegistry, Timing};
    use crate::session::{ElementSnapshot, FakePage, FakeSession, Locator};
    use async_trait::async_trait;
    use vitrina_core::sink::SinkError;
    use vitrina_core::sites::{FallbackSelectors, LinkRules};

    #[derive(Default)]
    struct VecSink {
        delivered: Vec<RawProduct>,
        reject: bool,
    }

    #[async_trait]
    impl ItemSink for VecSink {
        async fn deliver(&mut self, product: RawProduct) -> Result<(), SinkError> {
            if self.reject {
                return Err(SinkError("sink closed".to_string()));
            }
            self.delivered.push(product);
            Ok(())
        }
    }

    fn zara_site() -> SiteConfig {
        SiteConfig {
            id: "zara".to_string(),
            display_name: "ZARA".to_string(),
            allowed_domains: vec!["zara.com".to_string()],
            blocklist: vec!["/login".to_string()],
            link_rules: LinkRules {
                product: r"-p\d+\.html".to_string(),
                category: r"-l\d+\.html".to_string(),
            },
            image_allow: None,
            fallback_selectors: FallbackSelectors {
                name: "h1.fallback-name".to_string(),
                description: ".fallback-desc p".to_string(),
                prices: "span.fallback-price".to_string(),
                images: "img.fallback-photo".to_string(),
                color: "span.fallback-color".to_string(),
            },
            regions: vec![zara_region()],
        }
    }

    fn zara_region() -> RegionConfig {
        RegionConfig {
            code: "co".to_string(),
            start_url: "https://www.zara.com/co/".to_string(),
            currency: Some("COP".to_string()),
            menu_labels: vec!["MUJER".to_string()],
        }
    }

    fn menu_page() -> FakePage {
        let hamburger = Locator::css(".layout-header-icon__icon");
        FakePage::new("<html></html>")
            .set(&hamburger, vec![ElementSnapshot::new("")])
            .on_click(
                &hamburger,
                0,
                vec![(&zara::menu_panel(), vec![ElementSnapshot::new("")])],
            )
            .set(
                &zara::category_label("MUJER"),
                vec![ElementSnapshot::new("MUJER")],
            )
            .set(
                &zara::subcategory_links(1),
                vec![
                    ElementSnapshot::new("").with_attr("href", "/co/vestidos-l1066.html"),
                    // Off-domain and blocklisted links are filtered out.
                    ElementSnapshot::new("")
                        .with_attr("href", "https://other.example.net/x-l1.html"),
                    ElementSnapshot::new("").with_attr("href", "/co/login-l9.html"),
                ],
            )
    }

    fn category_page() -> FakePage {
        FakePage::new(
            r#"<html><body>
                <a href="/co/vestido-midi-p01234.html">Vestido midi</a>
                <a href="/co/vestido-midi-p01234.html">Duplicado</a>
                <a href="/co/vestidos-l1066.html">Misma categoría</a>
                <a href="/co/ayuda">Sin clasificar</a>
            </body></html>"#,
        )
        .heights([100, 100])
    }

    fn product_page() -> FakePage {
        FakePage::new(
            r#"<html><body>
                <div class="fallback-desc"><p>Vestido midi de tirantes.</p></div>
            </body></html>"#,
        )
        .set(
            &zara::product_name(),
            vec![ElementSnapshot::new("VESTIDO MIDI")],
        )
        .set(
            &zara::product_prices(),
            vec![
                ElementSnapshot::new("$ 259.900"),
                ElementSnapshot::new("$ 159.900"),
            ],
        )
        .set(
            &zara::gallery(),
            vec![ElementSnapshot::new("")
                .with_attr("src", "https://static.zara.net/photos/midi-1.jpg")],
        )
    }

    fn middleware(session: FakeSession) -> RenderMiddleware {
        RenderMiddleware::new(
            Box::new(session),
            &ExtractorRegistry::builtin(),
            zara_site(),
            &zara_region(),
            Timing::instant(),
            3,
        )
    }

    #[tokio::test]
    async fn full_crawl_walks_menu_category_product() {
        let mut session = FakeSession::new();
        session.add_page("https://www.zara.com/co/", menu_page());
        session.add_page("https://www.zara.com/co/vestidos-l1066.html", category_page());
        session.add_page(
            "https://www.zara.com/co/vestido-midi-p01234.html",
            product_page(),
        );
        let mut middleware = middleware(session);
        let mut sink = VecSink::default();

        let stats = run_crawl(
            &mut middleware,
            &zara_site(),
            &zara_region(),
            &mut sink,
            &CrawlOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(stats.menus, 1);
        assert_eq!(stats.categories, 1);
        assert_eq!(stats.products_delivered, 1);
        // Off-domain and blocklisted menu links.
        assert_eq!(stats.skipped, 2);

        let product = &sink.delivered[0];
        assert_eq!(product.site, "ZARA");
        assert_eq!(product.name.as_deref(), Some("VESTIDO MIDI"));
        // Description came from the markup fallback.
        assert_eq!(
            product.description.as_deref(),
            Some("Vestido midi de tirantes.")
        );
        assert_eq!(product.raw_prices, vec!["$ 259.900", "$ 159.900"]);
        assert_eq!(product.images_by_color["Color_1"].len(), 1);
    }

    #[tokio::test]
    async fn category_revisits_are_deduplicated() {
        let mut session = FakeSession::new();
        session.add_page("https://www.zara.com/co/", menu_page());
        // The category links back to itself; the crawl must not loop.
        session.add_page("https://www.zara.com/co/vestidos-l1066.html", category_page());
        session.add_page(
            "https://www.zara.com/co/vestido-midi-p01234.html",
            product_page(),
        );
        let mut middleware = middleware(session);
        let mut sink = VecSink::default();

        let stats = run_crawl(
            &mut middleware,
            &zara_site(),
            &zara_region(),
            &mut sink,
            &CrawlOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(stats.requests, 3);
        assert_eq!(stats.categories, 1);
    }

    #[tokio::test]
    async fn single_url_mode_crawls_one_product() {
        let url = "https://www.zara.com/co/vestido-midi-p01234.html";
        let mut session = FakeSession::new();
        session.add_page(url, product_page());
        let mut middleware = middleware(session);
        let mut sink = VecSink::default();

        let options = CrawlOptions {
            single_url: Some(url.to_string()),
            ..CrawlOptions::default()
        };
        let stats = run_crawl(
            &mut middleware,
            &zara_site(),
            &zara_region(),
            &mut sink,
            &options,
        )
        .await
        .unwrap();
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.products_delivered, 1);
        assert_eq!(sink.delivered[0].url, url);
    }

    #[tokio::test]
    async fn max_requests_caps_the_run() {
        let mut session = FakeSession::new();
        session.add_page("https://www.zara.com/co/", menu_page());
        session.add_page("https://www.zara.com/co/vestidos-l1066.html", category_page());
        let mut middleware = middleware(session);
        let mut sink = VecSink::default();

        let options = CrawlOptions {
            max_requests: Some(1),
            ..CrawlOptions::default()
        };
        let stats = run_crawl(
            &mut middleware,
            &zara_site(),
            &zara_region(),
            &mut sink,
            &options,
        )
        .await
        .unwrap();
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.menus, 1);
        assert!(sink.delivered.is_empty());
    }

    #[tokio::test]
    async fn fallback_images_honor_the_per_color_cap() {
        let url = "https://www.zara.com/co/vestido-midi-p01234.html";
        // No live gallery: every image comes from the markup fallback.
        let page = FakePage::new(
            r#"<html><body>
                <img class="fallback-photo" src="https://static.zara.net/photos/midi-1.jpg">
                <img class="fallback-photo" src="https://static.zara.net/photos/midi-2.jpg">
                <img class="fallback-photo" src="https://static.zara.net/photos/midi-3.jpg">
            </body></html>"#,
        )
        .set(
            &zara::product_name(),
            vec![ElementSnapshot::new("VESTIDO MIDI")],
        );
        let mut session = FakeSession::new();
        session.add_page(url, page);
        let mut middleware = middleware(session);
        let mut sink = VecSink::default();

        let options = CrawlOptions {
            single_url: Some(url.to_string()),
            max_images_per_color: 2,
            ..CrawlOptions::default()
        };
        run_crawl(
            &mut middleware,
            &zara_site(),
            &zara_region(),
            &mut sink,
            &options,
        )
        .await
        .unwrap();

        let images = &sink.delivered[0].images_by_color["default"];
        assert_eq!(images.len(), 2);
    }

    #[tokio::test]
    async fn sink_failure_ends_the_crawl() {
        let url = "https://www.zara.com/co/vestido-midi-p01234.html";
        let mut session = FakeSession::new();
        session.add_page(url, product_page());
        let mut middleware = middleware(session);
        let mut sink = VecSink {
            reject: true,
            ..VecSink::default()
        };

        let options = CrawlOptions {
            single_url: Some(url.to_string()),
            ..CrawlOptions::default()
        };
        let err = run_crawl(
            &mut middleware,
            &zara_site(),
            &zara_region(),
            &mut sink,
            &options,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ScraperError::Sink(_)));
    }

    #[tokio::test]
    async fn dead_session_ends_the_crawl() {
        let mut session = FakeSession::new();
        session.fail_navigation("browser crashed");
        let mut middleware = RenderMiddleware::new(
            Box::new(session),
            &ExtractorRegistry::builtin(),
            zara_site(),
            &zara_region(),
            Timing::instant(),
            1,
        );
        let mut sink = VecSink::default();

        let err = run_crawl(
            &mut middleware,
            &zara_site(),
            &zara_region(),
            &mut sink,
            &CrawlOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ScraperError::SessionFatal { .. }));
    }
}
