pub mod crawl;
pub mod error;
pub mod extract;
pub mod image;
pub mod listing;
pub mod render;
pub mod session;

pub use crawl::{run_crawl, CrawlOptions, CrawlStats};
pub use error::{BrowserError, ScraperError};
pub use extract::{ExtractorRegistry, SiteExtractor, Timing};
pub use render::{RenderMiddleware, RenderedResponse};
pub use session::{BrowserSession, ElementSnapshot, Locator};
