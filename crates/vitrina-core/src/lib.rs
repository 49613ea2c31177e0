use thiserror::Error;

pub mod app_config;
pub mod config;
pub mod extraction;
pub mod price;
pub mod records;
pub mod sink;
pub mod sites;
pub mod text;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use extraction::{
    CategoryResult, ExtractionKind, ExtractionOutcome, ExtractionRequest, MenuResult, ProductData,
    ProductExtract,
};
pub use price::{normalize_price, select_price_pair, NormalizedPrice, PriceSelection};
pub use records::{HistoryRecord, ProductImage, ProductRecord, RawProduct};
pub use sink::{ItemSink, SinkError};
pub use sites::{load_sites, FallbackSelectors, LinkRules, RegionConfig, SiteConfig, SitesFile};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read site catalog at {path}: {source}")]
    SitesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse site catalog: {0}")]
    SitesFileParse(#[from] serde_yaml::Error),

    #[error("invalid site catalog: {0}")]
    Validation(String),
}
