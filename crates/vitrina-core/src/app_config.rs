use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub sites_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub browser_headless: bool,
    pub browser_user_agent: String,
    pub browser_wait_timeout_secs: u64,
    pub browser_settle_ms: u64,
    pub scroll_pause_ms: u64,
    pub max_scroll_attempts: u32,
    pub max_images_per_color: usize,
    pub inter_request_delay_ms: u64,
    pub max_consecutive_failures: u32,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("sites_path", &self.sites_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("browser_headless", &self.browser_headless)
            .field("browser_user_agent", &self.browser_user_agent)
            .field("browser_wait_timeout_secs", &self.browser_wait_timeout_secs)
            .field("browser_settle_ms", &self.browser_settle_ms)
            .field("scroll_pause_ms", &self.scroll_pause_ms)
            .field("max_scroll_attempts", &self.max_scroll_attempts)
            .field("max_images_per_color", &self.max_images_per_color)
            .field("inter_request_delay_ms", &self.inter_request_delay_ms)
            .field("max_consecutive_failures", &self.max_consecutive_failures)
            .finish()
    }
}
