//! Configuration for the crawler.

use serde::{Deserialize, Serialize};

/// Site endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_db_url")]
    pub db_url: String,
    #[serde(default = "default_login_url")]
    pub login_url: String,
}

fn default_db_url() -> String {
    "https://db.netkeiba.com".to_string()
}

fn default_login_url() -> String {
    "https://regist.netkeiba.com/account/?pid=login".to_string()
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            db_url: default_db_url(),
            login_url: default_login_url(),
        }
    }
}

/// Crawl configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Races per listing page (`list` form field)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Race pages fetched at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_page_size() -> u32 {
    20
}

fn default_concurrency() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Headless browser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Render race pages in Chrome instead of plain HTTP
    #[serde(default)]
    pub enabled: bool,
    /// Chrome executable; platform default when unset
    #[serde(default)]
    pub chrome_path: Option<String>,
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,
    /// Wait after load before reading the DOM
    #[serde(default = "default_settle_millis")]
    pub settle_millis: u64,
}

fn default_navigation_timeout_secs() -> u64 {
    60
}

fn default_settle_millis() -> u64 {
    1500
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            chrome_path: None,
            navigation_timeout_secs: default_navigation_timeout_secs(),
            settle_millis: default_settle_millis(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON lines file; stdout when unset
    #[serde(default)]
    pub path: Option<String>,
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl AppConfig {
    /// Load configuration from environment and config file
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file if exists
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables (NETKEIBA_CRAWL__PAGE_SIZE, etc.)
            .add_source(
                config::Environment::with_prefix("NETKEIBA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
