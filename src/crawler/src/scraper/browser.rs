//! Browser automation using chromiumoxide.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser as ChromeBrowser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::render::{EngineLauncher, RenderEngine};
use crate::config::RenderConfig;
use crate::error::{CrawlError, Result};

/// Browser wrapper for web scraping
pub struct Browser {
    // Pages open through a shared borrow; closing needs the write half
    browser: RwLock<ChromeBrowser>,
    handle: JoinHandle<()>,
    settle: tokio::time::Duration,
}

impl Browser {
    /// Launch a new headless browser instance
    pub async fn launch(config: &RenderConfig) -> Result<Self> {
        let chrome_path = config.chrome_path.clone().unwrap_or_else(|| {
            if cfg!(target_os = "macos") {
                "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome".to_string()
            } else if cfg!(target_os = "windows") {
                "C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe".to_string()
            } else {
                "google-chrome".to_string()
            }
        });

        let browser_config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .no_sandbox()
            .disable_default_args()
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--mute-audio")
            .window_size(1920, 1080)
            .build()
            .map_err(|e| CrawlError::rendering("", format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = ChromeBrowser::launch(browser_config)
            .await
            .map_err(|e| CrawlError::rendering("", format!("Failed to launch browser: {}", e)))?;

        // Handler task must keep running for the browser to work
        let handle = tokio::spawn(async move {
            loop {
                match handler.next().await {
                    Some(Ok(_)) => continue,
                    Some(Err(_)) => continue,
                    None => break,
                }
            }
        });

        Ok(Self {
            browser: RwLock::new(browser),
            handle,
            settle: tokio::time::Duration::from_millis(config.settle_millis),
        })
    }

    /// Open a tab on `url`
    pub async fn open(&self, url: &str) -> Result<Page> {
        self.browser
            .read()
            .await
            .new_page(url)
            .await
            .map_err(|e| CrawlError::rendering(url, format!("Failed to create new page: {}", e)))
    }

    /// Fetch page content with JavaScript rendering
    pub async fn fetch_page(&self, url: &str) -> Result<String> {
        let page = self.open(url).await?;

        // Let late scripts finish touching the DOM
        tokio::time::sleep(self.settle).await;

        let html = page
            .content()
            .await
            .map_err(|e| CrawlError::rendering(url, format!("Failed to get page content: {}", e)));

        let _ = page.close().await;

        html
    }

    /// Close the browser
    pub async fn close(&self) {
        let mut browser = self.browser.write().await;
        let _ = browser.close().await;
        let _ = browser.wait().await;
        self.handle.abort();
    }
}

#[async_trait]
impl RenderEngine for Browser {
    async fn render(&self, url: &str) -> Result<String> {
        self.fetch_page(url).await
    }

    async fn close(&self) {
        Browser::close(self).await;
    }
}

/// Launches headless Chrome for the shared renderer
pub struct ChromiumLauncher {
    config: RenderConfig,
}

impl ChromiumLauncher {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EngineLauncher for ChromiumLauncher {
    type Engine = Browser;

    async fn launch(&self) -> Result<Browser> {
        Browser::launch(&self.config).await
    }
}
