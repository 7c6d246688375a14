//! Browser rendering for GET requests.
//!
//! One browser is shared by every request of a run. It is launched on first
//! use, replaced after a failed navigation, and released once by
//! [`RenderFetcher::shutdown`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::transport::{Request, Response};
use crate::error::{CrawlError, Result};

/// A running rendering engine
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Navigate to `url` and return the rendered document
    async fn render(&self, url: &str) -> Result<String>;

    async fn close(&self);
}

/// Starts a [`RenderEngine`]
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    type Engine: RenderEngine + 'static;

    async fn launch(&self) -> Result<Self::Engine>;
}

/// Renders GET requests in a lazily launched, shared engine
pub struct RenderFetcher<L: EngineLauncher> {
    launcher: L,
    engine: Mutex<Option<Arc<L::Engine>>>,
    released: AtomicBool,
    navigation_timeout: Duration,
}

impl<L: EngineLauncher> RenderFetcher<L> {
    pub fn new(launcher: L, navigation_timeout: Duration) -> Self {
        Self {
            launcher,
            engine: Mutex::new(None),
            released: AtomicBool::new(false),
            navigation_timeout,
        }
    }

    /// Render `request`, or `None` when it must go over plain HTTP
    pub async fn process(&self, request: &Request) -> Option<Result<Response>> {
        if request.has_body() {
            return None;
        }
        Some(self.render(request.url()).await)
    }

    async fn render(&self, url: &str) -> Result<Response> {
        let engine = self.acquire().await?;

        let outcome = match tokio::time::timeout(self.navigation_timeout, engine.render(url)).await {
            Ok(result) => result,
            Err(_) => Err(CrawlError::rendering(
                url,
                format!("navigation timed out after {:?}", self.navigation_timeout),
            )),
        };

        match outcome {
            Ok(body) => Ok(Response {
                url: url.to_string(),
                body,
            }),
            Err(e) => {
                warn!(url, error = %e, "Rendering failed, discarding browser");
                self.invalidate(&engine).await;
                Err(match e {
                    CrawlError::Rendering { .. } => e,
                    other => CrawlError::rendering(url, other),
                })
            }
        }
    }

    /// Shared engine, launching it if none is running
    async fn acquire(&self) -> Result<Arc<L::Engine>> {
        let mut slot = self.engine.lock().await;
        if self.released.load(Ordering::SeqCst) {
            return Err(CrawlError::rendering("", "renderer already shut down"));
        }

        if let Some(engine) = slot.as_ref() {
            return Ok(Arc::clone(engine));
        }

        info!("Launching shared browser");
        let engine = Arc::new(self.launcher.launch().await?);
        *slot = Some(Arc::clone(&engine));
        Ok(engine)
    }

    /// Drop `failed` if it is still the shared engine
    async fn invalidate(&self, failed: &Arc<L::Engine>) {
        let stale = {
            let mut slot = self.engine.lock().await;
            match slot.as_ref() {
                Some(current) if Arc::ptr_eq(current, failed) => slot.take(),
                _ => None,
            }
        };

        if let Some(engine) = stale {
            engine.close().await;
        }
    }

    /// Release the shared engine; later calls are no-ops
    pub async fn shutdown(&self) {
        let mut slot = self.engine.lock().await;
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(engine) = slot.take() {
            info!("Closing shared browser");
            engine.close().await;
        }
    }
}
