//! Error types for the crawler.

use thiserror::Error;

/// Crawler errors
#[derive(Debug, Error)]
pub enum CrawlError {
    /// A selector the page contract guarantees returned nothing
    #[error("Failed to parse {page}: {reason}")]
    Parse { page: String, reason: String },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rendering failed for {url}: {reason}")]
    Rendering { url: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CrawlError {
    pub fn parse(page: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            page: page.into(),
            reason: reason.into(),
        }
    }

    pub fn rendering(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Rendering {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;
