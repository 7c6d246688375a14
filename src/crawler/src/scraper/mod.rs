//! Web scraper module for db.netkeiba.com
//!
//! Provides HTTP and browser transports, HTML parsing, and login.

pub mod auth;
pub mod browser;
pub mod extract;
pub mod historical;
pub mod render;
pub mod transport;

pub use browser::ChromiumLauncher;
pub use render::RenderFetcher;
pub use transport::{Fetcher, HttpClient};
