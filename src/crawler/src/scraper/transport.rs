//! HTTP transport for db.netkeiba.com.
//!
//! Pages are served as EUC-JP; every body is decoded to UTF-8 here so the
//! parsers only ever see `&str`. GET requests can be routed through the
//! [`RenderFetcher`] instead of plain HTTP.

use std::time::Duration;

use async_trait::async_trait;
use encoding_rs::EUC_JP;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use tracing::debug;

use super::render::{EngineLauncher, RenderFetcher};
use crate::config::CrawlConfig;
use crate::error::{CrawlError, Result};
use crate::types::AuthCookieSet;

/// An outbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Get { url: String },
    PostForm { url: String, form: Vec<(String, String)> },
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Request::Get { url: url.into() }
    }

    pub fn post_form<K: Into<String>>(
        url: impl Into<String>,
        form: impl IntoIterator<Item = (K, String)>,
    ) -> Self {
        Request::PostForm {
            url: url.into(),
            form: form.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Request::Get { url } | Request::PostForm { url, .. } => url,
        }
    }

    /// Body-bearing requests are never rendered
    pub fn has_body(&self) -> bool {
        matches!(self, Request::PostForm { .. })
    }

    pub fn form_value(&self, name: &str) -> Option<&str> {
        match self {
            Request::Get { .. } => None,
            Request::PostForm { form, .. } => form
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
        }
    }
}

/// A decoded response body
#[derive(Debug, Clone)]
pub struct Response {
    pub url: String,
    pub body: String,
}

/// Anything that can turn a [`Request`] into a [`Response`]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// Plain HTTP client
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Create a client; `cookies` are sent on every request when given
    pub fn new(config: &CrawlConfig, cookies: Option<&AuthCookieSet>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(cookies) = cookies.filter(|c| !c.is_empty()) {
            let value = HeaderValue::from_str(&cookies.header_value())
                .map_err(|e| CrawlError::parse("cookie set", format!("not a valid Cookie header: {}", e)))?;
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let builder = match request {
            Request::Get { url } => self.client.get(url),
            Request::PostForm { url, form } => self.client.post(url).form(form),
        };

        let response = builder.send().await?.error_for_status()?;
        let url = response.url().to_string();
        let bytes = response.bytes().await?;

        Ok(Response {
            body: decode_euc_jp(&bytes, &url),
            url,
        })
    }
}

/// Decode an EUC-JP body, replacing malformed sequences
pub fn decode_euc_jp(bytes: &[u8], url: &str) -> String {
    let (text, _, had_errors) = EUC_JP.decode(bytes);
    if had_errors {
        debug!(url, "Body contained malformed EUC-JP sequences");
    }
    text.into_owned()
}

/// HTTP transport with optional browser rendering of GET requests
pub struct Fetcher<L: EngineLauncher> {
    http: HttpClient,
    renderer: Option<RenderFetcher<L>>,
}

impl<L: EngineLauncher> Fetcher<L> {
    pub fn new(http: HttpClient, renderer: Option<RenderFetcher<L>>) -> Self {
        Self { http, renderer }
    }

    /// Release the shared browser, if one was ever launched
    pub async fn shutdown(&self) {
        if let Some(renderer) = &self.renderer {
            renderer.shutdown().await;
        }
    }
}

#[async_trait]
impl<L: EngineLauncher> Transport for Fetcher<L> {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        if let Some(renderer) = &self.renderer {
            if let Some(rendered) = renderer.process(request).await {
                return rendered;
            }
        }
        self.http.fetch(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_accessors() {
        let get = Request::get("https://db.netkeiba.com/race/202406050811/");
        assert_eq!(get.url(), "https://db.netkeiba.com/race/202406050811/");
        assert!(!get.has_body());
        assert_eq!(get.form_value("pid"), None);

        let post = Request::post_form("https://db.netkeiba.com/", [("pid", "race_list".to_string())]);
        assert!(post.has_body());
        assert_eq!(post.form_value("pid"), Some("race_list"));
        assert_eq!(post.form_value("page"), None);
    }

    #[test]
    fn test_decode_euc_jp() {
        let (bytes, _, _) = EUC_JP.encode("有馬記念 芝2500m");
        assert_eq!(decode_euc_jp(&bytes, "test"), "有馬記念 芝2500m");
    }

    #[test]
    fn test_decode_malformed_bytes() {
        let text = decode_euc_jp(&[0x41, 0xff, 0x42], "test");
        assert!(text.starts_with('A'));
        assert!(text.ends_with('B'));
    }

    #[test]
    fn test_http_client_with_cookies() {
        let cookies = AuthCookieSet(vec![crate::types::Cookie {
            name: "nkauth".to_string(),
            value: "token".to_string(),
            domain: ".netkeiba.com".to_string(),
            path: "/".to_string(),
            expires: None,
            http_only: true,
            secure: true,
        }]);
        assert!(HttpClient::new(&CrawlConfig::default(), Some(&cookies)).is_ok());
    }

    #[test]
    fn test_http_client_rejects_unsendable_cookie() {
        let cookies = AuthCookieSet(vec![crate::types::Cookie {
            name: "nkauth".to_string(),
            value: "tok\nen".to_string(),
            domain: ".netkeiba.com".to_string(),
            path: "/".to_string(),
            expires: None,
            http_only: true,
            secure: true,
        }]);
        let err = HttpClient::new(&CrawlConfig::default(), Some(&cookies)).err().unwrap();
        assert!(matches!(err, CrawlError::Parse { .. }));
    }
}
