//! Login to netkeiba through a headless browser.
//!
//! The login form posts through JavaScript, so the session cookie is read
//! back from the browser after submitting it.

use async_trait::async_trait;
use chromiumoxide::page::Page;
use tracing::{info, warn};

use super::browser::Browser;
use crate::config::{RenderConfig, SiteConfig};
use crate::error::{CrawlError, Result};
use crate::types::{AuthCookieSet, Cookie};

/// Cookie netkeiba sets only for an authenticated session
pub const AUTH_COOKIE: &str = "nkauth";

const LOGIN_ID_FIELD: &str = r#"input[name="login_id"]"#;
const PASSWORD_FIELD: &str = r#"input[name="pswd"]"#;
const SUBMIT_BUTTON: &str = r#"input[alt="ログイン"]"#;

/// Login credentials
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// Browser session able to drive a login form
#[async_trait]
pub trait LoginSession: Send {
    async fn open(&mut self, url: &str) -> Result<()>;

    async fn fill(&mut self, selector: &str, value: &str) -> Result<()>;

    /// Click `selector` and wait for the resulting navigation
    async fn submit(&mut self, selector: &str) -> Result<()>;

    async fn cookies(&mut self) -> Result<AuthCookieSet>;

    async fn close(&mut self);
}

/// Log in with `session` and return its cookie jar.
///
/// The session is closed before returning, whether or not login succeeded.
pub async fn login<S: LoginSession>(
    mut session: S,
    login_url: &str,
    credentials: &Credentials,
) -> Result<AuthCookieSet> {
    let cookies = drive_login_form(&mut session, login_url, credentials).await;
    session.close().await;

    let cookies = cookies?;
    if !cookies.contains(AUTH_COOKIE) {
        warn!(email = %credentials.email, "Login did not yield an auth cookie");
        return Err(CrawlError::Authentication(
            "Failed to login to netkeiba".to_string(),
        ));
    }

    info!(cookies = cookies.0.len(), "Logged in to netkeiba");
    Ok(cookies)
}

async fn drive_login_form<S: LoginSession>(
    session: &mut S,
    login_url: &str,
    credentials: &Credentials,
) -> Result<AuthCookieSet> {
    session.open(login_url).await?;
    session.fill(LOGIN_ID_FIELD, &credentials.email).await?;
    session.fill(PASSWORD_FIELD, &credentials.password).await?;
    session.submit(SUBMIT_BUTTON).await?;
    session.cookies().await
}

/// Log in with a dedicated headless Chrome
pub async fn login_with_chrome(
    site: &SiteConfig,
    render: &RenderConfig,
    credentials: &Credentials,
) -> Result<AuthCookieSet> {
    let session = ChromiumLoginSession {
        browser: Browser::launch(render).await?,
        page: None,
    };
    login(session, &site.login_url, credentials).await
}

/// [`LoginSession`] backed by its own Chrome process
pub struct ChromiumLoginSession {
    browser: Browser,
    page: Option<Page>,
}

impl ChromiumLoginSession {
    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| CrawlError::Authentication("Login page not opened".to_string()))
    }
}

fn step_error(step: &str, e: impl std::fmt::Display) -> CrawlError {
    CrawlError::Authentication(format!("{}: {}", step, e))
}

#[async_trait]
impl LoginSession for ChromiumLoginSession {
    async fn open(&mut self, url: &str) -> Result<()> {
        self.page = Some(self.browser.open(url).await?);
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<()> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|e| step_error(selector, e))?;
        element.click().await.map_err(|e| step_error(selector, e))?;
        element.type_str(value).await.map_err(|e| step_error(selector, e))?;
        Ok(())
    }

    async fn submit(&mut self, selector: &str) -> Result<()> {
        let page = self.page()?;
        page.find_element(selector)
            .await
            .map_err(|e| step_error(selector, e))?
            .click()
            .await
            .map_err(|e| step_error(selector, e))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| step_error("navigation after submit", e))?;
        Ok(())
    }

    async fn cookies(&mut self) -> Result<AuthCookieSet> {
        let cookies = self
            .page()?
            .get_cookies()
            .await
            .map_err(|e| step_error("reading cookies", e))?;

        Ok(AuthCookieSet(
            cookies
                .into_iter()
                .map(|c| Cookie {
                    expires: (!c.session).then_some(c.expires),
                    name: c.name,
                    value: c.value,
                    domain: c.domain,
                    path: c.path,
                    http_only: c.http_only,
                    secure: c.secure,
                })
                .collect(),
        ))
    }

    async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }
        self.browser.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    struct FakeSession {
        cookies: Vec<&'static str>,
        fail_on_submit: bool,
        filled: Arc<Mutex<Vec<(String, String)>>>,
        closed: Arc<AtomicBool>,
    }

    impl FakeSession {
        fn new(cookies: Vec<&'static str>) -> (Self, Arc<AtomicBool>) {
            let closed = Arc::new(AtomicBool::new(false));
            (
                Self {
                    cookies,
                    fail_on_submit: false,
                    filled: Arc::new(Mutex::new(Vec::new())),
                    closed: Arc::clone(&closed),
                },
                closed,
            )
        }
    }

    #[async_trait]
    impl LoginSession for FakeSession {
        async fn open(&mut self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn fill(&mut self, selector: &str, value: &str) -> Result<()> {
            self.filled
                .lock()
                .unwrap()
                .push((selector.to_string(), value.to_string()));
            Ok(())
        }

        async fn submit(&mut self, _selector: &str) -> Result<()> {
            if self.fail_on_submit {
                return Err(CrawlError::rendering("login", "browser crashed"));
            }
            Ok(())
        }

        async fn cookies(&mut self) -> Result<AuthCookieSet> {
            Ok(AuthCookieSet(
                self.cookies
                    .iter()
                    .map(|name| Cookie {
                        name: name.to_string(),
                        value: "v".to_string(),
                        domain: ".netkeiba.com".to_string(),
                        path: "/".to_string(),
                        expires: None,
                        http_only: false,
                        secure: true,
                    })
                    .collect(),
            ))
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            email: "user@example.com".to_string(),
            password: "secret".to_string(),
        }
    }

    const LOGIN_URL: &str = "https://regist.netkeiba.com/account/?pid=login";

    #[tokio::test]
    async fn test_login_success_closes_session() {
        let (session, closed) = FakeSession::new(vec!["netkeiba", AUTH_COOKIE]);
        let filled = Arc::clone(&session.filled);

        let cookies = login(session, LOGIN_URL, &credentials()).await.unwrap();

        assert_eq!(cookies.0.len(), 2);
        assert!(cookies.contains(AUTH_COOKIE));
        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(
            *filled.lock().unwrap(),
            vec![
                (LOGIN_ID_FIELD.to_string(), "user@example.com".to_string()),
                (PASSWORD_FIELD.to_string(), "secret".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_login_without_auth_cookie_fails() {
        let (session, closed) = FakeSession::new(vec!["netkeiba"]);

        let err = login(session, LOGIN_URL, &credentials()).await.unwrap_err();

        assert!(matches!(err, CrawlError::Authentication(_)));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_browser_failure_still_closes_session() {
        let (mut session, closed) = FakeSession::new(vec![AUTH_COOKIE]);
        session.fail_on_submit = true;

        let err = login(session, LOGIN_URL, &credentials()).await.unwrap_err();

        assert!(matches!(err, CrawlError::Rendering { .. }));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let debug = format!("{:?}", credentials());
        assert!(debug.contains("user@example.com"));
        assert!(!debug.contains("secret"));
    }
}
