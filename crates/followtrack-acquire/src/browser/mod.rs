//! Browser automation boundary used by the scrape acquirers.
//!
//! A [`BrowserHost`] opens isolated [`BrowserSession`]s. Acquirers only need
//! the rendered HTML, the landed location, and the JSON bodies of network
//! responses whose URL contains a filter substring. [`render`] wraps one
//! session in a [`SessionGuard`] so it is released on every exit path.

#[cfg(feature = "chromium")]
pub mod chromium;
#[cfg(test)]
pub(crate) mod fake;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AcquireError;

/// Per-session settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Capture JSON bodies of responses whose URL contains this substring.
    pub response_filter: Option<String>,
    pub user_agent: Option<String>,
}

/// Where the session landed after navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub url: String,
    pub title: String,
}

/// A browser engine that can open isolated sessions.
#[async_trait]
pub trait BrowserHost: Send + Sync {
    async fn open(&self, options: &SessionOptions) -> Result<Box<dyn BrowserSession>, AcquireError>;
}

/// A single isolated browsing context.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), AcquireError>;
    async fn html(&self) -> Result<String, AcquireError>;
    async fn location(&self) -> Result<Location, AcquireError>;
    /// JSON bodies captured so far for the session's response filter.
    async fn intercepted(&self) -> Vec<Value>;
    /// Pointer movement and scrolling. Has no effect on extracted data.
    async fn humanize(&mut self) -> Result<(), AcquireError> {
        Ok(())
    }
    async fn close(&mut self) -> Result<(), AcquireError>;
    /// Synchronous best-effort teardown for paths that cannot await.
    fn release(&mut self);
}

/// Owns a session and releases it on drop unless it was closed.
pub struct SessionGuard {
    session: Option<Box<dyn BrowserSession>>,
}

impl SessionGuard {
    #[must_use]
    pub fn new(session: Box<dyn BrowserSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    /// # Errors
    ///
    /// Returns [`AcquireError::Browser`] if the session was already closed.
    pub fn session(&mut self) -> Result<&mut (dyn BrowserSession + 'static), AcquireError> {
        self.session
            .as_deref_mut()
            .ok_or_else(|| AcquireError::Browser("session already closed".to_string()))
    }

    /// Close the session gracefully.
    ///
    /// # Errors
    ///
    /// Propagates the session's close error. The session is released either way.
    pub async fn close(mut self) -> Result<(), AcquireError> {
        match self.session.take() {
            Some(mut session) => {
                let result = session.close().await;
                if result.is_err() {
                    session.release();
                }
                result
            }
            None => Ok(()),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.release();
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub url: String,
    pub timeout: Duration,
    /// Wait after navigation so client-side rendering and XHRs can finish.
    pub settle: Duration,
    pub humanize: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    pub html: String,
    pub url: String,
    pub title: String,
    pub intercepted: Vec<Value>,
}

/// Open a fresh session, navigate, and collect the page.
///
/// # Errors
///
/// Returns [`AcquireError::Browser`] or a navigation timeout from the host.
/// The session is released on every path.
pub async fn render(
    host: &dyn BrowserHost,
    options: &SessionOptions,
    request: &RenderRequest,
) -> Result<RenderedPage, AcquireError> {
    let mut guard = SessionGuard::new(host.open(options).await?);

    let page = {
        let session = guard.session()?;
        session.goto(&request.url, request.timeout).await?;
        if request.humanize {
            if let Err(err) = session.humanize().await {
                tracing::debug!(url = %request.url, error = %err, "humanize step failed");
            }
        }
        tokio::time::sleep(request.settle).await;

        let html = session.html().await?;
        let location = session.location().await?;
        RenderedPage {
            html,
            url: location.url,
            title: location.title,
            intercepted: session.intercepted().await,
        }
    };

    if let Err(err) = guard.close().await {
        tracing::debug!(url = %request.url, error = %err, "browser session close failed");
    }
    Ok(page)
}

/// Host used when no browser backend is compiled in.
pub struct NoopBrowser;

#[async_trait]
impl BrowserHost for NoopBrowser {
    async fn open(&self, _options: &SessionOptions) -> Result<Box<dyn BrowserSession>, AcquireError> {
        Err(AcquireError::Browser(
            "no browser backend available (build with the `chromium` feature)".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{FakePage, ScriptedBrowser};
    use super::*;

    fn request(url: &str) -> RenderRequest {
        RenderRequest {
            url: url.to_string(),
            timeout: Duration::from_secs(1),
            settle: Duration::ZERO,
            humanize: true,
        }
    }

    #[tokio::test]
    async fn render_collects_page_and_closes_session() {
        let host = ScriptedBrowser::new(vec![FakePage::html("<p>42 followers</p>")]);
        let page = render(&host, &SessionOptions::default(), &request("https://a.example"))
            .await
            .unwrap();
        assert!(page.html.contains("42 followers"));
        assert_eq!(page.url, "https://a.example");
        assert_eq!(host.closed(), 1);
        assert_eq!(host.released(), 0);
        assert_eq!(host.humanized(), 1);
    }

    #[tokio::test]
    async fn failed_navigation_releases_session() {
        let host = ScriptedBrowser::new(vec![FakePage::navigation_error("timed out")]);
        let result = render(&host, &SessionOptions::default(), &request("https://a.example")).await;
        assert!(matches!(result, Err(AcquireError::Browser(_))));
        assert_eq!(host.closed(), 0);
        assert_eq!(host.released(), 1);
    }

    #[tokio::test]
    async fn noop_browser_refuses_to_open() {
        let result = NoopBrowser.open(&SessionOptions::default()).await;
        assert!(matches!(result, Err(AcquireError::Browser(_))));
    }
}
