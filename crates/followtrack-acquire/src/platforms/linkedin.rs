//! Pieces shared by the three LinkedIn scrapers.

use std::sync::Arc;
use std::time::Duration;

use followtrack_core::AccountTarget;

use crate::browser::{render, BrowserHost, RenderRequest, RenderedPage, SessionOptions};
use crate::error::AcquireError;

const SIGN_IN_MARKERS: &[&str] = &[
    "Sign in to LinkedIn",
    "Join to view full profile",
    "Please log in",
    "Join now to see all activity",
];

const AUTH_WALL_PATHS: &[&str] = &["/authwall", "/login", "/signup"];

/// First sign-in wall marker present in the rendered markup.
pub(crate) fn sign_in_marker(html: &str) -> Option<&'static str> {
    SIGN_IN_MARKERS.iter().copied().find(|m| html.contains(m))
}

/// Auth-wall path the browser was redirected to, if any.
pub(crate) fn auth_wall_path(url: &str) -> Option<&'static str> {
    AUTH_WALL_PATHS.iter().copied().find(|p| url.contains(p))
}

/// Page URL of a LinkedIn target.
pub(crate) fn page_url(target: &AccountTarget) -> Result<&str, AcquireError> {
    target
        .id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            AcquireError::Configuration(format!("target '{}' has no page url", target.key))
        })
}

/// How one LinkedIn page is rendered.
#[derive(Clone)]
pub(crate) struct PageRenderer {
    pub host: Arc<dyn BrowserHost>,
    pub options: SessionOptions,
    pub timeout: Duration,
    pub settle: Duration,
    pub humanize: bool,
}

impl PageRenderer {
    pub(crate) fn new(host: Arc<dyn BrowserHost>, user_agent: Option<String>, timeout: Duration) -> Self {
        Self {
            host,
            options: SessionOptions {
                response_filter: None,
                user_agent,
            },
            timeout,
            settle: Duration::from_secs(3),
            humanize: false,
        }
    }

    /// Render `url` in a fresh session and reject auth-wall redirects and
    /// sign-in wall markup.
    pub(crate) async fn render(&self, url: &str) -> Result<RenderedPage, AcquireError> {
        self.render_with_settle(url, self.settle).await
    }

    pub(crate) async fn render_with_settle(
        &self,
        url: &str,
        settle: Duration,
    ) -> Result<RenderedPage, AcquireError> {
        let request = RenderRequest {
            url: url.to_string(),
            timeout: self.timeout,
            settle,
            humanize: self.humanize,
        };
        let page = render(self.host.as_ref(), &self.options, &request).await?;
        if let Some(path) = auth_wall_path(&page.url) {
            return Err(AcquireError::Blocked {
                marker: format!("redirected to {path}"),
            });
        }
        if let Some(marker) = sign_in_marker(&page.html) {
            return Err(AcquireError::Blocked {
                marker: marker.to_string(),
            });
        }
        Ok(page)
    }
}
