//! Chromium host built on chromiumoxide. Each session launches its own
//! browser process so no cookies or fingerprints leak between acquirers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, GetResponseBodyParams, RequestId,
};
use chromiumoxide::layout::Point;
use chromiumoxide::page::Page;
use futures::StreamExt;
use rand::Rng;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{BrowserHost, BrowserSession, Location, SessionOptions};
use crate::error::AcquireError;

#[derive(Debug, Clone)]
pub struct ChromiumBrowser {
    headless: bool,
    chrome_path: Option<PathBuf>,
}

impl ChromiumBrowser {
    #[must_use]
    pub fn new(headless: bool, chrome_path: Option<PathBuf>) -> Self {
        Self {
            headless,
            chrome_path,
        }
    }

    fn config(&self, options: &SessionOptions) -> Result<BrowserConfig, AcquireError> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--no-sandbox")
            .arg("--window-size=1920,1080");
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if let Some(ua) = &options.user_agent {
            builder = builder.arg(format!("--user-agent={ua}"));
        }
        builder
            .build()
            .map_err(|e| AcquireError::Browser(format!("failed to build browser config: {e}")))
    }
}

#[async_trait]
impl BrowserHost for ChromiumBrowser {
    async fn open(&self, options: &SessionOptions) -> Result<Box<dyn BrowserSession>, AcquireError> {
        let config = self.config(options)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AcquireError::Browser(format!("failed to launch Chromium: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(AcquireError::Browser(format!("failed to create page: {e}")));
            }
        };

        let matched = Arc::new(Mutex::new(Vec::new()));
        let listener = match &options.response_filter {
            Some(filter) => Some(listen_for_responses(&page, filter.clone(), Arc::clone(&matched)).await?),
            None => None,
        };

        Ok(Box::new(ChromiumSession {
            browser: Some(browser),
            page,
            handler,
            listener,
            matched,
        }))
    }
}

/// Record request ids of successful responses whose URL contains `filter`.
/// Bodies are fetched lazily once the page has settled.
async fn listen_for_responses(
    page: &Page,
    filter: String,
    matched: Arc<Mutex<Vec<RequestId>>>,
) -> Result<JoinHandle<()>, AcquireError> {
    page.execute(EnableParams::default())
        .await
        .map_err(|e| AcquireError::Browser(format!("failed to enable network domain: {e}")))?;
    let mut events = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(|e| AcquireError::Browser(format!("failed to listen for responses: {e}")))?;

    Ok(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if event.response.status == 200 && event.response.url.contains(&filter) {
                tracing::debug!(url = %event.response.url, "captured matching response");
                matched.lock().await.push(event.request_id.clone());
            }
        }
    }))
}

pub struct ChromiumSession {
    browser: Option<Browser>,
    page: Page,
    handler: JoinHandle<()>,
    listener: Option<JoinHandle<()>>,
    matched: Arc<Mutex<Vec<RequestId>>>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), AcquireError> {
        let started = tokio::time::Instant::now();
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {
                let remaining = timeout.saturating_sub(started.elapsed());
                match tokio::time::timeout(remaining, self.page.wait_for_navigation()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::debug!(%url, error = %e, "waiting for navigation failed"),
                    Err(_) => tracing::debug!(%url, "navigation did not settle before the timeout"),
                }
                Ok(())
            }
            Ok(Err(e)) => Err(AcquireError::Browser(format!("navigation failed: {e}"))),
            Err(_) => Err(AcquireError::Transient(format!(
                "navigation to {url} timed out after {}s",
                timeout.as_secs()
            ))),
        }
    }

    async fn html(&self) -> Result<String, AcquireError> {
        self.page
            .content()
            .await
            .map_err(|e| AcquireError::Browser(format!("failed to read page content: {e}")))
    }

    async fn location(&self) -> Result<Location, AcquireError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| AcquireError::Browser(format!("failed to read page url: {e}")))?
            .unwrap_or_default();
        let title = self
            .page
            .get_title()
            .await
            .map_err(|e| AcquireError::Browser(format!("failed to read page title: {e}")))?
            .unwrap_or_default();
        Ok(Location { url, title })
    }

    async fn intercepted(&self) -> Vec<Value> {
        let ids = self.matched.lock().await.clone();
        let mut bodies = Vec::new();
        for id in ids {
            let body = match self.page.execute(GetResponseBodyParams::new(id)).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!(error = %e, "response body unavailable");
                    continue;
                }
            };
            if body.base64_encoded {
                continue;
            }
            match serde_json::from_str::<Value>(&body.body) {
                Ok(value) => bodies.push(value),
                Err(e) => tracing::debug!(error = %e, "intercepted body is not JSON"),
            }
        }
        bodies
    }

    async fn humanize(&mut self) -> Result<(), AcquireError> {
        let moves = rand::rng().random_range(3..=5);
        for _ in 0..moves {
            let (x, y, pause) = {
                let mut rng = rand::rng();
                (
                    rng.random_range(100.0..800.0),
                    rng.random_range(100.0..600.0),
                    rng.random_range(200..=800),
                )
            };
            self.page
                .move_mouse(Point::new(x, y))
                .await
                .map_err(|e| AcquireError::Browser(format!("mouse move failed: {e}")))?;
            tokio::time::sleep(Duration::from_millis(pause)).await;
        }

        let scrolls = rand::rng().random_range(3..=5);
        for _ in 0..scrolls {
            let (dy, pause) = {
                let mut rng = rand::rng();
                (rng.random_range(200..=600), rng.random_range(300..=1000))
            };
            self.page
                .evaluate(format!("window.scrollBy(0, {dy})"))
                .await
                .map_err(|e| AcquireError::Browser(format!("scroll failed: {e}")))?;
            tokio::time::sleep(Duration::from_millis(pause)).await;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AcquireError> {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        if let Some(mut browser) = self.browser.take() {
            let closed = browser.close().await;
            let _ = browser.wait().await;
            self.handler.abort();
            closed.map_err(|e| AcquireError::Browser(format!("failed to close browser: {e}")))?;
        }
        Ok(())
    }

    fn release(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        self.handler.abort();
        // Dropping the browser kills its child process.
        self.browser.take();
    }
}
