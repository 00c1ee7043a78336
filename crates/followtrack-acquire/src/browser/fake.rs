//! In-memory browser host that replays scripted pages, one per session.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{BrowserHost, BrowserSession, Location, SessionOptions};
use crate::error::AcquireError;

#[derive(Debug, Clone, Default)]
pub(crate) struct FakePage {
    pub html: String,
    pub landed_url: Option<String>,
    pub title: String,
    pub intercepted: Vec<Value>,
    pub navigation_error: Option<String>,
}

impl FakePage {
    pub fn html(html: &str) -> Self {
        Self {
            html: html.to_string(),
            ..Self::default()
        }
    }

    pub fn navigation_error(reason: &str) -> Self {
        Self {
            navigation_error: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn landed_on(mut self, url: &str) -> Self {
        self.landed_url = Some(url.to_string());
        self
    }

    pub fn titled(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_intercepted(mut self, body: Value) -> Self {
        self.intercepted.push(body);
        self
    }
}

#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
    released: AtomicUsize,
    humanized: AtomicUsize,
}

/// Each `open` consumes the next scripted page. When the script runs out the
/// last page is replayed.
pub(crate) struct ScriptedBrowser {
    pages: Mutex<VecDeque<FakePage>>,
    last: Mutex<Option<FakePage>>,
    visited: Arc<Mutex<Vec<String>>>,
    filters: Mutex<Vec<Option<String>>>,
    counters: Arc<Counters>,
}

impl ScriptedBrowser {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            last: Mutex::new(None),
            visited: Arc::new(Mutex::new(Vec::new())),
            filters: Mutex::new(Vec::new()),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    pub fn humanized(&self) -> usize {
        self.counters.humanized.load(Ordering::SeqCst)
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }

    pub fn filters(&self) -> Vec<Option<String>> {
        self.filters.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserHost for ScriptedBrowser {
    async fn open(&self, options: &SessionOptions) -> Result<Box<dyn BrowserSession>, AcquireError> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        self.filters
            .lock()
            .unwrap()
            .push(options.response_filter.clone());
        let page = {
            let mut pages = self.pages.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            match pages.pop_front() {
                Some(page) => {
                    *last = Some(page.clone());
                    page
                }
                None => last
                    .clone()
                    .ok_or_else(|| AcquireError::Browser("no scripted pages".to_string()))?,
            }
        };
        Ok(Box::new(FakeSession {
            page,
            url: String::new(),
            visited: Arc::clone(&self.visited),
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct FakeSession {
    page: FakePage,
    url: String,
    visited: Arc<Mutex<Vec<String>>>,
    counters: Arc<Counters>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn goto(&mut self, url: &str, _timeout: Duration) -> Result<(), AcquireError> {
        self.visited.lock().unwrap().push(url.to_string());
        if let Some(reason) = &self.page.navigation_error {
            return Err(AcquireError::Browser(reason.clone()));
        }
        self.url = self
            .page
            .landed_url
            .clone()
            .unwrap_or_else(|| url.to_string());
        Ok(())
    }

    async fn html(&self) -> Result<String, AcquireError> {
        Ok(self.page.html.clone())
    }

    async fn location(&self) -> Result<Location, AcquireError> {
        Ok(Location {
            url: self.url.clone(),
            title: self.page.title.clone(),
        })
    }

    async fn intercepted(&self) -> Vec<Value> {
        self.page.intercepted.clone()
    }

    async fn humanize(&mut self) -> Result<(), AcquireError> {
        self.counters.humanized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AcquireError> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}
