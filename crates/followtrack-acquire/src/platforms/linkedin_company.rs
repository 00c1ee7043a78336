//! LinkedIn company pages: one fresh browser session per company, processed
//! in order with a short pause between companies.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use followtrack_core::{metric, AccountTarget, AcquisitionResult};
use regex::Regex;
use tokio_util::sync::CancellationToken;

use super::linkedin::{page_url, PageRenderer};
use super::{failure, source_tag, Acquirer};
use crate::browser::BrowserHost;
use crate::error::AcquireError;
use crate::extract::{compile, first_count};
use crate::retry::{retry_with_policy, sleep_or_cancel, Backoff, RetryPolicy};

static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(\d{1,3}(?:,\d{3})+|\d+)\s+followers",
        r"followerCount&quot;:(\d+)",
        r#"followerCount":(\d+)"#,
        r"(\d{1,3}(?:,\d{3})+|\d+)\s*follower",
    ])
});

pub struct LinkedinCompanyAcquirer {
    targets: Vec<AccountTarget>,
    renderer: PageRenderer,
    policy: RetryPolicy,
    pause: Duration,
}

impl LinkedinCompanyAcquirer {
    #[must_use]
    pub fn new(
        targets: Vec<AccountTarget>,
        host: Arc<dyn BrowserHost>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            targets,
            renderer: PageRenderer::new(host, user_agent, Duration::from_secs(120)),
            policy: RetryPolicy::new(Backoff::exponential(Duration::from_secs(5), 2)),
            pause: Duration::from_secs(2),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the post-navigation settle time and the pause between
    /// companies.
    #[must_use]
    pub fn with_timing(mut self, settle: Duration, pause: Duration) -> Self {
        self.renderer.settle = settle;
        self.pause = pause;
        self
    }

    async fn scrape(&self, url: &str, attempt: u32) -> Result<(u64, String), AcquireError> {
        let page = self.renderer.render(url).await?;
        let count = first_count(&page.html, &PATTERNS)
            .ok_or_else(|| AcquireError::NotFound(format!("no follower count on {url}")))?;
        Ok((count, source_tag("scrape", attempt)))
    }

    async fn acquire_one(&self, target: &AccountTarget, cancel: &CancellationToken) -> AcquisitionResult {
        let url = match page_url(target) {
            Ok(url) => url,
            Err(err) => return failure(target, &err, "scrape"),
        };
        tracing::info!(account = %target.key, %url, "scraping company page");
        match retry_with_policy(&self.policy, cancel, &target.key, |attempt| {
            self.scrape(url, attempt)
        })
        .await
        {
            Ok((count, source)) => {
                tracing::info!(account = %target.key, followers = count, "company followers found");
                AcquisitionResult::single(target, metric::FOLLOWERS, count, source)
            }
            Err(err) => failure(target, &err, "scrape"),
        }
    }
}

#[async_trait]
impl Acquirer for LinkedinCompanyAcquirer {
    fn name(&self) -> &'static str {
        "linkedin_company"
    }

    fn targets(&self) -> &[AccountTarget] {
        &self.targets
    }

    async fn acquire(&self, cancel: &CancellationToken) -> Vec<AcquisitionResult> {
        let mut results = Vec::with_capacity(self.targets.len());
        for (i, target) in self.targets.iter().enumerate() {
            if i > 0 {
                sleep_or_cancel(self.pause, cancel).await;
            }
            results.push(self.acquire_one(target, cancel).await);
        }
        results
    }
}
