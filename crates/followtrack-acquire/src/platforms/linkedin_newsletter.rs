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
use crate::retry::{retry_with_policy, Backoff, RetryPolicy};

static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"([\d,]+)\s+followers",
        r"([\d,]+)\s+subscribers",
        r"subscribers&quot;:&quot;([\d,]+)&quot;",
        r"subscriberCount&quot;:&quot;([\d,]+)&quot;",
        r#"subscriberCount":"([\d,]+)""#,
        r#"followerCount":"([\d,]+)""#,
    ])
});

/// Newsletter subscriber counts, read from a public article page.
pub struct LinkedinNewsletterAcquirer {
    targets: Vec<AccountTarget>,
    renderer: PageRenderer,
    policy: RetryPolicy,
}

impl LinkedinNewsletterAcquirer {
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
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.renderer.settle = settle;
        self
    }

    async fn scrape(&self, url: &str, attempt: u32) -> Result<(u64, String), AcquireError> {
        let page = self.renderer.render(url).await?;
        let count = first_count(&page.html, &PATTERNS)
            .ok_or_else(|| AcquireError::NotFound(format!("no subscriber count on {url}")))?;
        Ok((count, source_tag("scrape", attempt)))
    }
}

#[async_trait]
impl Acquirer for LinkedinNewsletterAcquirer {
    fn name(&self) -> &'static str {
        "linkedin_newsletter"
    }

    fn targets(&self) -> &[AccountTarget] {
        &self.targets
    }

    async fn acquire(&self, cancel: &CancellationToken) -> Vec<AcquisitionResult> {
        let mut results = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            let url = match page_url(target) {
                Ok(url) => url,
                Err(err) => {
                    results.push(failure(target, &err, "scrape"));
                    continue;
                }
            };
            let outcome = retry_with_policy(&self.policy, cancel, &target.key, |attempt| {
                self.scrape(url, attempt)
            })
            .await;
            results.push(match outcome {
                Ok((count, source)) => {
                    tracing::info!(account = %target.key, subscribers = count, "newsletter subscribers found");
                    AcquisitionResult::single(target, metric::SUBSCRIBERS, count, source)
                }
                Err(err) => failure(target, &err, "scrape"),
            });
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use followtrack_core::{EntityKind, Platform, Status};

    use super::*;
    use crate::browser::fake::{FakePage, ScriptedBrowser};

    fn newsletter() -> AccountTarget {
        AccountTarget {
            key: "newsletter".to_string(),
            platform: Platform::Linkedin,
            kind: EntityKind::Newsletter,
            name: "Newsletter".to_string(),
            id: Some("https://www.linkedin.com/pulse/some-article".to_string()),
            window: None,
        }
    }

    fn acquirer(host: Arc<ScriptedBrowser>) -> LinkedinNewsletterAcquirer {
        LinkedinNewsletterAcquirer::new(vec![newsletter()], host, None)
            .with_settle(Duration::ZERO)
    }

    #[tokio::test(start_paused = true)]
    async fn reads_escaped_subscriber_count() {
        let html = "<code>{&quot;subscriberCount&quot;:&quot;41,250&quot;}</code>";
        let host = Arc::new(ScriptedBrowser::new(vec![FakePage::html(html)]));
        let results = acquirer(host).acquire(&CancellationToken::new()).await;
        assert_eq!(results[0].metric("subscribers"), Some(41_250));
        assert_eq!(results[0].source(), "scrape");
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_with_not_found_after_retries() {
        let host = Arc::new(ScriptedBrowser::new(vec![FakePage::html("<p>Read more</p>")]));
        let start = tokio::time::Instant::now();
        let results = acquirer(Arc::clone(&host))
            .acquire(&CancellationToken::new())
            .await;
        assert_eq!(results[0].status(), Status::NotFound);
        assert_eq!(host.opened(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(5 + 10));
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_sign_in_wall_gives_not_found() {
        let host = Arc::new(ScriptedBrowser::new(vec![FakePage::html(
            "<h1>Sign in to LinkedIn</h1><p>300 subscribers</p>",
        )]));
        let results = acquirer(Arc::clone(&host))
            .acquire(&CancellationToken::new())
            .await;
        assert_eq!(results[0].status(), Status::NotFound);
        assert!(results[0].reason().unwrap().contains("sign-in wall"));
        assert_eq!(host.opened(), 3);
    }
}
