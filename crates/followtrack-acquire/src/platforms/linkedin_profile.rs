//! LinkedIn personal profile.
//!
//! Each attempt renders one URL variant of the profile, rotating through the
//! variants so consecutive attempts do not hit the same block page. Three
//! extraction strategies run in order: page-content patterns, embedded
//! script data, and a scan of known follower elements.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use followtrack_core::{metric, AccountTarget, AcquisitionResult};
use rand::Rng;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use super::linkedin::{page_url, PageRenderer};
use super::{failure, source_tag, Acquirer};
use crate::browser::BrowserHost;
use crate::error::AcquireError;
use crate::extract::{compile, element_text_count, first_count, script_bodies};
use crate::retry::{retry_with_policy, Backoff, RetryPolicy};

static CONTENT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r#""name":"Follows","userInteractionCount":(\d+)"#,
        r#"followerCount":(\d+)"#,
        r#""followerCount":(\d+)"#,
        r"(\d{1,3}(?:,\d{3})+|\d+)\s+followers",
        r"(\d{1,3}(?:,\d{3})+|\d+)\s+Followers",
        r">(\d{1,3}(?:,\d{3})+|\d+)</span>\s*<span>followers",
        r#"follower[s]?" ?:? ?["']?(\d{1,3}(?:,\d{3})+|\d+)"#,
    ])
});

static SCRIPT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r#""followerCount":(\d+)"#,
        r#""Follows","userInteractionCount":(\d+)"#,
    ])
});

static ELEMENT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,3}(?:,\d{3})+|\d+)").expect("valid regex"));

const FOLLOWER_SELECTORS: &[&str] = &[
    ".pv-top-card--list-bullet li.text-body-small",
    ".pvs-list__item--with-border span.t-black--light",
    "[data-test-id='follower-count']",
    "span.link-without-visited-state--is-touched",
    "div.ph5 ul.mt2 li.inline-block",
    "ul.pv-top-card--list-bullet li",
    "span.t-bold",
    "span.t-black--light",
    "span.inline-block",
];

/// Profile URL followed by the variants tried on later attempts.
#[must_use]
pub fn url_variants(base: &str) -> Vec<String> {
    let base = base.trim_end_matches('/');
    vec![
        base.to_string(),
        format!("{base}/"),
        format!("{base}/details/recent-activity/"),
        format!("{base}/about/"),
    ]
}

/// Run the extraction strategies over rendered profile markup.
#[must_use]
pub fn extract_followers(html: &str) -> Option<u64> {
    first_count(html, &CONTENT_PATTERNS)
        .or_else(|| {
            script_bodies(html, "followerCount")
                .iter()
                .find_map(|body| first_count(body, &SCRIPT_PATTERNS))
        })
        .or_else(|| element_text_count(html, FOLLOWER_SELECTORS, "follower", &ELEMENT_NUMBER))
}

pub struct LinkedinProfileAcquirer {
    targets: Vec<AccountTarget>,
    renderer: PageRenderer,
    policy: RetryPolicy,
    settle: (Duration, Duration),
}

impl LinkedinProfileAcquirer {
    #[must_use]
    pub fn new(
        targets: Vec<AccountTarget>,
        host: Arc<dyn BrowserHost>,
        user_agent: Option<String>,
        humanize: bool,
    ) -> Self {
        let mut renderer = PageRenderer::new(host, user_agent, Duration::from_secs(90));
        renderer.humanize = humanize;
        Self {
            targets,
            renderer,
            policy: RetryPolicy::new(Backoff::Exponential {
                base: Duration::from_secs(2),
                max_retries: 4,
                jitter: Some((Duration::from_secs(1), Duration::from_secs(5))),
                cap: None,
            }),
            settle: (Duration::from_secs(1), Duration::from_secs(3)),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Range the post-navigation settle time is drawn from.
    #[must_use]
    pub fn with_settle(mut self, min: Duration, max: Duration) -> Self {
        self.settle = (min, max);
        self
    }

    fn settle(&self) -> Duration {
        let (lo, hi) = self.settle;
        if hi > lo {
            rand::rng().random_range(lo..=hi)
        } else {
            lo
        }
    }

    async fn scrape(&self, variants: &[String], attempt: u32) -> Result<(u64, String), AcquireError> {
        let url = &variants[attempt as usize % variants.len()];
        tracing::debug!(%url, attempt, "rendering profile variant");
        let page = self.renderer.render_with_settle(url, self.settle()).await?;
        let count = extract_followers(&page.html)
            .ok_or_else(|| AcquireError::NotFound(format!("no follower count on {url}")))?;
        Ok((count, source_tag("scrape", attempt)))
    }
}

#[async_trait]
impl Acquirer for LinkedinProfileAcquirer {
    fn name(&self) -> &'static str {
        "linkedin_profile"
    }

    fn targets(&self) -> &[AccountTarget] {
        &self.targets
    }

    async fn acquire(&self, cancel: &CancellationToken) -> Vec<AcquisitionResult> {
        let mut results = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            let variants = match page_url(target) {
                Ok(url) => url_variants(url),
                Err(err) => {
                    results.push(failure(target, &err, "scrape"));
                    continue;
                }
            };
            let outcome = retry_with_policy(&self.policy, cancel, &target.key, |attempt| {
                self.scrape(&variants, attempt)
            })
            .await;
            results.push(match outcome {
                Ok((count, source)) => {
                    tracing::info!(account = %target.key, followers = count, "profile followers found");
                    AcquisitionResult::single(target, metric::FOLLOWERS, count, source)
                }
                Err(err) => failure(target, &err, "scrape"),
            });
        }
        results
    }
}
