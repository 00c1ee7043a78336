use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};
use followtrack_core::{metric, AccountTarget, AcquisitionResult, KitWindow};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{failure, source_tag, Acquirer};
use crate::error::AcquireError;
use crate::http::{read_json, unexpected_status};
use crate::retry::{retry_with_policy, Backoff, RetryPolicy, RATE_LIMIT_COOLDOWN};

const COUNTERS: [&str; 4] = [
    metric::SUBSCRIBERS,
    metric::CANCELLATIONS,
    metric::NET_NEW_SUBSCRIBERS,
    metric::NEW_SUBSCRIBERS,
];

/// Reporting day: now shifted to UTC+01:00.
fn reporting_day(now: DateTime<Utc>) -> NaiveDate {
    let offset = FixedOffset::east_opt(3600).expect("valid offset");
    now.with_timezone(&offset).date_naive()
}

/// `starting` and `ending` query values for `window`.
///
/// Daily covers yesterday, weekly the trailing seven days ending yesterday,
/// monthly the trailing thirty days ending yesterday.
#[must_use]
pub fn window_bounds(window: KitWindow, now: DateTime<Utc>) -> (String, String) {
    let today = reporting_day(now);
    let days_back = match window {
        KitWindow::Daily => 1,
        KitWindow::Weekly => 7,
        KitWindow::Monthly => 30,
    };
    let start = today - Days::new(days_back);
    let end = today - Days::new(1);
    (
        start.format("%Y-%m-%dT00:00:00+01:00").to_string(),
        end.format("%Y-%m-%dT23:59:59+01:00").to_string(),
    )
}

/// Subscriber growth stats from the Kit v4 API, one pull per window target.
pub struct KitAcquirer {
    targets: Vec<AccountTarget>,
    client: Client,
    base_url: String,
    api_key: Option<String>,
    policy: RetryPolicy,
}

impl KitAcquirer {
    #[must_use]
    pub fn new(
        targets: Vec<AccountTarget>,
        client: Client,
        base_url: &str,
        api_key: Option<String>,
    ) -> Self {
        Self {
            targets,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            policy: RetryPolicy::new(Backoff::exponential(Duration::from_secs(2), 3))
                .with_rate_limit_cooldown(RATE_LIMIT_COOLDOWN),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fetch the four growth counters for `window`, anchored at `now`.
    ///
    /// # Errors
    ///
    /// - [`AcquireError::Configuration`] if no API key is configured.
    /// - [`AcquireError::RateLimited`] on HTTP 429.
    /// - [`AcquireError::UnexpectedStatus`] on any other non-200 status.
    /// - [`AcquireError::NotFound`] if the response has no `stats` object.
    ///
    /// Counters missing from `stats` read as 0. Counters present with a value
    /// that is not a non-negative integer are left out.
    pub async fn fetch_stats(
        &self,
        window: KitWindow,
        now: DateTime<Utc>,
    ) -> Result<BTreeMap<String, u64>, AcquireError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AcquireError::Configuration("KIT_V4_API_KEY is not set".to_string()))?;
        let (starting, ending) = window_bounds(window, now);
        tracing::debug!(%window, %starting, %ending, "fetching kit growth stats");

        let response = self
            .client
            .get(format!("{}/v4/account/growth_stats", self.base_url))
            .header("Accept", "application/json")
            .header("X-Kit-Api-Key", key)
            .query(&[("starting", starting.as_str()), ("ending", ending.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(AcquireError::RateLimited {
                platform: "kit".to_string(),
                detail: "HTTP 429".to_string(),
            });
        }
        if response.status() != StatusCode::OK {
            return Err(unexpected_status(&response));
        }

        let body = read_json(response, "kit growth_stats").await?;
        let stats = body
            .get("stats")
            .and_then(Value::as_object)
            .ok_or_else(|| AcquireError::NotFound(format!("no stats for {window} window")))?;

        let mut counters = BTreeMap::new();
        for name in COUNTERS {
            match stats.get(name) {
                None => {
                    counters.insert(name.to_string(), 0);
                }
                Some(value) => match counter_value(value) {
                    Some(n) => {
                        counters.insert(name.to_string(), n);
                    }
                    None => {
                        tracing::warn!(%window, counter = name, %value, "dropping unusable kit counter");
                    }
                },
            }
        }
        Ok(counters)
    }
}

/// A reported counter. Negative, fractional, null and string values are not
/// counts.
fn counter_value(value: &Value) -> Option<u64> {
    value.as_i64().and_then(|n| u64::try_from(n).ok())
}

#[async_trait]
impl Acquirer for KitAcquirer {
    fn name(&self) -> &'static str {
        "kit"
    }

    fn targets(&self) -> &[AccountTarget] {
        &self.targets
    }

    async fn acquire(&self, cancel: &CancellationToken) -> Vec<AcquisitionResult> {
        let mut results = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            let Some(window) = target.window else {
                let err = AcquireError::Configuration(format!(
                    "kit target '{}' has no window",
                    target.key
                ));
                results.push(failure(target, &err, "primary-api"));
                continue;
            };
            let outcome = retry_with_policy(&self.policy, cancel, &target.key, |attempt| async move {
                let stats = self.fetch_stats(window, Utc::now()).await?;
                Ok((stats, source_tag("primary-api", attempt)))
            })
            .await;
            results.push(match outcome {
                Ok((stats, source)) => {
                    tracing::info!(
                        account = %target.key,
                        subscribers = ?stats.get(metric::SUBSCRIBERS),
                        "kit stats found"
                    );
                    AcquisitionResult::success(target, stats, source)
                }
                Err(err) => failure(target, &err, "primary-api"),
            });
        }
        results
    }
}
