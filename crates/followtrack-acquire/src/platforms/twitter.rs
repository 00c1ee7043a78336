use std::time::Duration;

use async_trait::async_trait;
use followtrack_core::{metric, AccountTarget, AcquisitionResult};
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;

use super::{failure, source_tag, Acquirer};
use crate::error::AcquireError;
use crate::http::{read_json, unexpected_status};
use crate::retry::{retry_with_policy, Backoff, RetryPolicy};

/// Follower counts from the Twitter/X v2 users endpoint.
///
/// Any failure waits out one fixed 15-minute cooldown and retries once.
pub struct TwitterAcquirer {
    targets: Vec<AccountTarget>,
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
    policy: RetryPolicy,
}

impl TwitterAcquirer {
    #[must_use]
    pub fn new(
        targets: Vec<AccountTarget>,
        client: Client,
        base_url: &str,
        bearer_token: Option<String>,
    ) -> Self {
        Self {
            targets,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token,
            policy: RetryPolicy::new(Backoff::Cooldown {
                wait: Duration::from_secs(15 * 60),
            }),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fetch `public_metrics.followers_count` for `username`.
    ///
    /// # Errors
    ///
    /// - [`AcquireError::Configuration`] if no bearer token is configured.
    /// - [`AcquireError::RateLimited`] on HTTP 429, carrying the reset time.
    /// - [`AcquireError::UnexpectedStatus`] on any other non-200 status.
    /// - [`AcquireError::NotFound`] if the response has no follower count.
    pub async fn fetch_followers(&self, username: &str) -> Result<u64, AcquireError> {
        let token = self.bearer_token.as_deref().ok_or_else(|| {
            AcquireError::Configuration("TWITTER_BEARER_TOKEN is not set".to_string())
        })?;
        let url = format!("{}/2/users/by/username/{username}", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("user.fields", "public_metrics")])
            .bearer_auth(token)
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let reset = response
                .headers()
                .get("x-rate-limit-reset")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();
            return Err(AcquireError::RateLimited {
                platform: "twitter".to_string(),
                detail: format!("HTTP 429, resets at {reset}"),
            });
        }
        if response.status() != StatusCode::OK {
            return Err(unexpected_status(&response));
        }

        let body = read_json(response, "twitter users/by/username").await?;
        body.pointer("/data/public_metrics/followers_count")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| {
                AcquireError::NotFound(format!("no followers_count for @{username}"))
            })
    }
}

#[async_trait]
impl Acquirer for TwitterAcquirer {
    fn name(&self) -> &'static str {
        "twitter"
    }

    fn targets(&self) -> &[AccountTarget] {
        &self.targets
    }

    async fn acquire(&self, cancel: &CancellationToken) -> Vec<AcquisitionResult> {
        let mut results = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            let Some(username) = target.id.as_deref() else {
                let err = AcquireError::Configuration(format!(
                    "target '{}' has no username",
                    target.key
                ));
                results.push(failure(target, &err, "primary-api"));
                continue;
            };
            let outcome = retry_with_policy(&self.policy, cancel, &target.key, |attempt| async move {
                let count = self.fetch_followers(username).await?;
                Ok((count, source_tag("primary-api", attempt)))
            })
            .await;
            results.push(match outcome {
                Ok((count, source)) => {
                    tracing::info!(account = %target.key, followers = count, "twitter followers found");
                    AcquisitionResult::single(target, metric::FOLLOWERS, count, source)
                }
                Err(err) => failure(target, &err, "primary-api"),
            });
        }
        results
    }
}
