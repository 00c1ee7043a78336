use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use followtrack_core::{metric, AccountTarget, AcquisitionResult};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{failure, source_tag, Acquirer};
use crate::error::AcquireError;
use crate::extract::parse_count;
use crate::http::read_json;
use crate::retry::{retry_with_policy, Backoff, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStats {
    pub subscribers: u64,
    pub views: u64,
}

/// Channel statistics from the YouTube Data API v3.
pub struct YoutubeAcquirer {
    targets: Vec<AccountTarget>,
    client: Client,
    base_url: String,
    api_key: Option<String>,
    default_channel_id: Option<String>,
    stats_file: Option<PathBuf>,
    policy: RetryPolicy,
}

impl YoutubeAcquirer {
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
            default_channel_id: None,
            stats_file: None,
            policy: RetryPolicy::new(Backoff::exponential(Duration::from_secs(2), 3)),
        }
    }

    /// Channel used for targets that do not name one.
    #[must_use]
    pub fn with_default_channel(mut self, channel_id: Option<String>) -> Self {
        self.default_channel_id = channel_id;
        self
    }

    /// Write the raw counters to `path` after each successful fetch.
    #[must_use]
    pub fn with_stats_file(mut self, path: PathBuf) -> Self {
        self.stats_file = Some(path);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fetch subscriber and view counts for `channel_id`.
    ///
    /// # Errors
    ///
    /// - [`AcquireError::Configuration`] if no API key is configured.
    /// - [`AcquireError::RateLimited`] on a 403 `quotaExceeded` response.
    /// - [`AcquireError::UnexpectedStatus`] on any other non-200 status.
    /// - [`AcquireError::NotFound`] if the response lists no channel.
    pub async fn fetch_stats(&self, channel_id: &str) -> Result<ChannelStats, AcquireError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AcquireError::Configuration("YOUTUBE_API_ID is not set".to_string()))?;
        let url = format!("{}/youtube/v3/channels", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("part", "statistics"), ("id", channel_id), ("key", key)])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::FORBIDDEN && body.contains("quotaExceeded") {
                return Err(AcquireError::RateLimited {
                    platform: "youtube".to_string(),
                    detail: "quota exceeded".to_string(),
                });
            }
            return Err(AcquireError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = read_json(response, "youtube channels").await?;
        let stats = body
            .pointer("/items/0/statistics")
            .ok_or_else(|| {
                AcquireError::NotFound(format!("no statistics for channel {channel_id}"))
            })?;
        Ok(ChannelStats {
            subscribers: counter(stats, "subscriberCount")?,
            views: counter(stats, "viewCount")?,
        })
    }

    async fn write_stats_file(&self, stats: ChannelStats) {
        let Some(path) = &self.stats_file else {
            return;
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(path = %path.display(), error = %e, "failed to create stats directory");
                return;
            }
        }
        let contents = format!(
            "{}\n{}\n{}\n",
            stats.subscribers,
            stats.views,
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        match tokio::fs::write(path, contents).await {
            Ok(()) => tracing::debug!(path = %path.display(), "saved youtube stats"),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to save youtube stats"),
        }
    }
}

/// Counters arrive as decimal strings. An absent counter reads as zero.
fn counter(stats: &Value, key: &str) -> Result<u64, AcquireError> {
    match stats.get(key) {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| AcquireError::Transient(format!("invalid {key}: {n}"))),
        Some(Value::String(s)) => {
            parse_count(s).ok_or_else(|| AcquireError::Transient(format!("invalid {key}: {s}")))
        }
        Some(other) => Err(AcquireError::Transient(format!("invalid {key}: {other}"))),
    }
}

#[async_trait]
impl Acquirer for YoutubeAcquirer {
    fn name(&self) -> &'static str {
        "youtube"
    }

    fn targets(&self) -> &[AccountTarget] {
        &self.targets
    }

    async fn acquire(&self, cancel: &CancellationToken) -> Vec<AcquisitionResult> {
        let mut results = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            let Some(channel_id) = target
                .id
                .as_deref()
                .or(self.default_channel_id.as_deref())
            else {
                let err = AcquireError::Configuration(
                    "no channel id (set the target id or YOUTUBE_CHANNEL_ID)".to_string(),
                );
                results.push(failure(target, &err, "primary-api"));
                continue;
            };

            let outcome = retry_with_policy(&self.policy, cancel, &target.key, |attempt| async move {
                let stats = self.fetch_stats(channel_id).await?;
                Ok((stats, source_tag("primary-api", attempt)))
            })
            .await;

            results.push(match outcome {
                Ok((stats, source)) => {
                    tracing::info!(
                        account = %target.key,
                        subscribers = stats.subscribers,
                        views = stats.views,
                        "youtube stats found"
                    );
                    self.write_stats_file(stats).await;
                    AcquisitionResult::success(
                        target,
                        BTreeMap::from([
                            (metric::SUBSCRIBERS.to_string(), stats.subscribers),
                            (metric::VIEWS.to_string(), stats.views),
                        ]),
                        source,
                    )
                }
                Err(err) => failure(target, &err, "primary-api"),
            });
        }
        results
    }
}
