//! Instagram follower counts.
//!
//! Each round asks a third-party profile API first and falls back to
//! rendering the public profile, where intercepted `graphql` responses are
//! deep-searched before the markup patterns are tried. Rounds repeat under an
//! exponential schedule from a two-minute base.

use std::io::Read;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use followtrack_core::{metric, AccountTarget, AcquisitionResult, Status};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, CONTENT_ENCODING};
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;

use super::{failure, Acquirer};
use crate::browser::{render, BrowserHost, RenderRequest, SessionOptions};
use crate::error::AcquireError;
use crate::extract::{compile, deep_find_count, extract_by_accessors, first_count, Accessor};
use crate::retry::{retry_with_policy, Backoff, RetryPolicy};

const API_ACCESSORS: &[&str] = &[
    "user_followers",
    "followers",
    "follower_count",
    "data.user.edge_followed_by.count",
    "graphql.user.edge_followed_by.count",
];

const DEEP_KEYS: &[&str] = &["follower_count", "edge_followed_by"];

static ACCESSORS: LazyLock<Vec<Accessor>> =
    LazyLock::new(|| API_ACCESSORS.iter().map(|s| Accessor::parse(s)).collect());

static MARKUP_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r#""follower_count":(\d+)"#,
        r#""edge_followed_by":\{"count":(\d+)\}"#,
        r"(?i)([\d,]+)\s+followers",
        r"Followers</span><span[^>]*>([^<]+)",
    ])
});

/// Decode a response body according to its `Content-Encoding`.
///
/// # Errors
///
/// Returns [`AcquireError::Decompress`] for corrupt bodies and unsupported
/// encodings.
pub fn decode_body(encoding: Option<&str>, bytes: &[u8]) -> Result<Vec<u8>, AcquireError> {
    let encoding = encoding.map(|e| e.trim().to_ascii_lowercase());
    let decompress_err = |name: &str, e: std::io::Error| AcquireError::Decompress {
        encoding: name.to_string(),
        reason: e.to_string(),
    };
    match encoding.as_deref() {
        None | Some("" | "identity") => Ok(bytes.to_vec()),
        Some("zstd") => zstd::stream::decode_all(bytes).map_err(|e| decompress_err("zstd", e)),
        Some("gzip" | "x-gzip") => {
            let mut out = Vec::new();
            flate2::read::GzDecoder::new(bytes)
                .read_to_end(&mut out)
                .map_err(|e| decompress_err("gzip", e))?;
            Ok(out)
        }
        Some("deflate") => {
            let mut out = Vec::new();
            if flate2::read::ZlibDecoder::new(bytes)
                .read_to_end(&mut out)
                .is_ok()
            {
                return Ok(out);
            }
            out.clear();
            flate2::read::DeflateDecoder::new(bytes)
                .read_to_end(&mut out)
                .map_err(|e| decompress_err("deflate", e))?;
            Ok(out)
        }
        Some(other) => Err(AcquireError::Decompress {
            encoding: other.to_string(),
            reason: "unsupported content encoding".to_string(),
        }),
    }
}

fn api_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, zstd"));
    headers.insert("accept-language", HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert("origin", HeaderValue::from_static("https://www.tucktools.com"));
    headers.insert("referer", HeaderValue::from_static("https://www.tucktools.com/"));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("empty"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("cors"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("cross-site"));
    headers
}

pub struct InstagramAcquirer {
    targets: Vec<AccountTarget>,
    client: Client,
    api_base: String,
    web_base: String,
    host: Arc<dyn BrowserHost>,
    session: SessionOptions,
    timeout: Duration,
    settle: Duration,
    humanize: bool,
    policy: RetryPolicy,
}

impl InstagramAcquirer {
    #[must_use]
    pub fn new(
        targets: Vec<AccountTarget>,
        client: Client,
        api_base: &str,
        web_base: &str,
        host: Arc<dyn BrowserHost>,
    ) -> Self {
        Self {
            targets,
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            web_base: web_base.trim_end_matches('/').to_string(),
            host,
            session: SessionOptions {
                response_filter: Some("graphql".to_string()),
                user_agent: None,
            },
            timeout: Duration::from_secs(90),
            settle: Duration::from_secs(10),
            humanize: false,
            policy: Self::default_policy(10),
        }
    }

    /// Exponential from 120 s, capped at 30 minutes.
    #[must_use]
    pub fn default_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(Backoff::Exponential {
            base: Duration::from_secs(120),
            max_retries,
            jitter: None,
            cap: Some(Duration::from_secs(30 * 60)),
        })
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_browser_settings(
        mut self,
        user_agent: Option<String>,
        settle: Duration,
        humanize: bool,
    ) -> Self {
        self.session.user_agent = user_agent;
        self.settle = settle;
        self.humanize = humanize;
        self
    }

    /// Ask the third-party profile API for `username`'s follower count.
    ///
    /// # Errors
    ///
    /// - [`AcquireError::RateLimited`] on HTTP 429.
    /// - [`AcquireError::UnexpectedStatus`] on any other non-200 status.
    /// - [`AcquireError::Decompress`] / [`AcquireError::Deserialize`] for
    ///   undecodable bodies.
    /// - [`AcquireError::NotFound`] if no accessor yields a count.
    pub async fn fetch_from_api(&self, username: &str) -> Result<u64, AcquireError> {
        let url = format!("{}/{username}", self.api_base);
        let response = self
            .client
            .get(&url)
            .headers(api_headers())
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(AcquireError::RateLimited {
                platform: "instagram".to_string(),
                detail: "HTTP 429 from profile API".to_string(),
            });
        }
        if response.status() != StatusCode::OK {
            return Err(crate::http::unexpected_status(&response));
        }

        let encoding = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let raw = response.bytes().await?;
        let body = decode_body(encoding.as_deref(), &raw)?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(AcquireError::Transient("empty response from profile API".to_string()));
        }
        let value: serde_json::Value =
            serde_json::from_slice(&body).map_err(|source| AcquireError::Deserialize {
                context: "instagram profile API".to_string(),
                source,
            })?;

        extract_by_accessors(&value, &ACCESSORS).ok_or_else(|| {
            AcquireError::NotFound(format!("no follower count in API response for {username}"))
        })
    }

    /// Render the public profile and extract the follower count.
    ///
    /// # Errors
    ///
    /// - [`AcquireError::Blocked`] when redirected to a login page.
    /// - [`AcquireError::NotFound`] if neither intercepted responses nor the
    ///   markup yield a count.
    /// - Browser errors from the host.
    pub async fn scrape(&self, username: &str) -> Result<u64, AcquireError> {
        let request = RenderRequest {
            url: format!("{}/{username}/", self.web_base),
            timeout: self.timeout,
            settle: self.settle,
            humanize: self.humanize,
        };
        let page = render(self.host.as_ref(), &self.session, &request).await?;

        if page.url.to_lowercase().contains("login") || page.title.to_lowercase().contains("login")
        {
            return Err(AcquireError::Blocked {
                marker: "login redirect".to_string(),
            });
        }

        if let Some(count) = page
            .intercepted
            .iter()
            .find_map(|body| deep_find_count(body, DEEP_KEYS))
        {
            tracing::debug!(count, "follower count found in intercepted response");
            return Ok(count);
        }

        first_count(&page.html, &MARKUP_PATTERNS).ok_or_else(|| {
            AcquireError::NotFound(format!("no follower count on the profile of {username}"))
        })
    }

    /// One round: the API, then the scrape.
    async fn round(&self, username: &str, attempt: u32) -> Result<(u64, String), AcquireError> {
        let (api_tag, scrape_tag) = if attempt == 0 {
            ("primary-api".to_string(), "fallback-scrape".to_string())
        } else {
            (format!("api-retry-{attempt}"), format!("scrape-retry-{attempt}"))
        };

        let api_err = match self.fetch_from_api(username).await {
            Ok(count) => return Ok((count, api_tag)),
            Err(err) => err,
        };
        tracing::info!(username, attempt, error = %api_err, "profile API failed, scraping");

        let scrape_err = match self.scrape(username).await {
            Ok(count) => return Ok((count, scrape_tag)),
            Err(err) => err,
        };

        Err(combine_round_errors(&api_err, &scrape_err))
    }
}

/// Error for a round where both sources failed. A rate limit on either side
/// stays a rate limit; the round is only `NotFound` when both sides are.
fn combine_round_errors(api_err: &AcquireError, scrape_err: &AcquireError) -> AcquireError {
    let detail = format!("api: {api_err}; scrape: {scrape_err}");
    if api_err.is_rate_limited() || scrape_err.is_rate_limited() {
        AcquireError::RateLimited {
            platform: "instagram".to_string(),
            detail,
        }
    } else if api_err.status() == Status::NotFound && scrape_err.status() == Status::NotFound {
        AcquireError::NotFound(detail)
    } else {
        AcquireError::Transient(detail)
    }
}

#[async_trait]
impl Acquirer for InstagramAcquirer {
    fn name(&self) -> &'static str {
        "instagram"
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
            let outcome = retry_with_policy(&self.policy, cancel, &target.key, |attempt| {
                self.round(username, attempt)
            })
            .await;
            results.push(match outcome {
                Ok((count, source)) => {
                    tracing::info!(account = %target.key, followers = count, %source, "instagram followers found");
                    AcquisitionResult::single(target, metric::FOLLOWERS, count, source)
                }
                Err(err) => failure(target, &err, "primary-api"),
            });
        }
        results
    }
}
