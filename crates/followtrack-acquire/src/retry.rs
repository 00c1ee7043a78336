//! Shared retry combinator for every acquirer.
//!
//! A [`RetryPolicy`] pairs a backoff shape with an optional rate-limit
//! cooldown. Waits race a [`CancellationToken`]; a cancelled wait stops the
//! loop and the last failure is returned unchanged.

use std::future::Future;
use std::time::Duration;

use followtrack_core::duration_ms;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::error::AcquireError;

/// Cooldown applied once when a platform confirms a rate limit.
pub const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backoff {
    /// Retry `max_retries` times. The wait before retry `k` (1-based) is
    /// `base * 2^(k-1)`, plus a uniform random jitter in `jitter`, capped at
    /// `cap`.
    Exponential {
        base: Duration,
        max_retries: u32,
        jitter: Option<(Duration, Duration)>,
        cap: Option<Duration>,
    },
    /// Retry once after a fixed wait.
    Cooldown { wait: Duration },
}

impl Backoff {
    #[must_use]
    pub fn exponential(base: Duration, max_retries: u32) -> Self {
        Backoff::Exponential {
            base,
            max_retries,
            jitter: None,
            cap: None,
        }
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        match self {
            Backoff::Exponential { max_retries, .. } => *max_retries,
            Backoff::Cooldown { .. } => 1,
        }
    }

    /// Wait before retry `retry` (1-based), jitter excluded.
    #[must_use]
    pub fn base_delay(&self, retry: u32) -> Duration {
        match self {
            Backoff::Exponential { base, cap, .. } => {
                let factor = 1u32 << retry.saturating_sub(1).min(20);
                let delay = base.saturating_mul(factor);
                cap.map_or(delay, |cap| delay.min(cap))
            }
            Backoff::Cooldown { wait } => *wait,
        }
    }

    /// Wait before retry `retry` (1-based), jitter included.
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        match self {
            Backoff::Exponential {
                jitter: Some((lo, hi)),
                cap,
                ..
            } => {
                #[allow(clippy::cast_possible_truncation)]
                let (lo_ms, hi_ms) = (lo.as_millis() as u64, hi.as_millis() as u64);
                let extra = if hi_ms > lo_ms {
                    rand::rng().random_range(lo_ms..=hi_ms)
                } else {
                    lo_ms
                };
                let delay = base.saturating_add(Duration::from_millis(extra));
                cap.map_or(delay, |cap| delay.min(cap))
            }
            _ => base,
        }
    }

    /// Full jitter-free wait schedule, one entry per retry.
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        (1..=self.max_retries()).map(|k| self.base_delay(k)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff: Backoff,
    /// When set, a rate-limit failure waits this long once, retries once,
    /// and then gives up. The regular backoff is not applied on top.
    pub rate_limit_cooldown: Option<Duration>,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(backoff: Backoff) -> Self {
        Self {
            backoff,
            rate_limit_cooldown: None,
        }
    }

    #[must_use]
    pub fn with_rate_limit_cooldown(mut self, wait: Duration) -> Self {
        self.rate_limit_cooldown = Some(wait);
        self
    }
}

/// Run `operation` under `policy`.
///
/// `operation` receives the zero-based attempt number. Configuration errors
/// are returned immediately. Once retries are exhausted, or a wait is
/// cancelled, the last error is returned.
///
/// # Errors
///
/// Returns the last [`AcquireError`] produced by `operation`.
pub async fn retry_with_policy<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    label: &str,
    mut operation: F,
) -> Result<T, AcquireError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AcquireError>>,
{
    let max_retries = policy.backoff.max_retries();
    let mut attempt = 0u32;
    let mut retries = 0u32;
    let mut cooled_down = false;

    loop {
        let err = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        attempt += 1;

        // The attempt after a cooldown is the last one.
        if !err.is_retriable() || cooled_down {
            return Err(err);
        }

        let delay = match policy.rate_limit_cooldown {
            Some(wait) if err.is_rate_limited() => {
                cooled_down = true;
                tracing::warn!(
                    account = label,
                    attempt,
                    delay_ms = duration_ms(wait),
                    error = %err,
                    "rate limited, cooling down before a single retry"
                );
                wait
            }
            _ => {
                if retries >= max_retries {
                    return Err(err);
                }
                retries += 1;
                let delay = policy.backoff.delay(retries);
                tracing::warn!(
                    account = label,
                    attempt,
                    max_retries,
                    delay_ms = duration_ms(delay),
                    error = %err,
                    "acquisition attempt failed, retrying after backoff"
                );
                delay
            }
        };

        if !sleep_or_cancel(delay, cancel).await {
            tracing::warn!(account = label, attempt, "retry wait cancelled");
            return Err(err);
        }
    }
}

/// Sleep for `delay` unless `cancel` fires first. Returns `false` on cancel.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use tokio::time::Instant;

    use super::*;

    fn transient() -> AcquireError {
        AcquireError::Transient("boom".to_string())
    }

    fn rate_limited() -> AcquireError {
        AcquireError::RateLimited {
            platform: "test".to_string(),
            detail: "HTTP 429".to_string(),
        }
    }

    #[test]
    fn exponential_schedule_doubles() {
        let backoff = Backoff::exponential(Duration::from_secs(2), 4);
        assert_eq!(
            backoff.delays(),
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(16)
            ]
        );
    }

    #[test]
    fn exponential_schedule_is_capped() {
        let backoff = Backoff::Exponential {
            base: Duration::from_secs(120),
            max_retries: 6,
            jitter: None,
            cap: Some(Duration::from_secs(1800)),
        };
        assert_eq!(backoff.base_delay(5), Duration::from_secs(1800));
        assert_eq!(backoff.base_delay(4), Duration::from_secs(960));
    }

    #[test]
    fn jitter_stays_in_range() {
        let backoff = Backoff::Exponential {
            base: Duration::from_secs(2),
            max_retries: 3,
            jitter: Some((Duration::from_secs(1), Duration::from_secs(5))),
            cap: None,
        };
        for _ in 0..50 {
            let d = backoff.delay(2);
            assert!(d >= Duration::from_secs(5) && d <= Duration::from_secs(9), "{d:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let policy = RetryPolicy::new(Backoff::exponential(Duration::from_secs(2), 3));
        let result = retry_with_policy(&policy, &CancellationToken::new(), "t", |_| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, AcquireError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_waits_exactly_the_schedule() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let backoff = Backoff::exponential(Duration::from_secs(2), 3);
        let expected: Duration = backoff.delays().iter().sum();
        let policy = RetryPolicy::new(backoff);

        let start = Instant::now();
        let result = retry_with_policy(&policy, &CancellationToken::new(), "t", |_| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, AcquireError>(transient())
            }
        })
        .await;

        assert!(matches!(result, Err(AcquireError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), expected);
        assert_eq!(expected, Duration::from_secs(14));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_takes_single_cooldown_without_escalation() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let policy = RetryPolicy::new(Backoff::exponential(Duration::from_secs(2), 5))
            .with_rate_limit_cooldown(RATE_LIMIT_COOLDOWN);

        let start = Instant::now();
        let result = retry_with_policy(&policy, &CancellationToken::new(), "t", |_| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, AcquireError>(rate_limited())
            }
        })
        .await;

        assert!(matches!(result, Err(AcquireError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(start.elapsed(), RATE_LIMIT_COOLDOWN);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_backoff_retries_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let policy = RetryPolicy::new(Backoff::Cooldown {
            wait: Duration::from_secs(900),
        });

        let start = Instant::now();
        let result = retry_with_policy(&policy, &CancellationToken::new(), "t", |_| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, AcquireError>(transient())
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(900));
    }

    #[tokio::test(start_paused = true)]
    async fn configuration_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let policy = RetryPolicy::new(Backoff::exponential(Duration::from_secs(2), 3));
        let start = Instant::now();
        let result = retry_with_policy(&policy, &CancellationToken::new(), "t", |_| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, AcquireError>(AcquireError::Configuration("no key".to_string()))
            }
        })
        .await;
        assert!(matches!(result, Err(AcquireError::Configuration(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_number_is_passed_through() {
        let policy = RetryPolicy::new(Backoff::exponential(Duration::from_secs(1), 3));
        let result = retry_with_policy(&policy, &CancellationToken::new(), "t", |attempt| async move {
            if attempt < 2 {
                Err(transient())
            } else {
                Ok(attempt)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_token_stops_before_waiting() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let policy = RetryPolicy::new(Backoff::exponential(Duration::from_secs(60), 5));
        let start = Instant::now();
        let result = retry_with_policy(&policy, &cancel, "t", |_| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, AcquireError>(transient())
            }
        })
        .await;
        assert!(matches!(result, Err(AcquireError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_wait_returns_last_error() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });
        let policy = RetryPolicy::new(Backoff::exponential(Duration::from_secs(60), 5));
        let start = Instant::now();
        let result: Result<u32, _> =
            retry_with_policy(&policy, &cancel, "t", |_| async { Err(transient()) }).await;
        assert!(result.is_err());
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }
}
