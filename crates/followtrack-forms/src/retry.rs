//! Retry with exponential back-off for form submissions.
//!
//! [`retry_with_backoff`] wraps a fallible async POST and retries every
//! failure except [`SubmitError::NoFields`], which no retry can fix.

use std::future::Future;
use std::time::Duration;

use followtrack_core::duration_ms;
use tokio_util::sync::CancellationToken;

use crate::error::SubmitError;

pub(crate) fn is_retriable(err: &SubmitError) -> bool {
    !matches!(err, SubmitError::NoFields(_))
}

/// Delay before retry `retry` (1-based): `base × 2^(retry-1)`.
///
/// With a 2 s base the schedule is 2 s, 4 s, 8 s.
pub(crate) fn backoff_delay(base: Duration, retry: u32) -> Duration {
    base.saturating_mul(1u32 << retry.saturating_sub(1).min(10))
}

/// Runs `operation` with up to `max_retries` additional attempts.
///
/// A cancelled wait stops retrying and returns the last error.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    base: Duration,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, SubmitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SubmitError>>,
{
    let mut retries = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || retries >= max_retries {
                    return Err(err);
                }
                retries += 1;
                let delay = backoff_delay(base, retries);
                tracing::warn!(
                    attempt = retries,
                    max_retries,
                    delay_ms = duration_ms(delay),
                    error = %err,
                    "form submission failed, retrying after back-off"
                );
                tokio::select! {
                    () = cancel.cancelled() => {
                        tracing::warn!(attempt = retries, "submission retry wait cancelled");
                        return Err(err);
                    }
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}
