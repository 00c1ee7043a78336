//! One acquirer per platform. Every acquirer absorbs its own failures and
//! returns exactly one [`AcquisitionResult`] per configured target.

pub mod instagram;
pub mod kit;
pub mod linkedin_company;
pub mod linkedin_newsletter;
pub mod linkedin_profile;
pub mod twitter;
pub mod youtube;

mod linkedin;

use async_trait::async_trait;
use followtrack_core::{AccountTarget, AcquisitionResult};
use tokio_util::sync::CancellationToken;

use crate::error::AcquireError;

#[async_trait]
pub trait Acquirer: Send + Sync {
    /// Short name used in logs and spans.
    fn name(&self) -> &'static str;

    fn targets(&self) -> &[AccountTarget];

    /// Acquire every target, one at a time.
    async fn acquire(&self, cancel: &CancellationToken) -> Vec<AcquisitionResult>;
}

/// Envelope for a failure that survived the retry policy.
pub(crate) fn failure(
    target: &AccountTarget,
    err: &AcquireError,
    source: &str,
) -> AcquisitionResult {
    tracing::warn!(
        account = %target.key,
        status = %err.status(),
        error = %err,
        "acquisition gave up"
    );
    AcquisitionResult::failure(target, err.status(), err.to_string(), source.to_string())
}

/// `base` on the first attempt, `base-retry-N` afterwards.
pub(crate) fn source_tag(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{base}-retry-{attempt}")
    }
}
