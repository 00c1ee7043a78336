use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::targets::AccountTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    NotFound,
    TransientError,
    FatalError,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Success => write!(f, "success"),
            Status::NotFound => write!(f, "not_found"),
            Status::TransientError => write!(f, "transient_error"),
            Status::FatalError => write!(f, "fatal_error"),
        }
    }
}

/// Outcome of acquiring one [`AccountTarget`].
///
/// Fields are private so the invariant holds: a `Success` always carries at
/// least one metric, every other status carries none and has a reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcquisitionResult {
    target: String,
    name: String,
    status: Status,
    metrics: BTreeMap<String, u64>,
    reason: Option<String>,
    source: String,
    captured_at: DateTime<Utc>,
}

impl AcquisitionResult {
    /// A successful result. An empty metric map is downgraded to `NotFound`.
    #[must_use]
    pub fn success(
        target: &AccountTarget,
        metrics: BTreeMap<String, u64>,
        source: impl Into<String>,
    ) -> Self {
        if metrics.is_empty() {
            return Self::not_found(target, "no metric values extracted", source);
        }
        Self {
            target: target.key.clone(),
            name: target.name.clone(),
            status: Status::Success,
            metrics,
            reason: None,
            source: source.into(),
            captured_at: Utc::now(),
        }
    }

    /// Convenience for the common single-metric success.
    #[must_use]
    pub fn single(
        target: &AccountTarget,
        metric: &str,
        value: u64,
        source: impl Into<String>,
    ) -> Self {
        Self::success(
            target,
            BTreeMap::from([(metric.to_string(), value)]),
            source,
        )
    }

    #[must_use]
    pub fn not_found(
        target: &AccountTarget,
        reason: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self::failure(target, Status::NotFound, reason.into(), source.into())
    }

    #[must_use]
    pub fn transient(
        target: &AccountTarget,
        reason: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self::failure(target, Status::TransientError, reason.into(), source.into())
    }

    #[must_use]
    pub fn fatal(
        target: &AccountTarget,
        reason: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self::failure(target, Status::FatalError, reason.into(), source.into())
    }

    /// A failed result with an explicit status. `Success` is not a failure
    /// and is mapped to `TransientError`.
    #[must_use]
    pub fn failure(target: &AccountTarget, status: Status, reason: String, source: String) -> Self {
        let status = if status == Status::Success {
            Status::TransientError
        } else {
            status
        };
        Self {
            target: target.key.clone(),
            name: target.name.clone(),
            status,
            metrics: BTreeMap::new(),
            reason: Some(reason),
            source,
            captured_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    #[must_use]
    pub fn metrics(&self) -> &BTreeMap<String, u64> {
        &self.metrics
    }

    #[must_use]
    pub fn metric(&self, name: &str) -> Option<u64> {
        self.metrics.get(name).copied()
    }

    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}
