//! Sequential collect-then-submit run.
//!
//! Every acquirer runs to completion before the next starts. A panic or a
//! missing envelope inside one acquirer becomes a `TransientError` result
//! for each of its targets, so the result set always covers every
//! configured target.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use followtrack_acquire::Acquirer;
use followtrack_core::{build_submission, AcquisitionResult, AppConfig, FormSpec, FormSubmission};
use followtrack_forms::FormSink;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

const ORCHESTRATOR_SOURCE: &str = "orchestrator";

/// Run each acquirer once, in order, under a child span of `run_span`.
pub async fn collect(
    acquirers: &[Box<dyn Acquirer>],
    cancel: &CancellationToken,
    run_span: &Span,
) -> Vec<AcquisitionResult> {
    let mut results = Vec::new();
    for acquirer in acquirers {
        let span = tracing::info_span!(parent: run_span, "acquirer", name = acquirer.name());
        let outcome = AssertUnwindSafe(acquirer.acquire(cancel))
            .catch_unwind()
            .instrument(span.clone())
            .await;

        let batch = span.in_scope(|| match outcome {
            Ok(batch) => reconcile(acquirer.as_ref(), batch),
            Err(payload) => panicked(acquirer.as_ref(), payload.as_ref()),
        });
        results.extend(batch);
    }
    results
}

/// One envelope per target, in target order. Targets the acquirer skipped
/// get a `TransientError`; envelopes for unknown targets are discarded.
fn reconcile(acquirer: &dyn Acquirer, mut batch: Vec<AcquisitionResult>) -> Vec<AcquisitionResult> {
    acquirer
        .targets()
        .iter()
        .map(|target| {
            if let Some(pos) = batch.iter().position(|r| r.target() == target.key) {
                batch.swap_remove(pos)
            } else {
                tracing::warn!(account = %target.key, "acquirer returned no result for target");
                AcquisitionResult::transient(
                    target,
                    "acquirer returned no result",
                    ORCHESTRATOR_SOURCE,
                )
            }
        })
        .collect()
}

fn panicked(acquirer: &dyn Acquirer, payload: &(dyn Any + Send)) -> Vec<AcquisitionResult> {
    let message = panic_message(payload);
    tracing::error!(acquirer = acquirer.name(), panic = %message, "acquirer panicked");
    acquirer
        .targets()
        .iter()
        .map(|target| {
            AcquisitionResult::transient(
                target,
                format!("acquirer panicked: {message}"),
                ORCHESTRATOR_SOURCE,
            )
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[must_use]
pub fn build_submissions(forms: &[FormSpec], results: &[AcquisitionResult]) -> Vec<FormSubmission> {
    forms
        .iter()
        .map(|form| build_submission(form, results))
        .collect()
}

/// Submit each form independently. Returns the names of forms that failed.
pub async fn submit_all(
    forms: &[FormSpec],
    submissions: &[FormSubmission],
    config: &AppConfig,
    cancel: &CancellationToken,
) -> Vec<String> {
    let mut failed = Vec::new();
    for (form, submission) in forms.iter().zip(submissions) {
        let sink = match FormSink::new(
            form,
            Duration::from_secs(config.request_timeout_secs),
            &config.user_agent,
        ) {
            Ok(sink) => sink.with_retries(config.submit_max_retries, Duration::from_secs(2)),
            Err(err) => {
                tracing::error!(form = %form.name, error = %err, "failed to build form sink");
                failed.push(form.name.clone());
                continue;
            }
        };
        if !sink.submit(submission, cancel).await {
            failed.push(sink.name().to_string());
        }
    }
    failed
}
