//! HTTP sink for one external form.
//!
//! A [`FormSink`] knows the form's POST URL and the label to entry-id
//! mapping. Labels without an entry id are dropped from the request body.
//! Any 2xx response is success.

use std::collections::HashMap;
use std::time::Duration;

use followtrack_core::{FormSpec, FormSubmission};
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::error::SubmitError;
use crate::retry::retry_with_backoff;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(2);

pub struct FormSink {
    client: Client,
    name: String,
    url: String,
    entry_ids: HashMap<String, String>,
    max_retries: u32,
    backoff_base: Duration,
}

impl FormSink {
    /// Creates a sink for `form` with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(form: &FormSpec, timeout: Duration, user_agent: &str) -> Result<Self, SubmitError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            name: form.name.clone(),
            url: form.url.clone(),
            entry_ids: form.entry_ids(),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
        })
    }

    /// Overrides the retry budget and the first back-off delay.
    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, backoff_base: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff_base = backoff_base;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry-id and stringified value pairs for the mapped labels, in label order.
    #[must_use]
    pub fn encode(&self, submission: &FormSubmission) -> Vec<(String, String)> {
        submission
            .values
            .iter()
            .filter_map(|(label, value)| {
                let entry = self.entry_ids.get(label);
                if entry.is_none() {
                    tracing::debug!(form = %self.name, label, "label has no entry id, dropped");
                }
                entry.map(|e| (e.clone(), value.to_string()))
            })
            .collect()
    }

    /// POSTs `submission` once per attempt until a 2xx response or the
    /// retry budget runs out.
    ///
    /// # Errors
    ///
    /// - [`SubmitError::NoFields`] if no label maps to an entry id.
    /// - [`SubmitError::Rejected`] if the last attempt got a non-2xx status.
    /// - [`SubmitError::Http`] if the last attempt failed at the network level.
    pub async fn try_submit(
        &self,
        submission: &FormSubmission,
        cancel: &CancellationToken,
    ) -> Result<(), SubmitError> {
        let fields = self.encode(submission);
        if fields.is_empty() {
            return Err(SubmitError::NoFields(self.name.clone()));
        }

        tracing::info!(form = %self.name, url = %self.url, "submitting form");
        tracing::debug!(
            form = %self.name,
            fields = ?fields.iter().map(|(entry, _)| entry.as_str()).collect::<Vec<_>>(),
            "form fields being submitted"
        );

        retry_with_backoff(self.max_retries, self.backoff_base, cancel, || {
            let fields = &fields;
            async move {
                let response = self.client.post(&self.url).form(fields).send().await?;
                let status = response.status();
                if status.is_success() {
                    Ok(())
                } else {
                    Err(SubmitError::Rejected {
                        form: self.name.clone(),
                        status: status.as_u16(),
                    })
                }
            }
        })
        .await
    }

    /// Submits and reports the outcome as a flag, logging any failure.
    pub async fn submit(&self, submission: &FormSubmission, cancel: &CancellationToken) -> bool {
        match self.try_submit(submission, cancel).await {
            Ok(()) => {
                tracing::info!(
                    form = %self.name,
                    not_found = submission.not_found_count(),
                    "form submitted"
                );
                true
            }
            Err(err) => {
                tracing::error!(form = %self.name, error = %err, "form submission failed");
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "sink_test.rs"]
mod tests;
