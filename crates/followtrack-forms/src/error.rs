use thiserror::Error;

/// Errors returned while posting a form submission.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-2xx status.
    #[error("form '{form}' rejected the submission with HTTP {status}")]
    Rejected { form: String, status: u16 },

    /// None of the submission's labels map to an entry id.
    #[error("form '{0}' has no mapped fields to submit")]
    NoFields(String),
}
