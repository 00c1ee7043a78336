use followtrack_core::Status;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by {platform}: {detail}")]
    RateLimited { platform: String, detail: String },

    #[error("sign-in wall detected ({marker})")]
    Blocked { marker: String },

    #[error("count not found: {0}")]
    NotFound(String),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("failed to decode {encoding} response body: {reason}")]
    Decompress { encoding: String, reason: String },

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AcquireError {
    /// Configuration errors fail the acquirer without consuming retry budget.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        !matches!(self, AcquireError::Configuration(_))
    }

    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AcquireError::RateLimited { .. })
    }

    /// Envelope status reported once retries for this error are exhausted.
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            AcquireError::Configuration(_) => Status::FatalError,
            AcquireError::NotFound(_) | AcquireError::Blocked { .. } => Status::NotFound,
            _ => Status::TransientError,
        }
    }
}
