use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::Value;

use crate::error::AcquireError;

/// Build the HTTP client shared by the API acquirers.
///
/// # Errors
///
/// Returns [`AcquireError::Http`] if the underlying `reqwest::Client`
/// cannot be constructed.
pub fn build_client(timeout: Duration, user_agent: &str) -> Result<Client, AcquireError> {
    Ok(Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .user_agent(user_agent)
        .build()?)
}

/// Read a response body and parse it as JSON.
///
/// # Errors
///
/// Returns [`AcquireError::Http`] if the body cannot be read and
/// [`AcquireError::Deserialize`] if it is not JSON.
pub(crate) async fn read_json(response: Response, context: &str) -> Result<Value, AcquireError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|source| AcquireError::Deserialize {
        context: context.to_string(),
        source,
    })
}

/// Map a non-2xx response to an error.
pub(crate) fn unexpected_status(response: &Response) -> AcquireError {
    AcquireError::UnexpectedStatus {
        status: response.status().as_u16(),
        url: response.url().to_string(),
    }
}
