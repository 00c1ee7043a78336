//! Submission of mapped follower counts to the external form endpoints.

pub mod error;
pub(crate) mod retry;
pub mod sink;

pub use error::SubmitError;
pub use sink::FormSink;
