//! Shared types for followtrack: configuration, account targets, the
//! acquisition result envelope and the form submission mapper.

pub mod app_config;
pub mod config;
pub mod envelope;
pub mod submission;
pub mod targets;
pub mod time;
pub mod tracker;

use thiserror::Error;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use envelope::{AcquisitionResult, Status};
pub use submission::{build_submission, FieldValue, FormSubmission, NOT_FOUND};
pub use targets::{metric, AccountTarget, EntityKind, KitWindow, Platform};
pub use time::duration_ms;
pub use tracker::{load_tracker_config, parse_tracker_config, Endpoints, FieldSpec, FormSpec, TrackerConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read tracker config {path}: {source}")]
    TrackerFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse tracker config: {0}")]
    TrackerFileParse(#[from] serde_yaml::Error),

    #[error("tracker config validation failed: {0}")]
    Validation(String),
}
