use std::path::PathBuf;

use crate::app_config::AppConfig;
use crate::ConfigError;

const DEFAULT_ENV_PATH: &str = "config/.env";

pub(crate) const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

/// Load runtime settings from environment variables.
///
/// Loads the `.env` file named by `FOLLOWTRACK_ENV_PATH` (default
/// `config/.env`) and then a plain `.env` before reading the process
/// environment. Missing files are ignored.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    let env_path =
        std::env::var("FOLLOWTRACK_ENV_PATH").unwrap_or_else(|_| DEFAULT_ENV_PATH.to_string());
    dotenvy::from_path(&env_path).ok();
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load runtime settings from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build runtime settings using the provided env-var lookup function, so the
/// parsing rules can be tested with a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    // Empty strings in a .env file mean "unset".
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_flag = |var: &str, default: &str| -> Result<bool, ConfigError> {
        parse_bool(&or_default(var, default)).ok_or_else(|| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: "expected true/false".to_string(),
        })
    };

    let log_level = or_default("FOLLOWTRACK_LOG_LEVEL", "info");
    let targets_path = PathBuf::from(or_default(
        "FOLLOWTRACK_TARGETS_PATH",
        "./config/tracker.yaml",
    ));
    let data_dir = PathBuf::from(or_default("FOLLOWTRACK_DATA_DIR", "data"));
    let request_timeout_secs = parse_u64("FOLLOWTRACK_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("FOLLOWTRACK_USER_AGENT", DEFAULT_USER_AGENT);
    let submit_max_retries = parse_u32("FOLLOWTRACK_SUBMIT_MAX_RETRIES", "3")?;
    let instagram_max_retries = parse_u32("FOLLOWTRACK_INSTAGRAM_MAX_RETRIES", "10")?;
    let headless = parse_flag("FOLLOWTRACK_HEADLESS", "true")?;
    let humanize = parse_flag("FOLLOWTRACK_HUMANIZE", "true")?;
    let chrome_path = optional("FOLLOWTRACK_CHROME_PATH").map(PathBuf::from);

    Ok(AppConfig {
        log_level,
        targets_path,
        data_dir,
        request_timeout_secs,
        user_agent,
        submit_max_retries,
        instagram_max_retries,
        headless,
        humanize,
        chrome_path,
        twitter_bearer_token: optional("TWITTER_BEARER_TOKEN"),
        youtube_api_key: optional("YOUTUBE_API_ID"),
        youtube_channel_id: optional("YOUTUBE_CHANNEL_ID"),
        kit_api_key: optional("KIT_V4_API_KEY"),
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
