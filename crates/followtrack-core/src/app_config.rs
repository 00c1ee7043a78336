use std::path::PathBuf;

/// Runtime settings read from the environment.
///
/// Credentials are optional here; an acquirer whose credential is missing
/// reports a configuration failure for its own targets instead of stopping
/// the run.
#[derive(Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub targets_path: PathBuf,
    pub data_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub submit_max_retries: u32,
    pub instagram_max_retries: u32,
    pub headless: bool,
    pub humanize: bool,
    pub chrome_path: Option<PathBuf>,
    pub twitter_bearer_token: Option<String>,
    pub youtube_api_key: Option<String>,
    pub youtube_channel_id: Option<String>,
    pub kit_api_key: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("log_level", &self.log_level)
            .field("targets_path", &self.targets_path)
            .field("data_dir", &self.data_dir)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("submit_max_retries", &self.submit_max_retries)
            .field("instagram_max_retries", &self.instagram_max_retries)
            .field("headless", &self.headless)
            .field("humanize", &self.humanize)
            .field("chrome_path", &self.chrome_path)
            .field(
                "twitter_bearer_token",
                &self.twitter_bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "youtube_api_key",
                &self.youtube_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("youtube_channel_id", &self.youtube_channel_id)
            .field(
                "kit_api_key",
                &self.kit_api_key.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}
