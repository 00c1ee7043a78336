//! Builds the platform acquirers for a run from the two config layers.

use std::sync::Arc;
use std::time::Duration;

use followtrack_acquire::{
    build_client, Acquirer, BrowserHost, InstagramAcquirer, KitAcquirer, LinkedinCompanyAcquirer,
    LinkedinNewsletterAcquirer, LinkedinProfileAcquirer, TwitterAcquirer, YoutubeAcquirer,
};
use followtrack_core::{
    AccountTarget, AcquisitionResult, AppConfig, EntityKind, Platform, TrackerConfig,
};

const YOUTUBE_STATS_FILE: &str = "youtube_stats.txt";

/// Acquirers in run order plus the targets excluded by `--only`.
pub struct RunPlan {
    pub acquirers: Vec<Box<dyn Acquirer>>,
    pub skipped: Vec<AccountTarget>,
}

impl RunPlan {
    /// `NotFound` envelopes for the skipped targets.
    #[must_use]
    pub fn skipped_results(&self) -> Vec<AcquisitionResult> {
        self.skipped
            .iter()
            .map(|t| AcquisitionResult::not_found(t, "platform not selected for this run", "skipped"))
            .collect()
    }
}

fn selected(only: &[Platform], platform: Platform) -> bool {
    only.is_empty() || only.contains(&platform)
}

fn linkedin_targets(tracker: &TrackerConfig, kind: EntityKind) -> Vec<AccountTarget> {
    tracker
        .targets_for(Platform::Linkedin)
        .into_iter()
        .filter(|t| t.kind == kind)
        .collect()
}

/// Build one acquirer per platform group that has targets, in the order
/// LinkedIn profile, companies, newsletter, Twitter, Instagram, YouTube, Kit.
///
/// # Errors
///
/// Returns an error if the shared HTTP client cannot be constructed.
pub fn build_plan(
    config: &AppConfig,
    tracker: &TrackerConfig,
    only: &[Platform],
    host: &Arc<dyn BrowserHost>,
) -> anyhow::Result<RunPlan> {
    let client = build_client(
        Duration::from_secs(config.request_timeout_secs),
        &config.user_agent,
    )?;
    let endpoints = &tracker.endpoints;
    let user_agent = Some(config.user_agent.clone());

    let groups: Vec<(Platform, Vec<AccountTarget>)> = vec![
        (Platform::Linkedin, linkedin_targets(tracker, EntityKind::Profile)),
        (Platform::Linkedin, linkedin_targets(tracker, EntityKind::Company)),
        (Platform::Linkedin, linkedin_targets(tracker, EntityKind::Newsletter)),
        (Platform::Twitter, tracker.targets_for(Platform::Twitter)),
        (Platform::Instagram, tracker.targets_for(Platform::Instagram)),
        (Platform::Youtube, tracker.targets_for(Platform::Youtube)),
        (Platform::Kit, tracker.targets_for(Platform::Kit)),
    ];

    let mut acquirers: Vec<Box<dyn Acquirer>> = Vec::new();
    let mut skipped = Vec::new();
    for (platform, targets) in groups {
        if targets.is_empty() {
            continue;
        }
        if !selected(only, platform) {
            tracing::info!(%platform, count = targets.len(), "skipping targets not selected by --only");
            skipped.extend(targets);
            continue;
        }
        let kind = targets[0].kind;
        let acquirer: Box<dyn Acquirer> = match (platform, kind) {
            (Platform::Linkedin, EntityKind::Profile) => Box::new(LinkedinProfileAcquirer::new(
                targets,
                Arc::clone(host),
                user_agent.clone(),
                config.humanize,
            )),
            (Platform::Linkedin, EntityKind::Newsletter) => Box::new(
                LinkedinNewsletterAcquirer::new(targets, Arc::clone(host), user_agent.clone()),
            ),
            (Platform::Linkedin, _) => Box::new(LinkedinCompanyAcquirer::new(
                targets,
                Arc::clone(host),
                user_agent.clone(),
            )),
            (Platform::Twitter, _) => Box::new(TwitterAcquirer::new(
                targets,
                client.clone(),
                &endpoints.twitter,
                config.twitter_bearer_token.clone(),
            )),
            (Platform::Instagram, _) => Box::new(
                InstagramAcquirer::new(
                    targets,
                    client.clone(),
                    &endpoints.instagram_api,
                    &endpoints.instagram_web,
                    Arc::clone(host),
                )
                .with_policy(InstagramAcquirer::default_policy(config.instagram_max_retries))
                .with_browser_settings(
                    user_agent.clone(),
                    Duration::from_secs(10),
                    config.humanize,
                ),
            ),
            (Platform::Youtube, _) => Box::new(
                YoutubeAcquirer::new(
                    targets,
                    client.clone(),
                    &endpoints.youtube,
                    config.youtube_api_key.clone(),
                )
                .with_default_channel(config.youtube_channel_id.clone())
                .with_stats_file(config.data_dir.join(YOUTUBE_STATS_FILE)),
            ),
            (Platform::Kit, _) => Box::new(KitAcquirer::new(
                targets,
                client.clone(),
                &endpoints.kit,
                config.kit_api_key.clone(),
            )),
        };
        acquirers.push(acquirer);
    }

    Ok(RunPlan { acquirers, skipped })
}

/// Browser backend for the scrape acquirers.
#[cfg(feature = "chromium")]
#[must_use]
pub fn browser_host(config: &AppConfig) -> Arc<dyn BrowserHost> {
    Arc::new(followtrack_acquire::ChromiumBrowser::new(
        config.headless,
        config.chrome_path.clone(),
    ))
}

/// Browser backend for the scrape acquirers.
#[cfg(not(feature = "chromium"))]
#[must_use]
pub fn browser_host(_config: &AppConfig) -> Arc<dyn BrowserHost> {
    tracing::warn!("built without the `chromium` feature; scraped platforms will report errors");
    Arc::new(followtrack_acquire::NoopBrowser)
}
