mod acquirers;
mod logging;
mod orchestrator;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use followtrack_core::{AppConfig, FormSubmission, Platform, TrackerConfig};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[command(name = "followtrack")]
#[command(about = "Collect follower counts and submit them to the tracking forms")]
struct Cli {
    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Targets and forms file (overrides FOLLOWTRACK_TARGETS_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    targets: Option<PathBuf>,

    /// Collect and print the mapped submissions without posting them
    #[arg(long, global = true)]
    dry_run: bool,

    /// Restrict the run to these platforms; other targets map to "Not Found"
    #[arg(long, global = true, value_name = "PLATFORM")]
    only: Vec<Platform>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Collect every target and submit both forms (default)
    Run,
    /// Load and validate configuration, then print targets and form mappings
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = followtrack_core::load_app_config()?;
    if let Some(path) = &cli.targets {
        config.targets_path.clone_from(path);
    }
    logging::init(&config.log_level, cli.verbose, cli.log_file.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    let tracker = followtrack_core::load_tracker_config(&config.targets_path)?;

    match cli.command {
        Some(Commands::CheckConfig) => {
            print_config(&config, &tracker);
            Ok(())
        }
        Some(Commands::Run) | None => run(&config, &tracker, &cli.only, cli.dry_run).await,
    }
}

async fn run(
    config: &AppConfig,
    tracker: &TrackerConfig,
    only: &[Platform],
    dry_run: bool,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling pending waits");
            ctrl_c_cancel.cancel();
        }
    });

    let run_span = tracing::info_span!(
        "run",
        started_at = %chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
        dry_run
    );
    run_span.in_scope(|| tracing::info!(targets = tracker.targets.len(), "starting collection"));

    let host = acquirers::browser_host(config);
    let plan = acquirers::build_plan(config, tracker, only, &host)?;
    let mut results = orchestrator::collect(&plan.acquirers, &cancel, &run_span).await;
    results.extend(plan.skipped_results());

    let succeeded = results.iter().filter(|r| r.is_success()).count();
    run_span.in_scope(|| {
        tracing::info!(
            succeeded,
            failed = results.len() - succeeded,
            "collection finished"
        );
    });

    let submissions = orchestrator::build_submissions(&tracker.forms, &results);
    if dry_run {
        print_submissions(&submissions)?;
        return Ok(());
    }

    let failed = orchestrator::submit_all(&tracker.forms, &submissions, config, &cancel).await;
    if failed.is_empty() {
        tracing::info!("all forms submitted");
        Ok(())
    } else {
        anyhow::bail!("failed to submit form(s): {}", failed.join(", "))
    }
}

fn print_submissions(submissions: &[FormSubmission]) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(submissions)?);
    Ok(())
}

fn print_config(config: &AppConfig, tracker: &TrackerConfig) {
    println!("targets file: {}", config.targets_path.display());
    println!("targets ({}):", tracker.targets.len());
    for target in &tracker.targets {
        let locator = target
            .id
            .clone()
            .or_else(|| target.window.map(|w| w.to_string()))
            .unwrap_or_default();
        println!(
            "  {:<24} {:<10} {:<11} {}",
            target.key,
            target.platform.to_string(),
            target.kind.to_string(),
            locator
        );
    }
    for form in &tracker.forms {
        println!("form '{}' -> {}", form.name, form.url);
        for field in &form.fields {
            println!(
                "  {:<40} {:<18} {}.{}",
                field.label,
                field.entry.as_deref().unwrap_or("(no entry, dropped)"),
                field.target,
                field.metric
            );
        }
    }
    println!(
        "credentials: twitter={} youtube={} kit={}",
        config.twitter_bearer_token.is_some(),
        config.youtube_api_key.is_some(),
        config.kit_api_key.is_some()
    );
}
