use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

const VERBOSE_FILTER: &str = "debug,hyper=info,h2=info,chromiumoxide=info";

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level`; `verbose` overrides both. With `log_file`
/// set, events are appended to that file instead of stderr.
///
/// # Errors
///
/// Returns an error if the filter is invalid or the log file cannot be opened.
pub fn init(level: &str, verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let env_filter = if verbose {
        EnvFilter::try_new(VERBOSE_FILTER)?
    } else {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?
    };

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init(),
    }
    Ok(())
}
