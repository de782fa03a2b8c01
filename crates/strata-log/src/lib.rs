//! Structured logging for the strata server.
//!
//! Console output carries uptime timestamps and thread names so the primary
//! thread and the `emerge-N` workers can be told apart. When a log directory
//! is configured, a JSON file layer is added for post-mortem analysis of
//! fatal world errors.

use std::path::{Path, PathBuf};

use strata_config::DebugConfig;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config specify one.
pub const DEFAULT_FILTER: &str = "info";

/// File name of the JSON log inside the configured log directory.
pub const LOG_FILE_NAME: &str = "strata.log";

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins over `debug.log_level`; an empty `log_level` falls back to
/// [`DEFAULT_FILTER`]. Calling this twice panics inside `tracing-subscriber`,
/// so binaries call it exactly once at startup.
///
/// ```no_run
/// use strata_config::DebugConfig;
///
/// strata_log::init_logging(&DebugConfig::default());
/// ```
pub fn init_logging(config: &DebugConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if let Some(log_dir) = config.log_dir.as_deref()
        && let Some(log_file) = open_log_file(log_dir)
    {
        subscriber.with(json_layer(log_file)).init();
        return;
    }

    subscriber.init();
}

/// One JSON object per line, no ANSI codes.
fn json_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_timer(fmt::time::uptime())
        .json()
}

/// Filter directives derived from the debug config.
pub fn filter_directives(config: &DebugConfig) -> String {
    if config.log_level.trim().is_empty() {
        DEFAULT_FILTER.to_string()
    } else {
        config.log_level.clone()
    }
}

/// Create an `EnvFilter` with the default filter string.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

/// Path of the JSON log file for a given log directory.
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE_NAME)
}

fn open_log_file(log_dir: &Path) -> Option<std::fs::File> {
    std::fs::create_dir_all(log_dir).ok()?;
    std::fs::File::create(log_file_path(log_dir)).ok()
}
