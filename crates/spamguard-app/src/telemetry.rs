//! Logging setup and log-safe text helpers.

use std::fs;
use std::io;
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;

const REDACTED: &str = "<redacted>";

static BEARER_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(bearer)\s+[^\s,;}]+").expect("bearer pattern is a valid literal")
});

static SECRET_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(password|token|authorization|secret)("?\s*[=:]\s*"?)[^\s",;}]+"#)
        .expect("secret pattern is a valid literal")
});

/// Installs the global `tracing` subscriber.
///
/// Events go to stderr; when `config.log_dir` is set they are also written to
/// a per-run `<unix-seconds>_log.txt` file in that directory. Keep the
/// returned guard alive until exit so buffered file output is flushed.
///
/// # Errors
/// Returns [`TelemetryError`] for an invalid filter, an uncreatable log
/// directory, or when a subscriber is already installed.
pub fn init_logging(config: &AppConfig) -> Result<Option<WorkerGuard>, TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_filter)?;
    let stderr_layer = fmt::layer().with_writer(io::stderr).with_target(false);

    let Some(dir) = &config.log_dir else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .try_init()?;
        return Ok(None);
    };

    fs::create_dir_all(dir)?;
    let started = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    let appender = tracing_appender::rolling::never(dir, format!("{started}_log.txt"));
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()?;
    Ok(Some(guard))
}

/// Masks bearer tokens and `key=value` / `"key": "value"` secrets.
pub fn redact_sensitive(input: &str) -> String {
    let masked = BEARER_VALUE.replace_all(input, format!("${{1}} {REDACTED}").as_str());
    SECRET_VALUE
        .replace_all(&masked, format!("${{1}}${{2}}{REDACTED}").as_str())
        .into_owned()
}

/// Logging setup errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter directive did not parse.
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    /// The log directory could not be created.
    #[error("log directory unavailable: {0}")]
    Io(#[from] io::Error),
    /// A global subscriber is already installed.
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}
