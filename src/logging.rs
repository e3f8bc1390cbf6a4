//! Logging setup using tracing.
//!
//! Console output goes to stderr; a daily-rolling file goes to
//! `AGENT_HIVE_LOG_DIR` (default `./logs`). `RUST_LOG` overrides the default
//! filter and `AGENT_HIVE_LOG_FORMAT=json` switches the console to JSON lines.

use std::path::PathBuf;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_DIR_ENV: &str = "AGENT_HIVE_LOG_DIR";
pub const LOG_FORMAT_ENV: &str = "AGENT_HIVE_LOG_FORMAT";
pub const DEFAULT_FILTER: &str = "info,agent_hive=debug";

/// Initialize logging with file appender and console output.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the file writer.
pub fn init_logging() -> Result<(WorkerGuard, PathBuf)> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "agent-hive.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let json_console = json_console_requested();
    let text_layer = (!json_console).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true)
    });
    let json_layer = json_console.then(|| fmt::layer().json().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(text_layer)
        .with(json_layer)
        .try_init()?;

    tracing::info!(log_dir = %log_dir.display(), json_console, "Logging initialized");
    Ok((guard, log_dir))
}

fn log_dir() -> PathBuf {
    std::env::var_os(LOG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("logs"))
}

fn json_console_requested() -> bool {
    std::env::var(LOG_FORMAT_ENV)
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Console-only logging for tests; safe to call more than once.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer())
        .try_init();
}
