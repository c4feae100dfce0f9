//! Tracing configuration and log routing.
//!
//! Human-readable logs go to stderr so stdout stays free for command output. A second,
//! non-blocking file layer appends to `RUSTY_NEWS_LOG_FILE` when set, or to
//! `logs/rustynews.log` otherwise.
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "rustynews.log";

/// Configure tracing subscribers for stderr and file logging.
///
/// `RUST_LOG` controls filtering and defaults to `default_level` when unset or invalid.
pub fn init_tracing(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer);

    if let Some(writer) = configure_file_writer() {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();

        registry.with(file_layer).init();
    } else {
        registry.init();
    }
}

/// Build a non-blocking writer for file logging, or `None` when no log file can be opened.
fn configure_file_writer() -> Option<NonBlocking> {
    if let Ok(path) = std::env::var("RUSTY_NEWS_LOG_FILE") {
        let file = match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(err) => {
                eprintln!("Failed to open log file {path}: {err}");
                return None;
            }
        };
        return Some(install_writer(tracing_appender::non_blocking(file)));
    }

    if let Err(err) = std::fs::create_dir_all(DEFAULT_LOG_DIR) {
        eprintln!("Failed to create {DEFAULT_LOG_DIR} directory: {err}");
        return None;
    }
    let appender = tracing_appender::rolling::never(DEFAULT_LOG_DIR, DEFAULT_LOG_FILE);
    Some(install_writer(tracing_appender::non_blocking(appender)))
}

fn install_writer((writer, guard): (NonBlocking, WorkerGuard)) -> NonBlocking {
    // Dropping the guard would stop the background writer.
    let _ = LOG_GUARD.set(guard);
    writer
}
