//! Tracing setup for the server binary.
//!
//! Two sinks: a compact stdout layer for interactive use, and an append-only log
//! file so background pipeline runs stay inspectable after the fact. The file sink
//! is best-effort; if it cannot be opened the server still runs with stdout only.

use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// Dropping the guard would flush and close the non-blocking writer, so it is
// parked here for the lifetime of the process.
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global tracing subscriber.
///
/// Filtering follows `RUST_LOG` and falls back to `info`. The file sink goes to
/// `RAGMILL_LOG_FILE` when set, otherwise to `logs/ragmill.log`.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    match file_writer() {
        Some(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).init();
        }
        None => registry.init(),
    }
}

fn file_writer() -> Option<NonBlocking> {
    let (non_blocking, guard) = match std::env::var("RAGMILL_LOG_FILE") {
        Ok(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|err| eprintln!("Failed to open log file {path}: {err}"))
                .ok()?;
            tracing_appender::non_blocking(file)
        }
        Err(_) => {
            std::fs::create_dir_all("logs")
                .map_err(|err| eprintln!("Failed to create logs directory: {err}"))
                .ok()?;
            tracing_appender::non_blocking(tracing_appender::rolling::never("logs", "ragmill.log"))
        }
    };

    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}
