//! Tracing subscriber setup.
//!
//! Every run writes a daily-rolled log file under the configured directory.
//! Headless runs also log to stderr; the console never does, since anything
//! printed would corrupt the alternate screen.  `RUST_LOG` overrides the
//! default filter.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "release_relay=info";
const LOG_FILE: &str = "release-relay.log";

/// Install the global subscriber.  Keep the returned guard alive until exit
/// or buffered file lines are lost.
pub fn init_logging(log_dir: &Path, headless: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_filter(env_filter());

    let stderr_layer = headless.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(env_filter())
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(guard)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}
