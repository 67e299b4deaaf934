//! Tracing setup.
//!
//! Logs go to `<data_dir>/jpop.log` so they don't interleave with command
//! output, or to stderr with `--verbose`. The level is read from `JPOP_LOG`
//! (same syntax as `RUST_LOG`) and defaults to `info`.

use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "JPOP_LOG";
pub const LOG_FILE: &str = "jpop.log";

fn env_filter() -> EnvFilter {
  EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held
/// until exit. It is `None` when logging to stderr.
pub fn init(verbose: bool, log_dir: &Path) -> Result<Option<WorkerGuard>> {
  let registry = tracing_subscriber::registry().with(env_filter());

  if verbose {
    registry
      .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
      .try_init()
      .map_err(|e| eyre!("Failed to initialise logging: {}", e))?;
    return Ok(None);
  }

  std::fs::create_dir_all(log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  registry
    .with(
      tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false),
    )
    .try_init()
    .map_err(|e| eyre!("Failed to initialise logging: {}", e))?;

  Ok(Some(guard))
}
