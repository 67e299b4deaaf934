mod cache;
mod commands;
mod config;
mod error;
mod http;
mod logging;
mod resas;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;

use cache::{CacheStore, MemoryStorage, NoopStorage, SqliteStorage, Storage};
use http::ApiClient;
use resas::PopulationApi;

#[derive(Parser, Debug)]
#[command(name = "jpop")]
#[command(about = "Prefecture population statistics from the RESAS API")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/jpop/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Bypass the response cache for this run
  #[arg(long, global = true)]
  no_cache: bool,

  /// Log to stderr instead of the log file
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let log_guard = logging::init(args.verbose, &config::data_dir()?)?;

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let settings = config.api_settings()?;

  let storage: Arc<dyn Storage> = if args.no_cache {
    Arc::new(NoopStorage)
  } else if !config.cache.persist {
    Arc::new(MemoryStorage::new())
  } else {
    Arc::new(SqliteStorage::open_at(&config.storage_path()?)?)
  };
  let cache = CacheStore::new(storage).with_prefix(config.cache.prefix.clone());

  let client = ApiClient::new(&settings, config.retry.policy(), cache)?
    .with_default_ttl(config.default_ttl());
  let api = PopulationApi::new(client).with_options(config.fetch_options());

  tracing::debug!(endpoint = %settings.endpoint, "starting");

  if let Err(state) = commands::run(args.command, &api).await {
    eprintln!("{}", commands::render_error(&state));
    drop(log_guard);
    std::process::exit(1);
  }

  Ok(())
}
