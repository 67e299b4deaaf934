use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CACHE_PREFIX;
use crate::http::{
  ApiSettings, RetryPolicy, BASE_DELAY, DEFAULT_TIMEOUT, DEFAULT_TTL, MAX_RETRIES,
  RETRYABLE_STATUS_CODES,
};
use crate::resas::{FetchOptions, LONG_TIMEOUT, POPULATION_TTL, PREFECTURE_TTL};

const ENDPOINT_VARS: [&str; 2] = ["JPOP_API_ENDPOINT", "NEXT_PUBLIC_API_ENDPOINT"];
const API_KEY_VARS: [&str; 2] = ["JPOP_API_KEY", "RESAS_API_KEY"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub retry: RetryConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  /// Base URL of the API; usually supplied through the environment
  pub endpoint: Option<String>,
  pub timeout_ms: u64,
  /// Timeout for the heavier population requests
  pub long_timeout_ms: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      endpoint: None,
      timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
      long_timeout_ms: LONG_TIMEOUT.as_millis() as u64,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
  pub max_retries: u32,
  pub base_delay_ms: u64,
  /// Statuses worth retrying
  pub status_codes: Vec<u16>,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_retries: MAX_RETRIES,
      base_delay_ms: BASE_DELAY.as_millis() as u64,
      status_codes: RETRYABLE_STATUS_CODES.to_vec(),
    }
  }
}

impl RetryConfig {
  pub fn policy(&self) -> RetryPolicy {
    RetryPolicy::new(self.max_retries, Duration::from_millis(self.base_delay_ms))
      .with_status_codes(self.status_codes.clone())
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub prefix: String,
  pub default_ttl_secs: u64,
  pub prefecture_ttl_secs: u64,
  pub population_ttl_secs: u64,
  /// Keep responses across runs; `false` caches in memory for one run only
  pub persist: bool,
  /// SQLite file backing the cache (default: $XDG_DATA_HOME/jpop/storage.db)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      prefix: CACHE_PREFIX.to_string(),
      default_ttl_secs: DEFAULT_TTL.as_secs(),
      prefecture_ttl_secs: PREFECTURE_TTL.as_secs(),
      population_ttl_secs: POPULATION_TTL.as_secs(),
      persist: true,
      path: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./jpop.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/jpop/config.yaml
  ///
  /// Without a file, defaults are used. The endpoint can be overridden by
  /// `JPOP_API_ENDPOINT`.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };

    if let Some(endpoint) = first_env(&ENDPOINT_VARS) {
      config.api.endpoint = Some(endpoint);
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("jpop.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("jpop").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Get the API key from environment variables.
  ///
  /// Checks JPOP_API_KEY first, then RESAS_API_KEY as fallback.
  pub fn get_api_key() -> Result<String> {
    first_env(&API_KEY_VARS).ok_or_else(|| {
      eyre!("API key not found. Set JPOP_API_KEY or RESAS_API_KEY environment variable.")
    })
  }

  /// Resolve connection settings. Missing endpoint or key is fatal.
  pub fn api_settings(&self) -> Result<ApiSettings> {
    self.api_settings_with_key(Self::get_api_key()?)
  }

  fn api_settings_with_key(&self, api_key: String) -> Result<ApiSettings> {
    let endpoint = self
      .api
      .endpoint
      .clone()
      .filter(|e| !e.trim().is_empty())
      .ok_or_else(|| {
        eyre!(
          "API endpoint not configured. Set JPOP_API_ENDPOINT or api.endpoint in the config file."
        )
      })?;

    if api_key.trim().is_empty() {
      return Err(eyre!("API key is empty"));
    }

    Ok(ApiSettings {
      endpoint,
      api_key,
      timeout: Duration::from_millis(self.api.timeout_ms),
    })
  }

  /// TTL for requests without an endpoint-specific one.
  pub fn default_ttl(&self) -> Duration {
    Duration::from_secs(self.cache.default_ttl_secs)
  }

  pub fn fetch_options(&self) -> FetchOptions {
    FetchOptions {
      prefecture_ttl: Duration::from_secs(self.cache.prefecture_ttl_secs),
      population_ttl: Duration::from_secs(self.cache.population_ttl_secs),
      population_timeout: Duration::from_millis(self.api.long_timeout_ms),
    }
  }

  /// Location of the cache database.
  pub fn storage_path(&self) -> Result<PathBuf> {
    match &self.cache.path {
      Some(path) => Ok(path.clone()),
      None => Ok(data_dir()?.join("storage.db")),
    }
  }
}

/// Per-user data directory, for the cache database and logs.
pub fn data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("jpop"))
}

fn first_env(names: &[&str]) -> Option<String> {
  names
    .iter()
    .filter_map(|name| std::env::var(name).ok())
    .find(|value| !value.trim().is_empty())
}
