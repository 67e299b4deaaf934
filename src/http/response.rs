//! Payloads returned by the client, with their provenance.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Where a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
  /// Served from the response cache without touching the network
  Cache,
  /// Fetched from the API
  Api,
}

impl fmt::Display for Source {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Source::Cache => f.write_str("cache"),
      Source::Api => f.write_str("api"),
    }
  }
}

/// A payload plus the metadata the UI shows next to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
  pub data: T,
  pub source: Source,
  /// Wall-clock time from dispatch to resolution
  pub elapsed: Duration,
  /// When the cache entry was written (cache hits only)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> Fetched<T> {
  pub fn from_api(data: T, elapsed: Duration) -> Self {
    Self {
      data,
      source: Source::Api,
      elapsed,
      cached_at: None,
    }
  }

  pub fn from_cache(data: T, cached_at: Option<DateTime<Utc>>, elapsed: Duration) -> Self {
    Self {
      data,
      source: Source::Cache,
      elapsed,
      cached_at,
    }
  }

  /// Replace the payload, keeping the metadata.
  pub fn with_data<U>(self, data: U) -> Fetched<U> {
    Fetched {
      data,
      source: self.source,
      elapsed: self.elapsed,
      cached_at: self.cached_at,
    }
  }
}
