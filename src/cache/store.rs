//! Prefixed, timestamped response cache over a [`Storage`] backend.
//!
//! The store never decides freshness itself: it records when an entry was
//! written, and callers compare that against the TTL of their endpoint.
//! Storage failures are logged and swallowed, so a broken backend behaves
//! like an empty cache.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::key::CacheKey;
use super::storage::Storage;

/// Prefix under which every cache key is stored.
pub const CACHE_PREFIX: &str = "api_cache_";

/// A cached payload and the time it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
  pub data: Value,
  /// Milliseconds since the Unix epoch
  pub timestamp: i64,
}

impl CacheEntry {
  /// Valid iff `0 <= now - timestamp < ttl`. An entry stamped in the future
  /// (clock skew) is stale.
  pub fn is_fresh_at(&self, now_millis: i64, ttl: Duration) -> bool {
    let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    let age = now_millis.saturating_sub(self.timestamp);
    (0..ttl_millis).contains(&age)
  }

  pub fn is_fresh(&self, ttl: Duration) -> bool {
    self.is_fresh_at(Utc::now().timestamp_millis(), ttl)
  }

  pub fn cached_at(&self) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(self.timestamp).single()
  }
}

/// Borrowed form of [`CacheEntry`] for writing without cloning the payload.
#[derive(Serialize)]
struct EntryRef<'a> {
  data: &'a Value,
  timestamp: i64,
}

/// Response cache bound to one storage origin.
#[derive(Clone)]
pub struct CacheStore {
  storage: Arc<dyn Storage>,
  prefix: String,
}

impl CacheStore {
  /// Create a cache store over the given storage with the default prefix.
  pub fn new(storage: Arc<dyn Storage>) -> Self {
    Self {
      storage,
      prefix: CACHE_PREFIX.to_string(),
    }
  }

  /// Store entries under `prefix` instead of the default one.
  pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
    self.prefix = prefix.into();
    self
  }

  /// Key under which `key` lives in the storage medium.
  pub fn storage_key(&self, key: &CacheKey) -> String {
    format!("{}{}", self.prefix, key.as_str())
  }

  /// Look up an entry. Unreadable or corrupt entries count as absent.
  pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
    let storage_key = self.storage_key(key);

    let raw = match self.storage.get_item(&storage_key) {
      Ok(Some(raw)) => raw,
      Ok(None) => return None,
      Err(e) => {
        warn!(key = %key, "Cache read error: {}", e);
        return None;
      }
    };

    match serde_json::from_str(&raw) {
      Ok(entry) => Some(entry),
      Err(e) => {
        warn!(key = %key, "Discarding corrupt cache entry: {}", e);
        self.remove(key);
        None
      }
    }
  }

  /// Store `data` stamped with the current time. Best-effort.
  pub fn set(&self, key: &CacheKey, data: &Value) {
    let entry = EntryRef {
      data,
      timestamp: Utc::now().timestamp_millis(),
    };

    let raw = match serde_json::to_string(&entry) {
      Ok(raw) => raw,
      Err(e) => {
        warn!(key = %key, "Cache serialization error: {}", e);
        return;
      }
    };

    if let Err(e) = self.storage.set_item(&self.storage_key(key), &raw) {
      warn!(key = %key, "Cache write error: {}", e);
      // A half-written value is worse than none
      self.remove(key);
    } else {
      debug!(key = %key, "Cached response");
    }
  }

  /// Remove a single entry.
  pub fn remove(&self, key: &CacheKey) {
    if let Err(e) = self.storage.remove_item(&self.storage_key(key)) {
      warn!(key = %key, "Cache remove error: {}", e);
    }
  }

  /// Remove every key under the prefix. Returns how many were removed.
  pub fn clear(&self) -> usize {
    let keys = match self.storage.keys() {
      Ok(keys) => keys,
      Err(e) => {
        warn!("Cache clear error: {}", e);
        return 0;
      }
    };

    let mut removed = 0;
    for key in keys.iter().filter(|k| k.starts_with(&self.prefix)) {
      match self.storage.remove_item(key) {
        Ok(()) => removed += 1,
        Err(e) => warn!(key = %key, "Cache clear error: {}", e),
      }
    }

    debug!(removed, "Cleared cache");
    removed
  }
}
