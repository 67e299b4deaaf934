//! Key-value storage backends for the response cache.
//!
//! A backend is a flat `key -> value` medium shared by everything that runs
//! against the same data directory. The cache owns only the keys under its
//! prefix; other keys are left alone.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

/// Trait for key-value storage backends.
///
/// Each operation touches a single key atomically. Concurrent writes to the
/// same key resolve as last-write-wins.
pub trait Storage: Send + Sync {
  /// Read the raw value stored under `key`.
  fn get_item(&self, key: &str) -> Result<Option<String>>;

  /// Write `value` under `key`, replacing any previous value.
  fn set_item(&self, key: &str, value: &str) -> Result<()>;

  /// Remove `key` if present.
  fn remove_item(&self, key: &str) -> Result<()>;

  /// List every key currently stored.
  fn keys(&self) -> Result<Vec<String>>;
}

/// Storage implementation that doesn't store anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl Storage for NoopStorage {
  fn get_item(&self, _key: &str) -> Result<Option<String>> {
    Ok(None) // Always miss
  }

  fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
    Ok(()) // Discard
  }

  fn remove_item(&self, _key: &str) -> Result<()> {
    Ok(())
  }

  fn keys(&self) -> Result<Vec<String>> {
    Ok(Vec::new())
  }
}

/// Process-local storage, lost when the process exits.
#[derive(Default)]
pub struct MemoryStorage {
  items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl Storage for MemoryStorage {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    let items = self
      .items
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(items.get(key).cloned())
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    let mut items = self
      .items
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    items.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<()> {
    let mut items = self
      .items
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    items.remove(key);
    Ok(())
  }

  fn keys(&self) -> Result<Vec<String>> {
    let items = self
      .items
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(items.keys().cloned().collect())
  }
}

/// SQLite-based persistent storage.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the storage at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create storage directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open storage at {}: {}", path.display(), e))?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Run database migrations for the storage table.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(STORAGE_SCHEMA)
      .map_err(|e| eyre!("Failed to run storage migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for the key-value table.
const STORAGE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    written_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl Storage for SqliteStorage {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row(
        "SELECT value FROM kv_store WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read key {}: {}", key, e))
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO kv_store (key, value, written_at)
         VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to write key {}: {}", key, e))?;

    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM kv_store WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to remove key {}: {}", key, e))?;

    Ok(())
  }

  fn keys(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT key FROM kv_store ORDER BY key")
      .map_err(|e| eyre!("Failed to prepare key listing: {}", e))?;

    let keys = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list keys: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read key: {}", e))?;

    Ok(keys)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sqlite_round_trip_and_remove() {
    let dir = tempfile::tempdir().unwrap();
    let storage = SqliteStorage::open_at(&dir.path().join("storage.db")).unwrap();

    assert_eq!(storage.get_item("a").unwrap(), None);

    storage.set_item("a", "1").unwrap();
    storage.set_item("a", "2").unwrap();
    storage.set_item("b", "3").unwrap();

    assert_eq!(storage.get_item("a").unwrap().as_deref(), Some("2"));
    assert_eq!(storage.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);

    storage.remove_item("a").unwrap();
    assert_eq!(storage.get_item("a").unwrap(), None);
    assert_eq!(storage.keys().unwrap(), vec!["b".to_string()]);
  }

  #[test]
  fn test_sqlite_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("storage.db");

    SqliteStorage::open_at(&path)
      .unwrap()
      .set_item("kept", "value")
      .unwrap();

    let reopened = SqliteStorage::open_at(&path).unwrap();
    assert_eq!(reopened.get_item("kept").unwrap().as_deref(), Some("value"));
  }

  #[test]
  fn test_memory_storage() {
    let storage = MemoryStorage::new();
    storage.set_item("x", "y").unwrap();
    assert_eq!(storage.get_item("x").unwrap().as_deref(), Some("y"));
    storage.remove_item("x").unwrap();
    assert!(storage.keys().unwrap().is_empty());
  }

  #[test]
  fn test_noop_storage_always_misses() {
    let storage = NoopStorage;
    storage.set_item("x", "y").unwrap();
    assert_eq!(storage.get_item("x").unwrap(), None);
    assert!(storage.keys().unwrap().is_empty());
  }
}
