//! Response cache for the API client.
//!
//! This module provides a storage-agnostic caching mechanism that:
//! - Stores JSON payloads with their write time under a fixed key prefix
//! - Leaves freshness decisions to the caller (each endpoint has its own TTL)
//! - Degrades to "always miss" when the storage backend misbehaves

mod key;
mod storage;
mod store;

pub use key::CacheKey;
pub use storage::{MemoryStorage, NoopStorage, SqliteStorage, Storage};
pub use store::{CacheEntry, CacheStore, CACHE_PREFIX};
