//! Pluggable key-value storage backends
//!
//! The store only needs string values under string keys. Backends:
//! - `MemoryStorage`: in-process map, optional quota (tests, ephemeral use)
//! - `SqliteStorage`: durable, shareable between processes
//!
//! Backends are also responsible for noticing writes made by another process
//! and reporting them through `poll_external`, which the store turns into
//! change notifications.

mod memory;
mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use crate::error::Result;

/// Key-value persistence used by the store
pub trait StorageBackend: Send + Sync {
    /// Read the value under `key`, `None` if absent
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write `value` under `key`. Either fully applied or not at all.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Keys changed by another process since the previous call
    fn poll_external(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
