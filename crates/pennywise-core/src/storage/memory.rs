//! In-memory storage backend

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::{Error, Result};

use super::StorageBackend;

/// In-process key-value map
///
/// An optional byte quota makes writes fail the way a full browser
/// storage area or disk would, without touching the existing value.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<MemoryInner>,
    quota: Option<usize>,
}

#[derive(Default)]
struct MemoryInner {
    values: HashMap<String, String>,
    /// Keys written through `external_set`/`external_remove`, not yet polled
    external: HashSet<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the total size of stored keys and values in bytes
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            inner: Mutex::default(),
            quota: Some(bytes),
        }
    }

    /// Simulate another context writing `key` (reported by `poll_external`)
    pub fn external_set(&self, key: &str, value: &str) -> Result<()> {
        let mut inner = self.lock()?;
        inner.values.insert(key.to_string(), value.to_string());
        inner.external.insert(key.to_string());
        Ok(())
    }

    /// Simulate another context removing `key`
    pub fn external_remove(&self, key: &str) -> Result<()> {
        let mut inner = self.lock()?;
        inner.values.remove(key);
        inner.external.insert(key.to_string());
        Ok(())
    }

    /// Bytes currently used by keys and values
    pub fn used_bytes(&self) -> usize {
        self.lock()
            .map(|inner| usage(&inner.values, None))
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| Error::Persistence("memory storage lock poisoned".into()))
    }
}

/// Total size, optionally pretending `replacing` holds a different value
fn usage(values: &HashMap<String, String>, replacing: Option<(&str, &str)>) -> usize {
    let mut total: usize = values
        .iter()
        .filter(|(k, _)| replacing.map_or(true, |(key, _)| k.as_str() != key))
        .map(|(k, v)| k.len() + v.len())
        .sum();
    if let Some((key, value)) = replacing {
        total += key.len() + value.len();
    }
    total
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut inner = self.lock()?;
        if let Some(quota) = self.quota {
            let needed = usage(&inner.values, Some((key, value)));
            if needed > quota {
                return Err(Error::Persistence(format!(
                    "quota exceeded writing '{}' ({} of {} bytes)",
                    key, needed, quota
                )));
            }
        }
        inner.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.values.remove(key);
        Ok(())
    }

    fn poll_external(&self) -> Result<Vec<String>> {
        let mut inner = self.lock()?;
        let mut keys: Vec<String> = inner.external.drain().collect();
        keys.sort();
        Ok(keys)
    }
}
