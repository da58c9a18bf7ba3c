//! Process-local snapshot backend.

use crate::backend::{CacheBackend, CacheNamespace};
use crate::error::CacheResult;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Keeps snapshots in memory for the life of the process.
#[derive(Default)]
pub struct MemoryCache {
    spaces: Mutex<HashMap<String, Arc<MemoryNamespace>>>,
}

impl MemoryCache {
    /// Creates an empty in-memory cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheBackend for MemoryCache {
    fn namespace(&self, name: &str) -> Arc<dyn CacheNamespace> {
        let mut spaces = self.spaces.lock().unwrap_or_else(PoisonError::into_inner);
        spaces.entry(name.to_string()).or_default().clone()
    }
}

#[derive(Default)]
struct MemoryNamespace {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl CacheNamespace for MemoryNamespace {
    fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> CacheResult<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    fn keys(&self) -> CacheResult<Vec<String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.keys().cloned().collect())
    }
}
