use crate::error::CacheResult;
use serde_json::Value;
use std::sync::Arc;

/// A namespaced snapshot store.
pub trait CacheBackend: Send + Sync {
    /// Returns the namespace called `name`, creating it if needed.
    ///
    /// Two calls with the same name address the same snapshots.
    fn namespace(&self, name: &str) -> Arc<dyn CacheNamespace>;
}

/// One key/value space of JSON snapshots, keyed by entity id.
pub trait CacheNamespace: Send + Sync {
    /// Reads the snapshot stored under `key`.
    fn get(&self, key: &str) -> CacheResult<Option<Value>>;

    /// Stores `value` under `key`, replacing any earlier snapshot.
    fn set(&self, key: &str, value: &Value) -> CacheResult<()>;

    /// Removes the snapshot under `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> CacheResult<()>;

    /// All keys currently stored, sorted.
    fn keys(&self) -> CacheResult<Vec<String>>;
}
