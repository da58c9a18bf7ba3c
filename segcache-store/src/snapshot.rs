//! Best-effort adapter over the cache backend.
//!
//! Snapshots are a convenience, not a source of truth: a read failure looks
//! like a miss and a write failure is only logged.

use segcache_cache::{CacheBackend, CacheNamespace};
use segcache_types::{EntityData, EntityId};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

pub(crate) struct SnapshotCache {
    namespace: Arc<dyn CacheNamespace>,
}

impl SnapshotCache {
    pub(crate) fn new(backend: &dyn CacheBackend, namespace: &str) -> Self {
        Self {
            namespace: backend.namespace(namespace),
        }
    }

    /// The last persisted composition of `id`, if any.
    pub(crate) fn load(&self, id: &EntityId) -> Option<EntityData> {
        match self.namespace.get(id.as_str()) {
            Ok(Some(Value::Object(data))) => Some(data),
            Ok(Some(other)) => {
                warn!(entity = %id, "Ignoring non-object snapshot: {}", other);
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(entity = %id, "Failed to read snapshot: {}", e);
                None
            }
        }
    }

    pub(crate) fn persist(&self, id: &EntityId, data: &EntityData) {
        if let Err(e) = self.namespace.set(id.as_str(), &Value::Object(data.clone())) {
            warn!(entity = %id, "Failed to persist snapshot: {}", e);
        }
    }
}
