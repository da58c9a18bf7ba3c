use crate::error::QueryResult;
use async_trait::async_trait;
use segcache_types::EntityId;
use serde_json::Value;

/// Reads and mutates one segment of an entity on a remote system.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Reads the current value of this service's segment for `id`.
    async fn query(&self, id: &EntityId) -> QueryResult<Value>;

    /// Runs the named mutation and returns the complete fresh value of the
    /// segment(s) it governs.
    async fn call(&self, method: &str, query: Value) -> QueryResult<Value>;
}
