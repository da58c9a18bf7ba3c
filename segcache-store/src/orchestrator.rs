//! The update path: query layer call → merge → persist → notify → cascade.

use crate::broadcast;
use crate::error::{StoreError, StoreResult};
use crate::store::{SegmentStore, StoreInner};
use segcache_types::{EntityId, SegmentType};
use serde_json::Value;
use std::fmt;
use tracing::{debug, info};

/// One-off callback run after a successful update with the fresh projection
/// of the updated segment.
pub type UpdateCallback = Box<dyn FnOnce(&Value) + Send>;

/// A named mutation of one segment, optionally affecting a second entity.
pub struct UpdateRequest {
    method: String,
    query: Value,
    foreign_id: Option<EntityId>,
    callback: Option<UpdateCallback>,
}

impl UpdateRequest {
    pub fn new(method: impl Into<String>, query: Value) -> Self {
        Self {
            method: method.into(),
            query,
            foreign_id: None,
            callback: None,
        }
    }

    /// Marks `foreign_id` as affected by this mutation; its entry is
    /// recomposed and its listeners notified once the update lands.
    pub fn cascade_to(mut self, foreign_id: EntityId) -> Self {
        self.foreign_id = Some(foreign_id);
        self
    }

    /// Runs `callback` once, after persistence and notification.
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&Value) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn query(&self) -> &Value {
        &self.query
    }

    pub fn foreign_id(&self) -> Option<&EntityId> {
        self.foreign_id.as_ref()
    }
}

impl fmt::Debug for UpdateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateRequest")
            .field("method", &self.method)
            .field("query", &self.query)
            .field("foreign_id", &self.foreign_id)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl SegmentStore {
    /// Runs `request` against the query service bound to `segment` and
    /// folds the result into entity `id`.
    ///
    /// The service's answer is taken as the complete fresh value of the
    /// segment. Listeners on `segment` and on the root segment are notified.
    /// When the request names a foreign entity, that entity is recomposed,
    /// replaced and its listeners notified too. Returns the fresh projection
    /// of `segment`.
    ///
    /// A failing service call leaves the entry untouched. A failing cascade
    /// is reported as [`StoreError::Cascade`]; the primary merge stands and
    /// the completion callback does not run. Nothing is retried.
    pub async fn update(
        &self,
        segment: SegmentType,
        id: &EntityId,
        request: UpdateRequest,
    ) -> StoreResult<Value> {
        self.inner.update(segment, id, request).await
    }
}

impl StoreInner {
    async fn update(
        &self,
        segment: SegmentType,
        id: &EntityId,
        request: UpdateRequest,
    ) -> StoreResult<Value> {
        let UpdateRequest {
            method,
            query,
            foreign_id,
            callback,
        } = request;

        let service = self
            .composer
            .layer()
            .service(segment)
            .cloned()
            .ok_or(StoreError::UnboundSegment(segment))?;
        let entry = self.resolve(id).await?;

        debug!(entity = %id, %segment, method = %method, "Invoking query service");
        let fresh = service
            .call(&method, query)
            .await
            .map_err(|source| StoreError::Query { segment, source })?;

        let data = entry.merge(segment, fresh, &self.config)?;
        self.snapshots.persist(id, &data);
        broadcast::notify(&entry, segment);

        if let Some(foreign_id) = foreign_id {
            self.cascade(&foreign_id, segment)
                .await
                .map_err(|e| StoreError::Cascade {
                    foreign_id,
                    source: Box::new(e),
                })?;
        }

        let value = segment.project(&data);
        if let Some(callback) = callback {
            callback(&value);
        }
        Ok(value)
    }

    /// Recomposes `foreign_id` and pushes the result to its listeners on
    /// `segment` and on the root. Only the foreign entry is touched.
    async fn cascade(&self, foreign_id: &EntityId, segment: SegmentType) -> StoreResult<()> {
        info!(entity = %foreign_id, %segment, "Cascading update");
        let composed = self.composer.compose(foreign_id).await?;
        let entry = self.registry.install(foreign_id, composed.clone());
        self.snapshots.persist(foreign_id, &composed);
        broadcast::notify(&entry, segment);
        Ok(())
    }
}
