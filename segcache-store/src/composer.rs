//! Builds a full entity view from per-segment reads.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use futures::future::try_join_all;
use segcache_query::QueryLayer;
use segcache_types::{EntityData, EntityId};
use serde_json::Value;
use tracing::debug;

/// Field holding the entity id in every composed object.
pub const ID_FIELD: &str = "id";

/// Reads every bound segment of an entity and assembles one object.
pub(crate) struct Composer {
    layer: QueryLayer,
    config: StoreConfig,
}

impl Composer {
    pub(crate) fn new(layer: QueryLayer, config: StoreConfig) -> Self {
        Self { layer, config }
    }

    pub(crate) fn layer(&self) -> &QueryLayer {
        &self.layer
    }

    /// Composes `id` by reading all bound segments concurrently.
    ///
    /// The root read contributes its non-reserved fields at the top level;
    /// every other segment lands under its key. The first failing read fails
    /// the whole composition.
    pub(crate) async fn compose(&self, id: &EntityId) -> StoreResult<EntityData> {
        debug!(entity = %id, "Composing entity");

        let reads = self.layer.segments().map(|segment| async move {
            let service = self
                .layer
                .service(segment)
                .ok_or(StoreError::UnboundSegment(segment))?;
            let value = service
                .query(id)
                .await
                .map_err(|source| StoreError::Query { segment, source })?;
            Ok::<_, StoreError>((segment, value))
        });
        let results = try_join_all(reads).await?;

        let mut data = EntityData::new();
        data.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        for (segment, value) in results {
            if !segment.is_root() {
                data.insert(segment.key().to_string(), value);
                continue;
            }
            match value {
                Value::Object(fields) => {
                    for (field, value) in fields {
                        if !self.config.is_reserved(&field) {
                            data.insert(field, value);
                        }
                    }
                }
                Value::Null => {}
                other => {
                    return Err(StoreError::InvalidPayload {
                        segment,
                        reason: format!("root read must return an object, got {other}"),
                    });
                }
            }
        }

        debug!(entity = %id, fields = data.len(), "Composition finished");
        Ok(data)
    }
}
