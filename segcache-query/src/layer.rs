//! Segment → service bindings.

use crate::service::QueryService;
use segcache_types::SegmentType;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The set of query services, one per bound segment type.
#[derive(Clone, Default)]
pub struct QueryLayer {
    services: HashMap<SegmentType, Arc<dyn QueryService>>,
}

impl QueryLayer {
    /// Starts building a query layer.
    pub fn builder() -> QueryLayerBuilder {
        QueryLayerBuilder::default()
    }

    /// Returns the service bound to `segment`, if any.
    pub fn service(&self, segment: SegmentType) -> Option<&Arc<dyn QueryService>> {
        self.services.get(&segment)
    }

    /// Bound segments in [`SegmentType::ALL`] order, root first.
    pub fn segments(&self) -> impl Iterator<Item = SegmentType> + '_ {
        SegmentType::ALL
            .into_iter()
            .filter(|segment| self.services.contains_key(segment))
    }

    /// Whether no service is bound at all.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for QueryLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryLayer")
            .field("segments", &self.segments().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`QueryLayer`].
#[derive(Default)]
pub struct QueryLayerBuilder {
    services: HashMap<SegmentType, Arc<dyn QueryService>>,
}

impl QueryLayerBuilder {
    /// Binds `service` to `segment`, replacing any earlier binding.
    pub fn service(mut self, segment: SegmentType, service: Arc<dyn QueryService>) -> Self {
        self.services.insert(segment, service);
        self
    }

    pub fn build(self) -> QueryLayer {
        QueryLayer {
            services: self.services,
        }
    }
}
