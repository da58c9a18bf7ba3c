//! The consumer-facing store handle.

use crate::broadcast;
use crate::composer::Composer;
use crate::config::StoreConfig;
use crate::entry::StoreEntry;
use crate::error::StoreResult;
use crate::listener::{Listener, Subscription, SubscriptionId};
use crate::registry::StoreRegistry;
use crate::snapshot::SnapshotCache;
use futures::FutureExt;
use futures::future::BoxFuture;
use segcache_cache::CacheBackend;
use segcache_query::QueryLayer;
use segcache_types::{EntityData, EntityId, SegmentType};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// A per-entity cache of composed server data with segment subscriptions.
///
/// Construct one per application and hand clones to every call site; clones
/// share the same entries, listeners and snapshots.
#[derive(Clone)]
pub struct SegmentStore {
    pub(crate) inner: Arc<StoreInner>,
}

pub(crate) struct StoreInner {
    pub(crate) config: StoreConfig,
    pub(crate) composer: Arc<Composer>,
    pub(crate) snapshots: SnapshotCache,
    pub(crate) registry: StoreRegistry,
    next_subscription: AtomicU64,
}

impl SegmentStore {
    /// Creates a store reading through `layer` and keeping snapshots in the
    /// configured namespace of `backend`.
    pub fn new(config: StoreConfig, layer: QueryLayer, backend: &dyn CacheBackend) -> Self {
        let snapshots = SnapshotCache::new(backend, &config.cache_namespace);
        let registry = StoreRegistry::new(config.max_entries);
        let composer = Arc::new(Composer::new(layer, config.clone()));
        Self {
            inner: Arc::new(StoreInner {
                config,
                composer,
                snapshots,
                registry,
                next_subscription: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Subscribes `listener` to `segment` of entity `id`.
    ///
    /// If a snapshot of `id` is cached, its projection is delivered to the
    /// listener right here, before this method returns. The returned future
    /// then resolves (or joins) the entity's composition, registers the
    /// listener and delivers the canonical value to it exactly once. If the
    /// entry is released while the composition is in flight, the future
    /// resolves the id again and subscribes to the new entry.
    pub fn get(
        &self,
        segment: SegmentType,
        id: &EntityId,
        listener: Listener,
    ) -> BoxFuture<'static, StoreResult<Subscription>> {
        if let Some(cached) = self.inner.snapshots.load(id) {
            debug!(entity = %id, %segment, "Serving cached snapshot");
            broadcast::deliver(id, segment, listener.callback(), &segment.project(&cached));
        }

        let inner = Arc::clone(&self.inner);
        let id = id.clone();
        async move {
            loop {
                let entry = inner.resolve(&id).await?;
                let sub_id = inner.next_subscription_id();
                let attached = inner.registry.with_current(&entry, |entry| {
                    entry.attach(sub_id, segment, listener.clone())
                });
                let Some(attached) = attached else {
                    debug!(entity = %id, %segment, "Entry released while resolving, retrying");
                    continue;
                };

                if let Some(old) = attached.replaced {
                    debug!(entity = %id, %segment, "Subscription {} replaced {}", sub_id, old);
                }
                broadcast::deliver_to(&id, &attached.target, attached.version, &attached.value);
                return Ok(Subscription::new(sub_id, id, segment));
            }
        }
        .boxed()
    }

    /// Disposes of a subscription. Returns whether it was still registered.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.inner
            .registry
            .get(subscription.entity_id())
            .is_some_and(|entry| entry.detach(subscription.id()))
    }

    /// Drops the entry for `id` together with its listeners. The cached
    /// snapshot is kept. Returns whether an entry existed.
    pub fn release(&self, id: &EntityId) -> bool {
        let released = self.inner.registry.release(id);
        if released {
            debug!(entity = %id, "Released store entry");
        }
        released
    }

    /// The composed data of `id`, if its entry exists and has resolved.
    pub fn peek(&self, id: &EntityId) -> Option<EntityData> {
        self.inner.registry.get(id).and_then(|entry| entry.data())
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.inner.registry.get(id).is_some()
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn listener_count(&self, id: &EntityId) -> usize {
        self.inner
            .registry
            .get(id)
            .map_or(0, |entry| entry.listener_count())
    }
}

impl StoreInner {
    fn next_subscription_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_subscription.fetch_add(1, Ordering::Relaxed))
    }

    /// Resolves the entry for `id`, joining or starting its composition.
    /// Takes no listener: both `get` and `update` go through here.
    ///
    /// The caller that installs a fresh composition persists it. A failed
    /// composition removes the entry so the next reference starts over.
    pub(crate) async fn resolve(&self, id: &EntityId) -> StoreResult<Arc<StoreEntry>> {
        let entry = self.registry.resolve(id, || {
            let composer = Arc::clone(&self.composer);
            let id = id.clone();
            async move { composer.compose(&id).await }.boxed().shared()
        });

        match entry.ready().await {
            Ok(Some(composed)) => {
                self.snapshots.persist(id, &composed);
                Ok(entry)
            }
            Ok(None) => Ok(entry),
            Err(e) => {
                self.registry.discard(&entry);
                Err(e)
            }
        }
    }
}
