//! A single entity's cached data and listeners.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::listener::{Listener, ListenerSet, SubscriptionId, Target};
use futures::FutureExt;
use futures::future::{self, BoxFuture, Shared};
use segcache_types::{EntityData, EntityId, SegmentType};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The single in-flight (or finished) composition of an entry, shared by
/// every task that waits on it.
pub(crate) type Composition = Shared<BoxFuture<'static, StoreResult<EntityData>>>;

/// Entity data tagged with a version bumped on every write.
#[derive(Default)]
struct Versioned {
    version: u64,
    data: Option<EntityData>,
}

impl Versioned {
    fn set(&mut self, data: EntityData) {
        self.version += 1;
        self.data = Some(data);
    }
}

/// Outcome of registering a listener on an entry.
pub(crate) struct Attached {
    pub(crate) replaced: Option<SubscriptionId>,
    pub(crate) target: Target,
    /// Entry version the projection below was taken from.
    pub(crate) version: u64,
    pub(crate) value: Value,
}

/// The store's state for one entity id.
///
/// `data` stays `None` until the composition resolves. It is written only by
/// the composition install, an update merge, or a cascade replacement.
pub(crate) struct StoreEntry {
    id: EntityId,
    data: RwLock<Versioned>,
    listeners: Mutex<ListenerSet>,
    composition: Composition,
    last_used: AtomicU64,
}

impl StoreEntry {
    pub(crate) fn new(id: EntityId, composition: Composition, tick: u64) -> Self {
        Self {
            id,
            data: RwLock::new(Versioned::default()),
            listeners: Mutex::new(ListenerSet::default()),
            composition,
            last_used: AtomicU64::new(tick),
        }
    }

    /// An entry whose data is already known.
    pub(crate) fn resolved(id: EntityId, data: EntityData, tick: u64) -> Self {
        let composition = future::ready(Ok::<_, StoreError>(data.clone()))
            .boxed()
            .shared();
        let entry = Self::new(id, composition, tick);
        entry.write().set(data);
        entry
    }

    pub(crate) fn id(&self) -> &EntityId {
        &self.id
    }

    /// Waits for the composition and installs its result if nothing else
    /// has populated the entry yet. Returns the installed data, if this
    /// call was the one that installed it.
    ///
    /// A failed composition is tolerated when the entry was populated by
    /// other means (a cascade) while it was in flight.
    pub(crate) async fn ready(&self) -> StoreResult<Option<EntityData>> {
        let outcome = self.composition.clone().await;
        let mut state = self.write();
        match outcome {
            Ok(composed) if state.data.is_none() => {
                state.set(composed.clone());
                Ok(Some(composed))
            }
            Ok(_) => Ok(None),
            Err(_) if state.data.is_some() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Versioned> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Versioned> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the entry holds composed data.
    pub(crate) fn is_resolved(&self) -> bool {
        self.read().data.is_some()
    }

    /// A copy of the current data, if composed.
    pub(crate) fn data(&self) -> Option<EntityData> {
        self.read().data.clone()
    }

    /// The current data together with its version, if composed.
    pub(crate) fn versioned(&self) -> Option<(u64, EntityData)> {
        let state = self.read();
        state.data.clone().map(|data| (state.version, data))
    }

    /// Merges the fresh value returned by a mutation of `segment`.
    ///
    /// The root segment must return an object; its non-reserved fields are
    /// copied to the top level. Any other segment's value replaces the
    /// segment wholesale. Nothing is written when the payload is rejected.
    pub(crate) fn merge(
        &self,
        segment: SegmentType,
        fresh: Value,
        config: &StoreConfig,
    ) -> StoreResult<EntityData> {
        if segment.is_root() && !fresh.is_object() {
            return Err(StoreError::InvalidPayload {
                segment,
                reason: format!("expected an object, got {}", kind_of(&fresh)),
            });
        }

        let mut state = self.write();
        let mut data = state.data.take().unwrap_or_default();
        match fresh {
            Value::Object(fields) if segment.is_root() => {
                for (field, value) in fields {
                    if !config.is_reserved(&field) {
                        data.insert(field, value);
                    }
                }
            }
            other => {
                data.insert(segment.key().to_string(), other);
            }
        }
        state.set(data.clone());
        Ok(data)
    }

    /// Replaces the data wholesale (cascade recomposition).
    pub(crate) fn replace(&self, data: EntityData) {
        self.write().set(data);
    }

    fn listeners(&self) -> MutexGuard<'_, ListenerSet> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `listener` and returns the projection of `segment` as seen
    /// at registration time, with the version it was taken from.
    pub(crate) fn attach(
        &self,
        id: SubscriptionId,
        segment: SegmentType,
        listener: Listener,
    ) -> Attached {
        let state = self.read();
        let (replaced, target) = self.listeners().attach(id, segment, listener);
        let value = state.data.as_ref().map_or(Value::Null, |d| segment.project(d));
        Attached {
            replaced,
            target,
            version: state.version,
            value,
        }
    }

    pub(crate) fn detach(&self, id: SubscriptionId) -> bool {
        self.listeners().detach(id)
    }

    pub(crate) fn interested(&self, changed: SegmentType) -> Vec<Target> {
        self.listeners().interested(changed)
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners().len()
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.listeners().is_empty()
    }

    pub(crate) fn touch(&self, tick: u64) {
        self.last_used.store(tick, Ordering::Relaxed);
    }

    pub(crate) fn last_used(&self) -> u64 {
        self.last_used.load(Ordering::Relaxed)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
