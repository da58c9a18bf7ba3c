//! Listeners, subscription handles and the per-entry listener registry.
//!
//! A listener is identified by its [`ListenerKey`], not by the closure it
//! wraps. A consumer that is torn down and rebuilt re-subscribes with the same
//! key and silently replaces its stale registration.

use segcache_types::{EntityId, SegmentType};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Callback invoked with the projected value of the subscribed segment.
pub type Callback = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

/// Stable identity of a logical subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerKey(String);

impl ListenerKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// A key no other listener will ever share.
    pub fn unique() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListenerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A keyed callback.
#[derive(Clone)]
pub struct Listener {
    key: ListenerKey,
    callback: Callback,
}

impl Listener {
    /// An anonymous listener. It never replaces another registration.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            key: ListenerKey::unique(),
            callback: Arc::new(callback),
        }
    }

    /// A listener with a consumer-chosen key. Re-attaching under the same key
    /// and segment replaces the earlier registration.
    pub fn keyed<F>(key: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            key: ListenerKey::new(key),
            callback: Arc::new(callback),
        }
    }

    pub fn key(&self) -> &ListenerKey {
        &self.key
    }

    pub(crate) fn callback(&self) -> &Callback {
        &self.callback
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("key", &self.key).finish_non_exhaustive()
    }
}

/// Store-wide unique id of one attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Handle returned by `get`, used to dispose of the subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    id: SubscriptionId,
    entity_id: EntityId,
    segment: SegmentType,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, entity_id: EntityId, segment: SegmentType) -> Self {
        Self {
            id,
            entity_id,
            segment,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn segment(&self) -> SegmentType {
        self.segment
    }
}

/// One registration as seen by the broadcaster.
///
/// `delivered` holds the newest entry version handed to this registration.
/// It is locked for the duration of a delivery, so a registration never
/// observes an older version after a newer one.
#[derive(Clone)]
pub(crate) struct Target {
    pub(crate) segment: SegmentType,
    pub(crate) callback: Callback,
    pub(crate) delivered: Arc<Mutex<u64>>,
}

struct ListenerRecord {
    id: SubscriptionId,
    key: ListenerKey,
    target: Target,
}

/// Ordered listener collection of one store entry.
///
/// Invariant: no two records share both segment and key.
#[derive(Default)]
pub(crate) struct ListenerSet {
    records: Vec<ListenerRecord>,
}

impl ListenerSet {
    /// Appends a registration, first dropping any record with the same
    /// segment and key. Returns the id of the replaced record, if any, and
    /// the new record's delivery target.
    pub(crate) fn attach(
        &mut self,
        id: SubscriptionId,
        segment: SegmentType,
        listener: Listener,
    ) -> (Option<SubscriptionId>, Target) {
        let mut replaced = None;
        self.records.retain(|record| {
            let same = record.target.segment == segment && record.key == listener.key;
            if same {
                replaced = Some(record.id);
            }
            !same
        });
        let target = Target {
            segment,
            callback: listener.callback,
            delivered: Arc::new(Mutex::new(0)),
        };
        self.records.push(ListenerRecord {
            id,
            key: listener.key,
            target: target.clone(),
        });
        (replaced, target)
    }

    /// Removes the record with `id`. Returns whether one was removed.
    pub(crate) fn detach(&mut self, id: SubscriptionId) -> bool {
        let before = self.records.len();
        self.records.retain(|record| record.id != id);
        self.records.len() != before
    }

    /// Targets interested in a change to `changed`, in registration order.
    pub(crate) fn interested(&self, changed: SegmentType) -> Vec<Target> {
        self.records
            .iter()
            .filter(|record| record.target.segment.observes(changed))
            .map(|record| record.target.clone())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
