//! The id → entry table.
//!
//! Holds at most one [`StoreEntry`] per id. Entries are created on first
//! reference and live until released, evicted by the capacity bound, or
//! discarded after a failed composition.

use crate::entry::{Composition, StoreEntry};
use segcache_types::{EntityData, EntityId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

pub(crate) struct StoreRegistry {
    entries: Mutex<HashMap<EntityId, Arc<StoreEntry>>>,
    clock: AtomicU64,
    max_entries: Option<usize>,
}

impl StoreRegistry {
    pub(crate) fn new(max_entries: Option<usize>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock: AtomicU64::new(0),
            max_entries,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<EntityId, Arc<StoreEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Returns the entry for `id`, creating it with `start()` as its
    /// composition when unseen. `start` runs under the table lock, so at most
    /// one composition is ever created per entry.
    pub(crate) fn resolve<F>(&self, id: &EntityId, start: F) -> Arc<StoreEntry>
    where
        F: FnOnce() -> Composition,
    {
        let tick = self.tick();
        let mut entries = self.entries();
        if let Some(entry) = entries.get(id) {
            entry.touch(tick);
            return Arc::clone(entry);
        }

        debug!(entity = %id, "Creating store entry");
        let entry = Arc::new(StoreEntry::new(id.clone(), start(), tick));
        entries.insert(id.clone(), Arc::clone(&entry));
        self.evict_over_capacity(&mut entries, id);
        entry
    }

    /// Replaces the data of `id`'s entry, creating an already-resolved entry
    /// when unseen.
    pub(crate) fn install(&self, id: &EntityId, data: EntityData) -> Arc<StoreEntry> {
        let tick = self.tick();
        let mut entries = self.entries();
        if let Some(entry) = entries.get(id) {
            entry.touch(tick);
            entry.replace(data);
            return Arc::clone(entry);
        }

        let entry = Arc::new(StoreEntry::resolved(id.clone(), data, tick));
        entries.insert(id.clone(), Arc::clone(&entry));
        self.evict_over_capacity(&mut entries, id);
        entry
    }

    pub(crate) fn get(&self, id: &EntityId) -> Option<Arc<StoreEntry>> {
        self.entries().get(id).cloned()
    }

    /// Drops `entry` from the table unless it has already been superseded.
    pub(crate) fn discard(&self, entry: &Arc<StoreEntry>) {
        let mut entries = self.entries();
        if entries
            .get(entry.id())
            .is_some_and(|current| Arc::ptr_eq(current, entry))
        {
            entries.remove(entry.id());
            debug!(entity = %entry.id(), "Discarded store entry");
        }
    }

    /// Runs `f` on `entry` under the table lock, provided `entry` is still
    /// the registered entry for its id. `None` when it was released or
    /// evicted in the meantime.
    pub(crate) fn with_current<T>(
        &self,
        entry: &Arc<StoreEntry>,
        f: impl FnOnce(&StoreEntry) -> T,
    ) -> Option<T> {
        let entries = self.entries();
        entries
            .get(entry.id())
            .is_some_and(|current| Arc::ptr_eq(current, entry))
            .then(|| f(entry))
    }

    pub(crate) fn release(&self, id: &EntityId) -> bool {
        self.entries().remove(id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries().len()
    }

    /// Evicts least-recently-used entries until the table fits the bound.
    /// Only idle, resolved entries other than `keep` are candidates, so the
    /// table may stay over the bound while everything is in use.
    fn evict_over_capacity(
        &self,
        entries: &mut HashMap<EntityId, Arc<StoreEntry>>,
        keep: &EntityId,
    ) {
        let Some(max) = self.max_entries else {
            return;
        };
        if entries.len() <= max {
            return;
        }

        let mut candidates: Vec<(u64, EntityId)> = entries
            .values()
            .filter(|entry| entry.id() != keep && entry.is_idle() && entry.is_resolved())
            .map(|entry| (entry.last_used(), entry.id().clone()))
            .collect();
        candidates.sort();

        let excess = entries.len() - max;
        for (_, id) in candidates.into_iter().take(excess) {
            entries.remove(&id);
            info!(entity = %id, "Evicted idle store entry");
        }
    }
}
