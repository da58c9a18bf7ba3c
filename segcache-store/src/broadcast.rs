//! Delivery of segment values to listeners.
//!
//! Delivery is synchronous with respect to the caller. A listener that
//! returns an error or panics is logged and skipped; the remaining listeners
//! still receive the value.

use crate::entry::StoreEntry;
use crate::listener::{Callback, Target};
use segcache_types::{EntityId, SegmentType};
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::PoisonError;
use tracing::{trace, warn};

/// Invokes one callback, isolating its failure. Returns whether it succeeded.
pub(crate) fn deliver(
    entity_id: &EntityId,
    segment: SegmentType,
    callback: &Callback,
    value: &Value,
) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| callback(value))) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(entity = %entity_id, %segment, "Listener failed: {:#}", e);
            false
        }
        Err(_) => {
            warn!(entity = %entity_id, %segment, "Listener panicked during delivery");
            false
        }
    }
}

/// Delivers `value`, taken from entry version `version`, to a registered
/// target. Skipped when the target has already seen this or a newer version.
/// Returns whether the callback ran.
pub(crate) fn deliver_to(
    entity_id: &EntityId,
    target: &Target,
    version: u64,
    value: &Value,
) -> bool {
    let mut delivered = target
        .delivered
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if *delivered >= version {
        trace!(entity = %entity_id, segment = %target.segment, version, "Skipping stale delivery");
        return false;
    }
    *delivered = version;
    deliver(entity_id, target.segment, &target.callback, value);
    true
}

/// Notifies every listener on `entry` interested in a change to `changed`:
/// listeners on `changed` itself get its projection, root listeners get the
/// whole entity. Returns the number of listeners invoked.
pub(crate) fn notify(entry: &StoreEntry, changed: SegmentType) -> usize {
    let Some((version, data)) = entry.versioned() else {
        return 0;
    };
    let targets = entry.interested(changed);
    if targets.is_empty() {
        return 0;
    }

    let changed_value = changed.project(&data);
    let root_value = if changed.is_root() {
        None
    } else {
        Some(SegmentType::ROOT.project(&data))
    };

    let mut invoked = 0;
    for target in &targets {
        let value = match &root_value {
            Some(root) if target.segment.is_root() => root,
            _ => &changed_value,
        };
        if deliver_to(entry.id(), target, version, value) {
            invoked += 1;
        }
    }

    trace!(
        entity = %entry.id(),
        segment = %changed,
        listeners = invoked,
        "Broadcast delivered"
    );
    invoked
}
