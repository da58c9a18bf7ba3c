mod common;

use common::{Recorder, id, init_tracing, social, social_with};
use pretty_assertions::assert_eq;
use segcache_cache::CacheNamespace;
use segcache_store::{Listener, SegmentType, StoreConfig, StoreError};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

fn composed_u1() -> Value {
    json!({
        "id": "u1",
        "name": "user u1",
        "wishlist": [],
        "followers": 0,
        "following": [],
    })
}

// ── Composition & singleton lifecycle ────────────────────────────

#[tokio::test]
async fn first_get_composes_and_delivers_once() {
    init_tracing();
    let s = social();
    let rec = Recorder::new();

    let sub = s
        .store
        .get(SegmentType::User, &id("u1"), rec.listener())
        .await
        .unwrap();

    assert_eq!(rec.values(), vec![composed_u1()]);
    assert_eq!(sub.entity_id(), &id("u1"));
    assert_eq!(sub.segment(), SegmentType::User);
    assert_eq!(s.user.reads(), 1);
    assert_eq!(s.followers.reads(), 1);
}

#[tokio::test]
async fn segment_get_delivers_projection() {
    let s = social();
    s.world.lock().unwrap().followers.insert("u1".into(), 12);
    let rec = Recorder::new();

    s.store
        .get(SegmentType::Followers, &id("u1"), rec.listener())
        .await
        .unwrap();

    assert_eq!(rec.values(), vec![json!(12)]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_first_gets_share_one_composition() {
    let s = social_with(StoreConfig::default(), Some(Duration::from_millis(50)));
    let a = Recorder::new();
    let b = Recorder::new();
    let u1 = id("u1");

    let (ra, rb) = tokio::join!(
        s.store.get(SegmentType::User, &u1, a.listener()),
        s.store.get(SegmentType::User, &u1, b.listener()),
    );
    ra.unwrap();
    rb.unwrap();

    assert_eq!(s.user.reads(), 1);
    assert_eq!(s.wishlist.reads(), 1);
    assert_eq!(s.followers.reads(), 1);
    assert_eq!(s.following.reads(), 1);
    assert_eq!(a.values(), b.values());
    assert_eq!(a.values(), vec![composed_u1()]);
    assert_eq!(s.store.len(), 1);
    assert_eq!(s.store.listener_count(&u1), 2);
}

#[tokio::test]
async fn later_get_reuses_resolved_entry() {
    let s = social();
    let u1 = id("u1");
    s.store
        .get(SegmentType::User, &u1, Recorder::new().listener())
        .await
        .unwrap();

    let rec = Recorder::new();
    s.store
        .get(SegmentType::Wishlist, &u1, rec.listener())
        .await
        .unwrap();

    assert_eq!(s.user.reads(), 1);
    // The first get persisted a snapshot, so the second sees it first.
    assert_eq!(rec.values(), vec![json!([]), json!([])]);
}

#[tokio::test(start_paused = true)]
async fn failed_composition_reaches_every_waiter_and_is_retried_later() {
    let s = social_with(StoreConfig::default(), Some(Duration::from_millis(10)));
    let broken = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&broken);
    let reads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reads);

    // Rebuild a store whose root service fails until the flag is cleared.
    let user = segcache_query::mock::MockService::reading(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        if flag.load(Ordering::SeqCst) {
            Err(segcache_query::QueryError::Remote("down".into()))
        } else {
            Ok(json!({"name": "back"}))
        }
    })
    .with_delay(Duration::from_millis(10));
    let layer = segcache_query::QueryLayer::builder()
        .service(SegmentType::User, Arc::new(user))
        .build();
    let store = segcache_store::SegmentStore::new(StoreConfig::default(), layer, &*s.cache);
    let u1 = id("u1");

    let a = Recorder::new();
    let b = Recorder::new();
    let (ra, rb) = tokio::join!(
        store.get(SegmentType::User, &u1, a.listener()),
        store.get(SegmentType::User, &u1, b.listener()),
    );

    assert!(matches!(ra, Err(StoreError::Query { segment: SegmentType::User, .. })));
    assert!(matches!(rb, Err(StoreError::Query { segment: SegmentType::User, .. })));
    assert_eq!(reads.load(Ordering::SeqCst), 1);
    assert!(a.values().is_empty());
    assert!(!store.contains(&u1));

    broken.store(false, Ordering::SeqCst);
    store
        .get(SegmentType::User, &u1, a.listener())
        .await
        .unwrap();
    assert_eq!(reads.load(Ordering::SeqCst), 2);
    assert_eq!(a.values(), vec![json!({"id": "u1", "name": "back"})]);
}

// ── Stale-while-revalidate ───────────────────────────────────────

#[tokio::test]
async fn cached_snapshot_is_delivered_before_fresh_value() {
    let s = social();
    s.snapshots()
        .set("u1", &json!({"id": "u1", "followers": 5}))
        .unwrap();
    s.world.lock().unwrap().followers.insert("u1".into(), 9);
    let rec = Recorder::new();

    let pending = s.store.get(SegmentType::Followers, &id("u1"), rec.listener());
    // Delivered synchronously, before the future is polled.
    assert_eq!(rec.values(), vec![json!(5)]);

    pending.await.unwrap();
    assert_eq!(rec.values(), vec![json!(5), json!(9)]);
}

#[tokio::test]
async fn no_snapshot_means_single_delivery() {
    let s = social();
    let rec = Recorder::new();
    let pending = s.store.get(SegmentType::Followers, &id("u1"), rec.listener());
    assert!(rec.values().is_empty());
    pending.await.unwrap();
    assert_eq!(rec.values(), vec![json!(0)]);
}

#[tokio::test]
async fn corrupt_snapshot_is_ignored() {
    let s = social();
    s.snapshots().set("u1", &json!("not an object")).unwrap();
    let rec = Recorder::new();

    s.store
        .get(SegmentType::User, &id("u1"), rec.listener())
        .await
        .unwrap();

    assert_eq!(rec.values(), vec![composed_u1()]);
}

#[tokio::test]
async fn composition_is_persisted_as_snapshot() {
    let s = social();
    let u1 = id("u1");
    s.store
        .get(SegmentType::User, &u1, Recorder::new().listener())
        .await
        .unwrap();

    let snapshot = s.snapshots().get("u1").unwrap();
    assert_eq!(snapshot, s.store.peek(&u1).map(Value::Object));
    assert_eq!(snapshot, Some(composed_u1()));
}

// ── Listener registry ────────────────────────────────────────────

#[tokio::test]
async fn reattach_with_same_key_replaces_old_listener() {
    let s = social();
    let u1 = id("u1");
    let old = Recorder::new();
    let new = Recorder::new();

    s.store
        .get(SegmentType::Followers, &u1, old.keyed("profile-card"))
        .await
        .unwrap();
    s.store
        .get(SegmentType::Followers, &u1, new.keyed("profile-card"))
        .await
        .unwrap();
    assert_eq!(s.store.listener_count(&u1), 1);

    let old_seen = old.count();
    s.store
        .update(
            SegmentType::Followers,
            &u1,
            segcache_store::UpdateRequest::new("increment", json!({})),
        )
        .await
        .unwrap();

    assert_eq!(old.count(), old_seen);
    assert_eq!(new.last(), Some(json!(42)));
}

#[tokio::test]
async fn same_key_on_other_segment_is_kept() {
    let s = social();
    let u1 = id("u1");
    let rec = Recorder::new();

    s.store
        .get(SegmentType::Followers, &u1, rec.keyed("card"))
        .await
        .unwrap();
    s.store
        .get(SegmentType::Wishlist, &u1, rec.keyed("card"))
        .await
        .unwrap();

    assert_eq!(s.store.listener_count(&u1), 2);
}

#[tokio::test]
async fn unsubscribe_stops_delivery() {
    let s = social();
    let u1 = id("u1");
    let rec = Recorder::new();
    let sub = s
        .store
        .get(SegmentType::Followers, &u1, rec.listener())
        .await
        .unwrap();

    assert!(s.store.unsubscribe(&sub));
    assert!(!s.store.unsubscribe(&sub));
    assert_eq!(s.store.listener_count(&u1), 0);

    let seen = rec.count();
    s.store
        .update(
            SegmentType::Followers,
            &u1,
            segcache_store::UpdateRequest::new("increment", json!({})),
        )
        .await
        .unwrap();
    assert_eq!(rec.count(), seen);
}

#[tokio::test]
async fn failing_listener_does_not_block_others() {
    init_tracing();
    let s = social();
    let u1 = id("u1");
    let rec = Recorder::new();

    s.store
        .get(
            SegmentType::Followers,
            &u1,
            Listener::new(|_| Err(anyhow::anyhow!("render failed"))),
        )
        .await
        .unwrap();
    s.store
        .get(
            SegmentType::Followers,
            &u1,
            Listener::new(|_| panic!("listener bug")),
        )
        .await
        .unwrap();
    s.store
        .get(SegmentType::Followers, &u1, rec.listener())
        .await
        .unwrap();

    s.store
        .update(
            SegmentType::Followers,
            &u1,
            segcache_store::UpdateRequest::new("increment", json!({})),
        )
        .await
        .unwrap();

    assert_eq!(rec.last(), Some(json!(42)));
    assert_eq!(s.store.peek(&u1).unwrap()["followers"], json!(42));
}

// ── Release & eviction ───────────────────────────────────────────

#[tokio::test]
async fn release_drops_entry_and_next_get_recomposes() {
    let s = social();
    let u1 = id("u1");
    s.store
        .get(SegmentType::User, &u1, Recorder::new().listener())
        .await
        .unwrap();

    assert!(s.store.release(&u1));
    assert!(!s.store.release(&u1));
    assert!(s.store.is_empty());
    assert_eq!(s.store.peek(&u1), None);

    s.store
        .get(SegmentType::User, &u1, Recorder::new().listener())
        .await
        .unwrap();
    assert_eq!(s.user.reads(), 2);
}

#[tokio::test(start_paused = true)]
async fn release_during_composition_subscribes_to_the_next_entry() {
    let s = social_with(StoreConfig::default(), Some(Duration::from_millis(20)));
    let u1 = id("u1");
    let rec = Recorder::new();

    let pending = tokio::spawn(s.store.get(SegmentType::Followers, &u1, rec.listener()));
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(s.store.release(&u1));

    let sub = pending.await.unwrap().unwrap();
    assert_eq!(s.user.reads(), 2);
    assert_eq!(s.store.listener_count(&u1), 1);

    s.store
        .update(
            SegmentType::Followers,
            &u1,
            segcache_store::UpdateRequest::new("increment", json!({})),
        )
        .await
        .unwrap();
    assert_eq!(rec.last(), Some(json!(42)));
    assert!(s.store.unsubscribe(&sub));
}

#[tokio::test]
async fn idle_entries_are_evicted_least_recently_used_first() {
    let config = StoreConfig {
        max_entries: Some(2),
        ..StoreConfig::default()
    };
    let s = social_with(config, None);

    for name in ["u1", "u2"] {
        let sub = s
            .store
            .get(SegmentType::User, &id(name), Recorder::new().listener())
            .await
            .unwrap();
        s.store.unsubscribe(&sub);
    }
    // Touch u1 so u2 becomes the least recently used.
    s.store
        .update(
            SegmentType::Followers,
            &id("u1"),
            segcache_store::UpdateRequest::new("increment", json!({})),
        )
        .await
        .unwrap();

    let sub = s
        .store
        .get(SegmentType::User, &id("u3"), Recorder::new().listener())
        .await
        .unwrap();
    s.store.unsubscribe(&sub);

    assert_eq!(s.store.len(), 2);
    assert!(s.store.contains(&id("u1")));
    assert!(!s.store.contains(&id("u2")));
    assert!(s.store.contains(&id("u3")));
}

#[tokio::test]
async fn entries_with_listeners_are_never_evicted() {
    let config = StoreConfig {
        max_entries: Some(1),
        ..StoreConfig::default()
    };
    let s = social_with(config, None);

    s.store
        .get(SegmentType::User, &id("u1"), Recorder::new().listener())
        .await
        .unwrap();
    s.store
        .get(SegmentType::User, &id("u2"), Recorder::new().listener())
        .await
        .unwrap();

    assert_eq!(s.store.len(), 2);
    assert!(s.store.contains(&id("u1")));
}
