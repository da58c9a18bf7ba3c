//! Segmented entity store.
//!
//! A per-entity cache of server-derived data. Each entity is composed from
//! one read per segment type; consumers subscribe to the whole entity or to a
//! single segment, and updates fan out only to the listeners whose segment
//! changed (root listeners see every change).
//!
//! # Architecture
//!
//! - **Registry**: one entry per entity id, created on first reference
//! - **Composer**: reads every bound segment through the [`QueryLayer`]
//!   and assembles the entity; one composition per entry, shared by all
//!   concurrent waiters
//! - **Listeners**: ordered per entry, deduplicated by key and segment
//! - **Broadcast**: synchronous delivery, a failing listener never blocks
//!   the others
//! - **Orchestrator**: `update` calls the query layer, merges the fresh
//!   segment, persists a snapshot, notifies, and optionally recomposes a
//!   second ("foreign") entity affected by the same mutation
//!
//! ## Stale-while-revalidate
//!
//! `get` first hands the listener the last snapshot persisted in the
//! [`CacheBackend`](segcache_cache::CacheBackend), then the freshly composed
//! value once it is available.
//!
//! # Example
//!
//! ```
//! use segcache_cache::MemoryCache;
//! use segcache_query::{mock::MockService, QueryLayer};
//! use segcache_store::{Listener, SegmentStore, StoreConfig, UpdateRequest};
//! use segcache_types::{EntityId, SegmentType};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let followers = MockService::fixed(json!(41)).on("increment", |_| Ok(json!(42)));
//! let layer = QueryLayer::builder()
//!     .service(SegmentType::Followers, Arc::new(followers))
//!     .build();
//! let store = SegmentStore::new(StoreConfig::default(), layer, &MemoryCache::new());
//! let u1 = EntityId::parse("u1").unwrap();
//!
//! futures::executor::block_on(async {
//!     store
//!         .get(SegmentType::Followers, &u1, Listener::new(|v| {
//!             println!("followers: {v}");
//!             Ok(())
//!         }))
//!         .await
//!         .unwrap();
//!
//!     let fresh = store
//!         .update(SegmentType::Followers, &u1, UpdateRequest::new("increment", json!({})))
//!         .await
//!         .unwrap();
//!     assert_eq!(fresh, json!(42));
//! });
//! ```

mod broadcast;
mod composer;
mod config;
mod entry;
mod error;
mod listener;
mod orchestrator;
mod registry;
mod snapshot;
mod store;

pub use composer::ID_FIELD;
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use listener::{Callback, Listener, ListenerKey, Subscription, SubscriptionId};
pub use orchestrator::{UpdateCallback, UpdateRequest};
pub use store::SegmentStore;

pub use segcache_query::QueryLayer;
pub use segcache_types::{EntityData, EntityId, SegmentType};
