//! Shared fixtures for store integration tests.
#![allow(dead_code)]

use segcache_cache::{CacheBackend, CacheNamespace, MemoryCache};
use segcache_query::mock::MockService;
use segcache_query::{QueryError, QueryLayer};
use segcache_store::{EntityId, Listener, SegmentStore, SegmentType, StoreConfig};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn id(s: &str) -> EntityId {
    EntityId::parse(s).unwrap()
}

/// Collects every value delivered to the listeners it hands out.
#[derive(Clone, Default)]
pub struct Recorder {
    values: Arc<Mutex<Vec<Value>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener(&self) -> Listener {
        let values = Arc::clone(&self.values);
        Listener::new(move |v| {
            values.lock().unwrap().push(v.clone());
            Ok(())
        })
    }

    pub fn keyed(&self, key: &str) -> Listener {
        let values = Arc::clone(&self.values);
        Listener::keyed(key, move |v| {
            values.lock().unwrap().push(v.clone());
            Ok(())
        })
    }

    pub fn values(&self) -> Vec<Value> {
        self.values.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.values.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<Value> {
        self.values.lock().unwrap().last().cloned()
    }
}

/// In-memory "server" state behind the social fixture services.
#[derive(Default)]
pub struct World {
    pub followers: HashMap<String, i64>,
    pub following: HashMap<String, Vec<String>>,
    pub wishlist: HashMap<String, Vec<String>>,
}

pub struct Social {
    pub store: SegmentStore,
    pub cache: Arc<MemoryCache>,
    pub world: Arc<Mutex<World>>,
    pub user: Arc<MockService>,
    pub wishlist: Arc<MockService>,
    pub followers: Arc<MockService>,
    pub following: Arc<MockService>,
}

impl Social {
    pub fn snapshots(&self) -> Arc<dyn CacheNamespace> {
        self.cache.namespace(&self.store.config().cache_namespace)
    }
}

fn str_field<'a>(query: &'a Value, field: &str) -> Result<&'a str, QueryError> {
    query
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| QueryError::InvalidQuery(format!("missing {field}")))
}

/// A store over four services modelling users, wishlists and a follow graph.
pub fn social() -> Social {
    social_with(StoreConfig::default(), None)
}

pub fn social_with(config: StoreConfig, delay: Option<Duration>) -> Social {
    let world = Arc::new(Mutex::new(World::default()));
    let delayed = |service: MockService| match delay {
        Some(d) => service.with_delay(d),
        None => service,
    };

    let user = MockService::reading(|id| Ok(json!({ "name": format!("user {id}") })))
        .on("rename", |query| {
            let name = str_field(&query, "name")?;
            Ok(json!({ "name": name, "_etag": "v2" }))
        })
        .on("scalar", |_| Ok(json!(7)));
    let user = Arc::new(delayed(user));

    let w = Arc::clone(&world);
    let w2 = Arc::clone(&world);
    let wishlist = MockService::reading(move |id| {
        let world = w.lock().unwrap();
        Ok(json!(world.wishlist.get(id.as_str()).cloned().unwrap_or_default()))
    })
    .on("add", move |query| {
        let user = str_field(&query, "user")?;
        let item = str_field(&query, "item")?;
        let mut world = w2.lock().unwrap();
        let list = world.wishlist.entry(user.to_string()).or_default();
        list.push(item.to_string());
        Ok(json!(list.clone()))
    });
    let wishlist = Arc::new(delayed(wishlist));

    let w = Arc::clone(&world);
    let followers = MockService::reading(move |id| {
        let world = w.lock().unwrap();
        Ok(json!(world.followers.get(id.as_str()).copied().unwrap_or(0)))
    })
    .on("increment", |_| Ok(json!(42)))
    .on("fail", |_| Err(QueryError::Remote("service unavailable".into())));
    let followers = Arc::new(delayed(followers));

    let w = Arc::clone(&world);
    let w2 = Arc::clone(&world);
    let following = MockService::reading(move |id| {
        let world = w.lock().unwrap();
        Ok(json!(world.following.get(id.as_str()).cloned().unwrap_or_default()))
    })
    .on("add", move |query| {
        let user = str_field(&query, "user")?;
        let target = str_field(&query, "target")?;
        let mut world = w2.lock().unwrap();
        *world.followers.entry(target.to_string()).or_default() += 1;
        let list = world.following.entry(user.to_string()).or_default();
        list.push(target.to_string());
        Ok(json!(list.clone()))
    });
    let following = Arc::new(delayed(following));

    let layer = QueryLayer::builder()
        .service(SegmentType::User, user.clone())
        .service(SegmentType::Wishlist, wishlist.clone())
        .service(SegmentType::Followers, followers.clone())
        .service(SegmentType::Following, following.clone())
        .build();
    let cache = Arc::new(MemoryCache::new());
    let store = SegmentStore::new(config, layer, &*cache);

    Social {
        store,
        cache,
        world,
        user,
        wishlist,
        followers,
        following,
    }
}
