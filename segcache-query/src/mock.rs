//! Scriptable query services for testing.
//!
//! [`MockService`] answers reads from a closure and mutations from named
//! handlers, counting every invocation so tests can assert how often the
//! store reached the "remote" side.

use crate::error::{QueryError, QueryResult};
use crate::service::QueryService;
use async_trait::async_trait;
use segcache_types::EntityId;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type Reader = Box<dyn Fn(&EntityId) -> QueryResult<Value> + Send + Sync>;
type Handler = Box<dyn Fn(Value) -> QueryResult<Value> + Send + Sync>;

/// A query service driven by closures.
pub struct MockService {
    reader: Reader,
    handlers: HashMap<String, Handler>,
    delay: Option<Duration>,
    reads: AtomicUsize,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockService {
    /// A service whose reads return `value` for every entity.
    pub fn fixed(value: Value) -> Self {
        Self::reading(move |_| Ok(value.clone()))
    }

    /// A service whose reads are answered by `reader`.
    pub fn reading<F>(reader: F) -> Self
    where
        F: Fn(&EntityId) -> QueryResult<Value> + Send + Sync + 'static,
    {
        Self {
            reader: Box::new(reader),
            handlers: HashMap::new(),
            delay: None,
            reads: AtomicUsize::new(0),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// A service whose reads always fail with a remote error.
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::reading(move |_| Err(QueryError::Remote(message.clone())))
    }

    /// Registers a handler for the mutation `method`.
    pub fn on<F>(mut self, method: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) -> QueryResult<Value> + Send + Sync + 'static,
    {
        self.handlers.insert(method.into(), Box::new(handler));
        self
    }

    /// Suspends every read and call for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of reads served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of times `method` was called so far.
    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl QueryService for MockService {
    async fn query(&self, id: &EntityId) -> QueryResult<Value> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        (self.reader)(id)
    }

    async fn call(&self, method: &str, query: Value) -> QueryResult<Value> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default() += 1;
        self.pause().await;
        let handler = self
            .handlers
            .get(method)
            .ok_or_else(|| QueryError::UnknownMethod(method.to_string()))?;
        handler(query)
    }
}
