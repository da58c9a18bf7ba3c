//! Snapshot persistence for the segmented entity store.
//!
//! The cache backend holds the last composed entity per id so a consumer can
//! be shown *something* while a fresh composition is in flight. It is never
//! the source of truth.
//!
//! # Architecture
//!
//! - A [`CacheBackend`] hands out [`CacheNamespace`]s by name
//! - A namespace is a synchronous key/value map of JSON snapshots
//! - [`MemoryCache`] keeps snapshots for the life of the process
//! - [`SqliteCache`] keeps them in a single SQLite table across restarts

mod backend;
mod error;
mod memory;
mod sqlite;

pub use backend::{CacheBackend, CacheNamespace};
pub use error::{CacheError, CacheResult};
pub use memory::MemoryCache;
pub use sqlite::SqliteCache;
