//! Core type definitions for the segmented entity store.
//!
//! This crate defines the small vocabulary every other crate shares:
//! - [`EntityId`]: the partition key of the cache
//! - [`SegmentType`]: the closed set of independently subscribable field groups
//! - [`EntityData`]: the composed entity object, keyed by segment
//!
//! It deliberately carries no I/O and no async code.

mod ids;
mod segment;

pub use ids::EntityId;
pub use segment::{EntityData, SegmentType};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid entity id: {0:?}")]
    InvalidEntityId(String),

    #[error("unknown segment type: {0:?}")]
    UnknownSegment(String),
}
