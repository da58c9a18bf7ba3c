//! Error types for the store.

use segcache_query::QueryError;
use segcache_types::{EntityId, SegmentType};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by `get` and `update`.
///
/// `Clone` because one in-flight composition is awaited by every concurrent
/// `get` for the same id, and all of them observe the same failure.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// No query service is bound for the segment.
    #[error("no query service bound for segment {0}")]
    UnboundSegment(SegmentType),

    /// The query service for a segment failed.
    #[error("query for segment {segment} failed: {source}")]
    Query {
        segment: SegmentType,
        source: QueryError,
    },

    /// A query service returned a value that cannot be merged.
    #[error("invalid payload for segment {segment}: {reason}")]
    InvalidPayload {
        segment: SegmentType,
        reason: String,
    },

    /// The primary update succeeded but recomposing the foreign entity failed.
    #[error("cascade to {foreign_id} failed: {source}")]
    Cascade {
        foreign_id: EntityId,
        source: Box<StoreError>,
    },
}
