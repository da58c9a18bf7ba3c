//! Error types for the query layer.

use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors a query service may report.
///
/// Errors are `Clone` so a single failed read can be handed to every task
/// waiting on the same composition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The service exposes no method with this name.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// The query payload was rejected before reaching the remote system.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The remote system reported a failure.
    #[error("remote error: {0}")]
    Remote(String),
}
