//! Query layer boundary for the segmented entity store.
//!
//! The store never talks to a remote system itself. Every segment type is
//! bound to a [`QueryService`] that knows how to read that segment for an
//! entity and how to run named mutations against it. The store only ever
//! calls `query(id)` and `call(method, query)`; what happens behind them is
//! the service's business (HTTP, RPC, retries, timeouts).
//!
//! # Contract
//!
//! A mutation returns the *entire* fresh value of the segment(s) it governs,
//! never a delta. For the root segment that is an object of root-level fields.

mod error;
mod layer;
pub mod mock;
mod service;

pub use error::{QueryError, QueryResult};
pub use layer::{QueryLayer, QueryLayerBuilder};
pub use service::QueryService;
