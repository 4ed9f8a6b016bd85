//! quarry-client: driver for the quarry columnar streaming query engine.
//!
//! Queries are submitted over a server-streaming grpc call that may return
//! initial result chunks inline; remaining chunks are fetched out-of-band and
//! interleaved with a status stream. Result payloads are Arrow IPC fragments
//! decoded into record batches, read through a typed row cursor.

// crate-specific lint exceptions:
#![allow(clippy::missing_errors_doc)]

/// Typed row-at-a-time reads over record batches
pub mod accessor;
/// Incremental Arrow IPC decoding of result payloads
pub mod batch;
/// Maps transport errors to the driver taxonomy
pub mod classifier;
/// Driver facade
pub mod client;
/// Monotonic deadline tracking
pub mod deadline;
/// Error taxonomy
pub mod error;
/// The query execution state machine
pub mod execution;
/// Pull adapter over server-streaming calls
pub mod grpc_stream;
/// Retrying stream of status updates
pub mod info_stream;
/// Bounded wait for a status predicate
pub mod polling;
/// Chunk- and row-range result fetches
pub mod range_stream;
/// Cursor over a stream of batches
pub mod result_set;
/// Session options and timezone resolution
pub mod session;
/// Transport abstraction over the query service
pub mod stub;

pub use client::QueryClient;
pub use deadline::Deadline;
pub use error::{DriverError, Result};
pub use execution::{QueryExecution, QueryResultHandle};
pub use quarry_proto::{CompletionStatus, QueryStatus, TransferMode};
pub use result_set::ResultSetView;
pub use session::SessionConfig;
