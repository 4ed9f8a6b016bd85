//! Wire protocol for the quarry query engine.
//!
//! Messages are hand-maintained prost types matching the `quarry.v1` proto
//! package; the grpc client mirrors the shape tonic codegen would emit so the
//! service can be regenerated from a descriptor later without breaking
//! callers.

/// Grpc client for the query service
pub mod client;
/// Protocol messages
pub mod messages;
/// google.rpc error envelope carried in status details
pub mod rpc;

pub use client::query_service_client::QueryServiceClient;
pub use messages::*;
