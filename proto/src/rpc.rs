//! Minimal `google.rpc.Status` envelope.
//!
//! Failed calls carry a serialized `google.rpc.Status` in the grpc
//! `grpc-status-details-bin` metadata; the interesting payload for this
//! driver is the first [`ErrorInfo`](crate::messages::ErrorInfo) among its
//! `Any` details.

use prost::Message;

use crate::messages::ErrorInfo;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Any {
    #[prost(string, tag = "1")]
    pub type_url: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RpcStatus {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(message, repeated, tag = "3")]
    pub details: Vec<Any>,
}

/// Extracts the first `ErrorInfo` from a serialized `google.rpc.Status`.
///
/// Returns `None` when the payload is absent, malformed, or carries no
/// `ErrorInfo` detail.
pub fn decode_error_info(details: &[u8]) -> Option<ErrorInfo> {
    if details.is_empty() {
        return None;
    }
    let status = RpcStatus::decode(details).ok()?;
    status
        .details
        .iter()
        .filter(|any| any.type_url == ErrorInfo::TYPE_URL)
        .find_map(|any| ErrorInfo::decode(any.value.as_slice()).ok())
}
