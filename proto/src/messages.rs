//! Messages of the `quarry.v1` protocol.

/// How result chunks reach the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum TransferMode {
    /// The server may return initial chunks inline on the execute stream.
    Adaptive = 0,
    /// The execute stream carries only status messages; chunks are fetched
    /// separately.
    Async = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum CompletionStatus {
    Running = 0,
    ResultsProduced = 1,
    Finished = 2,
}

impl CompletionStatus {
    /// True once no new chunks will ever be produced.
    pub fn is_terminal_producing(self) -> bool {
        matches!(
            self,
            CompletionStatus::ResultsProduced | CompletionStatus::Finished
        )
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryParam {
    #[prost(string, tag = "1")]
    pub sql: String,
    #[prost(enumeration = "TransferMode", tag = "2")]
    pub transfer_mode: i32,
    /// Soft cap on the size of inline result parts, in bytes.
    #[prost(uint32, tag = "3")]
    pub result_byte_limit: u32,
}

/// Identity and progress of a submitted query.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryStatus {
    #[prost(string, tag = "1")]
    pub query_id: String,
    #[prost(enumeration = "CompletionStatus", tag = "2")]
    pub completion: i32,
    #[prost(uint64, tag = "3")]
    pub chunk_count: u64,
    #[prost(uint64, tag = "4")]
    pub row_count: u64,
}

/// Keep-alive marker; carries no data and may be skipped.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Heartbeat {}

/// One fragment of query output.
///
/// Binary and string parts are Arrow IPC stream fragments; row-count parts
/// report how many rows the preceding fragments covered.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryResultPart {
    #[prost(oneof = "query_result_part::Part", tags = "1, 2, 3")]
    pub part: Option<query_result_part::Part>,
}

pub mod query_result_part {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Part {
        #[prost(bytes = "vec", tag = "1")]
        BinaryPart(Vec<u8>),
        #[prost(bytes = "vec", tag = "2")]
        StringPart(Vec<u8>),
        #[prost(uint64, tag = "3")]
        RowCount(u64),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExecuteQueryResponse {
    #[prost(oneof = "execute_query_response::Payload", tags = "1, 2, 3")]
    pub payload: Option<execute_query_response::Payload>,
}

pub mod execute_query_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "1")]
        InlineResult(super::QueryResultPart),
        #[prost(message, tag = "2")]
        QueryInfo(super::QueryStatus),
        #[prost(message, tag = "3")]
        Heartbeat(super::Heartbeat),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryInfoParam {
    #[prost(string, tag = "1")]
    pub query_id: String,
    /// When false the server answers with a single snapshot and closes.
    #[prost(bool, tag = "2")]
    pub streaming: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryInfoResponse {
    #[prost(oneof = "query_info_response::Payload", tags = "1, 2, 3")]
    pub payload: Option<query_info_response::Payload>,
}

pub mod query_info_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "1")]
        QueryInfo(super::QueryStatus),
        #[prost(message, tag = "2")]
        Heartbeat(super::Heartbeat),
        /// Arrow IPC schema message for the query output.
        #[prost(bytes = "vec", tag = "3")]
        ArrowSchema(Vec<u8>),
    }
}

/// Bounds of an out-of-band row fetch.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RowRange {
    #[prost(uint64, tag = "1")]
    pub offset: u64,
    #[prost(uint64, tag = "2")]
    pub row_count: u64,
    #[prost(uint32, tag = "3")]
    pub byte_limit: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryResultParam {
    #[prost(string, tag = "1")]
    pub query_id: String,
    /// Set after the schema has been received once; the server then skips the
    /// IPC schema message.
    #[prost(bool, tag = "2")]
    pub omit_schema: bool,
    #[prost(oneof = "query_result_param::Range", tags = "3, 4")]
    pub range: Option<query_result_param::Range>,
}

pub mod query_result_param {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Range {
        #[prost(uint64, tag = "3")]
        ChunkId(u64),
        #[prost(message, tag = "4")]
        RowRange(super::RowRange),
    }
}

/// Structured server diagnostic attached to failed calls.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ErrorInfo {
    #[prost(string, tag = "1")]
    pub sqlstate: String,
    #[prost(string, tag = "2")]
    pub primary_message: String,
    #[prost(string, tag = "3")]
    pub customer_detail: String,
    #[prost(string, tag = "4")]
    pub customer_hint: String,
    #[prost(string, tag = "5")]
    pub system_detail: String,
}

impl ErrorInfo {
    pub const TYPE_URL: &'static str = "type.googleapis.com/quarry.v1.ErrorInfo";
}
