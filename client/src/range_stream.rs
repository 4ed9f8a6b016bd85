//! Lazy streams over a contiguous range of result chunks or rows.

use std::sync::Arc;

use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use quarry_proto::{QueryResultParam, query_result_param, query_result_part, RowRange};
use tracing::{debug, warn};

use crate::batch::BatchDecoder;
use crate::classifier::{ErrorContext, classify};
use crate::deadline::Deadline;
use crate::error::{DriverError, Result, is_cancelled};
use crate::grpc_stream::GrpcStreamIterator;
use crate::session::SessionConfig;
use crate::stub::QueryServiceStub;

/// Smallest accepted fetch byte limit. Values below are rejected, which
/// guards against callers passing megabytes where bytes are expected.
pub const MIN_FETCH_BYTES: u32 = 1024;
/// Largest fetch byte limit; larger requests are clamped.
pub const MAX_FETCH_BYTES: u32 = 20 * 1024 * 1024;

/// Range-specific half of a result fetch: what to ask for next and when the
/// range is exhausted.
pub trait RangeState: Send {
    fn has_more_to_fetch(&self) -> bool;
    fn build_request(&self, query_id: &str, omit_schema: bool) -> QueryResultParam;
    /// Row-count part received on the wire.
    fn on_result_received(&mut self, row_count: u64);
    /// Inner stream exhausted; `produced` tells whether any batch decoded
    /// since it was opened.
    fn on_stream_exhausted(&mut self, produced: bool) -> Result<()>;
}

/// Template for range fetches: open an inner call, decode parts, and when
/// the inner stream empties re-check the range state and reopen. The first
/// request carries the schema; once a batch decoded, later requests set the
/// omit flag and reuse the retained schema.
pub struct ResultRangeStream<S> {
    stub: Arc<dyn QueryServiceStub>,
    config: SessionConfig,
    query_id: String,
    deadline: Deadline,
    state: S,
    inner: Option<GrpcStreamIterator<quarry_proto::QueryResultPart>>,
    decoder: BatchDecoder,
    omit_schema: bool,
    produced_this_call: bool,
    closed: bool,
}

impl<S> std::fmt::Debug for ResultRangeStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultRangeStream")
            .field("query_id", &self.query_id)
            .field("omit_schema", &self.omit_schema)
            .field("produced_this_call", &self.produced_this_call)
            .field("closed", &self.closed)
            .finish()
    }
}

impl<S: RangeState> ResultRangeStream<S> {
    fn new(
        stub: Arc<dyn QueryServiceStub>,
        config: SessionConfig,
        query_id: String,
        deadline: Deadline,
        state: S,
    ) -> Self {
        Self {
            stub,
            config,
            query_id,
            deadline,
            state,
            inner: None,
            decoder: BatchDecoder::new(),
            omit_schema: false,
            produced_this_call: false,
            closed: false,
        }
    }

    pub async fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        loop {
            if let Some(batch) = self.decoder.next_batch() {
                self.omit_schema = true;
                self.produced_this_call = true;
                return Ok(Some(batch));
            }
            if self.closed {
                return Ok(None);
            }
            if self.inner.is_none() {
                if !self.state.has_more_to_fetch() {
                    self.closed = true;
                    return Ok(None);
                }
                let request = self.state.build_request(&self.query_id, self.omit_schema);
                debug!(query_id = %self.query_id, range = ?request.range, "opening result range call");
                let stream = self
                    .stub
                    .get_query_result(request, self.deadline)
                    .await
                    .map_err(|status| self.classify(status))?;
                self.inner = Some(GrpcStreamIterator::spawn(stream));
                self.produced_this_call = false;
            }
            let inner = self.inner.as_mut().expect("stream just opened");
            match inner.next().await {
                Some(Ok(part)) => match part.part {
                    Some(query_result_part::Part::BinaryPart(bytes))
                    | Some(query_result_part::Part::StringPart(bytes)) => {
                        self.decoder.feed(&bytes)?;
                    }
                    Some(query_result_part::Part::RowCount(count)) => {
                        self.state.on_result_received(count);
                    }
                    None => {}
                },
                Some(Err(status)) => {
                    self.release();
                    if is_cancelled(&status) {
                        // no site allows an expected cancel on result fetches
                        return Err(DriverError::StreamCancelled { expected: false });
                    }
                    return Err(self.classify(status));
                }
                None => {
                    self.release();
                    let produced = self.produced_this_call;
                    self.state.on_stream_exhausted(produced)?;
                }
            }
        }
    }

    pub fn schema(&self) -> Option<SchemaRef> {
        self.decoder.schema()
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            inner.close();
        }
    }

    fn classify(&self, status: tonic::Status) -> DriverError {
        classify(
            status,
            &ErrorContext::with_query_id(Some(&self.query_id)),
            &self.config,
        )
    }
}

/// Chunk-indexed fetch over `[next_chunk, end_chunk)`, one chunk per inner
/// call.
pub struct ChunkState {
    next_chunk: u64,
    end_chunk: u64,
    first_call: bool,
    retried_empty_first: bool,
}

impl RangeState for ChunkState {
    fn has_more_to_fetch(&self) -> bool {
        self.next_chunk < self.end_chunk
    }

    fn build_request(&self, query_id: &str, omit_schema: bool) -> QueryResultParam {
        QueryResultParam {
            query_id: query_id.to_string(),
            omit_schema,
            range: Some(query_result_param::Range::ChunkId(self.next_chunk)),
        }
    }

    fn on_result_received(&mut self, _row_count: u64) {}

    fn on_stream_exhausted(&mut self, produced: bool) -> Result<()> {
        let chunk = self.next_chunk;
        let was_first = self.first_call;
        self.first_call = false;
        if produced {
            self.next_chunk += 1;
            return Ok(());
        }
        // A server-side adaptive timeout may legitimately leave the first
        // chunk empty; skip it once and carry on with the next chunk id.
        if was_first
            && chunk == 1
            && !self.retried_empty_first
            && chunk + 1 < self.end_chunk
        {
            warn!(chunk, "empty first chunk response, retrying with next chunk");
            self.retried_empty_first = true;
            self.next_chunk = chunk + 1;
            return Ok(());
        }
        Err(DriverError::ProtocolViolation(format!(
            "chunk {chunk} returned no data"
        )))
    }
}

pub type ChunkRangeStream = ResultRangeStream<ChunkState>;

impl ChunkRangeStream {
    /// Stream over `chunk_count` chunks starting at `first_chunk`.
    pub fn chunks(
        stub: Arc<dyn QueryServiceStub>,
        config: SessionConfig,
        query_id: String,
        first_chunk: u64,
        chunk_count: u64,
        deadline: Deadline,
    ) -> Self {
        ResultRangeStream::new(
            stub,
            config,
            query_id,
            deadline,
            ChunkState {
                next_chunk: first_chunk,
                end_chunk: first_chunk.saturating_add(chunk_count),
                first_call: true,
                retried_empty_first: false,
            },
        )
    }
}

/// Row-offset fetch; `current_offset` advances by each received row-count
/// part, monotonically.
pub struct RowState {
    current_offset: u64,
    remaining_rows: u64,
    byte_limit: u32,
}

impl RangeState for RowState {
    fn has_more_to_fetch(&self) -> bool {
        self.remaining_rows > 0
    }

    fn build_request(&self, query_id: &str, omit_schema: bool) -> QueryResultParam {
        QueryResultParam {
            query_id: query_id.to_string(),
            omit_schema,
            range: Some(query_result_param::Range::RowRange(RowRange {
                offset: self.current_offset,
                row_count: self.remaining_rows,
                byte_limit: self.byte_limit,
            })),
        }
    }

    fn on_result_received(&mut self, row_count: u64) {
        self.current_offset = self.current_offset.saturating_add(row_count);
        self.remaining_rows = self.remaining_rows.saturating_sub(row_count);
    }

    fn on_stream_exhausted(&mut self, produced: bool) -> Result<()> {
        if !produced && self.has_more_to_fetch() {
            return Err(DriverError::ProtocolViolation(format!(
                "row fetch at offset {} returned no data with {} rows remaining",
                self.current_offset, self.remaining_rows
            )));
        }
        Ok(())
    }
}

pub type RowRangeStream = ResultRangeStream<RowState>;

impl RowRangeStream {
    /// Stream over `row_count` rows starting at `offset`. The byte limit is
    /// clamped to [`MAX_FETCH_BYTES`]; values below [`MIN_FETCH_BYTES`] are
    /// rejected.
    pub fn rows(
        stub: Arc<dyn QueryServiceStub>,
        config: SessionConfig,
        query_id: String,
        offset: u64,
        row_count: u64,
        byte_limit: u32,
        deadline: Deadline,
    ) -> Result<Self> {
        if byte_limit < MIN_FETCH_BYTES {
            return Err(DriverError::Range(format!(
                "byte limit {byte_limit} is below the minimum of {MIN_FETCH_BYTES}"
            )));
        }
        Ok(ResultRangeStream::new(
            stub,
            config,
            query_id,
            deadline,
            RowState {
                current_offset: offset,
                remaining_rows: row_count,
                byte_limit: byte_limit.min(MAX_FETCH_BYTES),
            },
        ))
    }

    pub fn current_offset(&self) -> u64 {
        self.state.current_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_state_walks_the_range() {
        let mut state = ChunkState {
            next_chunk: 2,
            end_chunk: 5,
            first_call: true,
            retried_empty_first: false,
        };
        assert!(state.has_more_to_fetch());
        let request = state.build_request("q", false);
        assert_eq!(
            request.range,
            Some(query_result_param::Range::ChunkId(2))
        );
        state.on_stream_exhausted(true).expect("advance");
        state.on_stream_exhausted(true).expect("advance");
        state.on_stream_exhausted(true).expect("advance");
        assert!(!state.has_more_to_fetch());
    }

    #[test]
    fn empty_first_chunk_retry_is_one_shot() {
        let mut state = ChunkState {
            next_chunk: 1,
            end_chunk: 3,
            first_call: true,
            retried_empty_first: false,
        };
        state.on_stream_exhausted(false).expect("retry allowed");
        assert_eq!(state.next_chunk, 2);
        let err = state.on_stream_exhausted(false).expect_err("second empty");
        assert!(matches!(err, DriverError::ProtocolViolation(_)));
    }

    #[test]
    fn empty_chunk_elsewhere_is_a_violation() {
        let mut state = ChunkState {
            next_chunk: 4,
            end_chunk: 6,
            first_call: true,
            retried_empty_first: false,
        };
        let err = state.on_stream_exhausted(false).expect_err("empty chunk");
        assert!(matches!(err, DriverError::ProtocolViolation(_)));
    }

    #[test]
    fn row_state_advances_offset() {
        let mut state = RowState {
            current_offset: 10,
            remaining_rows: 25,
            byte_limit: MIN_FETCH_BYTES,
        };
        state.on_result_received(10);
        assert_eq!(state.current_offset, 20);
        assert_eq!(state.remaining_rows, 15);
        let request = state.build_request("q", true);
        assert!(request.omit_schema);
        match request.range {
            Some(query_result_param::Range::RowRange(range)) => {
                assert_eq!(range.offset, 20);
                assert_eq!(range.row_count, 15);
            }
            other => panic!("unexpected range {other:?}"),
        }
        state.on_result_received(15);
        assert!(!state.has_more_to_fetch());
    }
}
