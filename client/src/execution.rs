//! The query execution state machine.
//!
//! Top-level iterator over result batches, hiding the dual-channel protocol:
//! inline results on the execute stream, out-of-band chunk fetches, and a
//! status poll to learn of newly produced chunks.

use std::sync::Arc;

use arrow_array::RecordBatch;
use quarry_proto::{
    ExecuteQueryResponse, QueryParam, QueryStatus, TransferMode, execute_query_response,
    query_result_part,
};
use tracing::{debug, info};

use crate::batch::BatchDecoder;
use crate::classifier::{ErrorContext, classify, truncate_query_text};
use crate::deadline::Deadline;
use crate::error::{DriverError, Result, is_cancelled};
use crate::grpc_stream::GrpcStreamIterator;
use crate::info_stream::QueryInfoStream;
use crate::range_stream::ChunkRangeStream;
use crate::session::SessionConfig;
use crate::stub::QueryServiceStub;

/// Identity and latest known status of a submitted query.
#[derive(Debug, Clone)]
pub struct QueryResultHandle {
    pub query_id: String,
    pub status: QueryStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    New,
    ExecOpening,
    ExecDraining,
    ChunkFetching,
    InfoPolling,
    Done,
    Failed,
}

/// Pull-based iterator over the batches of one query.
///
/// Single-ownership: exactly one task advances it at a time. Owns the
/// execute stream, the status stream (created once the query id is known)
/// and the current chunk stream; all are released on close or end of
/// iteration.
pub struct QueryExecution {
    stub: Arc<dyn QueryServiceStub>,
    config: SessionConfig,
    sql: String,
    transfer_mode: TransferMode,
    deadline: Deadline,
    state: State,
    exec: Option<GrpcStreamIterator<ExecuteQueryResponse>>,
    info: Option<QueryInfoStream>,
    chunks: Option<ChunkRangeStream>,
    decoder: BatchDecoder,
    latest: Option<QueryStatus>,
    next_chunk: u64,
}

impl QueryExecution {
    pub fn new(
        stub: Arc<dyn QueryServiceStub>,
        config: SessionConfig,
        sql: impl Into<String>,
        transfer_mode: TransferMode,
    ) -> Self {
        let deadline = config.local_deadline();
        Self {
            stub,
            config,
            sql: sql.into(),
            transfer_mode,
            deadline,
            state: State::New,
            exec: None,
            info: None,
            chunks: None,
            decoder: BatchDecoder::new(),
            latest: None,
            next_chunk: 0,
        }
    }

    /// Next result batch; `None` once the query output is fully consumed.
    pub async fn pull(&mut self) -> Result<Option<RecordBatch>> {
        loop {
            if let Some(batch) = self.decoder.next_batch() {
                return Ok(Some(batch));
            }
            match self.state {
                State::New => self.open_execute_stream().await?,
                State::ExecOpening => self.await_first_status().await?,
                State::ExecDraining => {
                    let exec = self.exec.as_mut().expect("execute stream open");
                    match exec.next().await {
                        Some(Ok(response)) => self.handle_exec_message(response)?,
                        Some(Err(status))
                            if is_cancelled(&status) && self.latest.is_some() =>
                        {
                            // expected cancellation: the server may cut the
                            // inline stream short once a status is out
                            debug!("execute stream cancelled after status, switching to chunk fetches");
                            self.release_exec();
                            self.state = State::ChunkFetching;
                        }
                        Some(Err(status)) => {
                            let err = self.classify(status);
                            return Err(self.fail(err));
                        }
                        None => {
                            self.release_exec();
                            self.state = State::ChunkFetching;
                        }
                    }
                }
                State::ChunkFetching => {
                    if let Some(batch) = self.advance_chunks().await? {
                        return Ok(Some(batch));
                    }
                    if self.state == State::Done {
                        return Ok(None);
                    }
                }
                State::InfoPolling => self.poll_status().await?,
                State::Done => return Ok(None),
                State::Failed => {
                    return Err(DriverError::ProtocolViolation(
                        "query execution already failed".into(),
                    ));
                }
            }
        }
    }

    /// Last observed status, if any.
    pub fn latest_status(&self) -> Option<&QueryStatus> {
        self.latest.as_ref()
    }

    /// Schema of the result set, once the first payload was decoded.
    pub fn schema(&self) -> Option<arrow_schema::SchemaRef> {
        self.decoder
            .schema()
            .or_else(|| self.chunks.as_ref().and_then(|chunks| chunks.schema()))
    }

    /// Handle for out-of-band operations, once the query id is known.
    pub fn handle(&self) -> Option<QueryResultHandle> {
        self.latest.as_ref().map(|status| QueryResultHandle {
            query_id: status.query_id.clone(),
            status: status.clone(),
        })
    }

    /// Releases all streams and cancels remote processing. Idempotent.
    pub fn close(&mut self) {
        self.release_all();
        if !matches!(self.state, State::Done | State::Failed) {
            self.state = State::Done;
        }
    }

    /// Adapts the pull iterator to a `futures::Stream`.
    pub fn into_stream(mut self) -> impl futures::Stream<Item = Result<RecordBatch>> {
        async_stream::try_stream! {
            while let Some(batch) = self.pull().await? {
                yield batch;
            }
        }
    }

    async fn open_execute_stream(&mut self) -> Result<()> {
        info!(transfer_mode = ?self.transfer_mode, "submitting query");
        let param = QueryParam {
            sql: self.sql.clone(),
            transfer_mode: self.transfer_mode as i32,
            result_byte_limit: 0,
        };
        let stream = match self.stub.execute_query(param, self.deadline).await {
            Ok(stream) => stream,
            Err(status) => return Err(self.submission_error(&status)),
        };
        self.exec = Some(GrpcStreamIterator::spawn(stream));
        // chunk 0 arrives inline in adaptive mode
        self.next_chunk = match self.transfer_mode {
            TransferMode::Adaptive => 1,
            TransferMode::Async => 0,
        };
        self.state = State::ExecOpening;
        Ok(())
    }

    /// The protocol guarantees the first execute message carries the query
    /// status with the assigned id; anything else is a submission failure.
    async fn await_first_status(&mut self) -> Result<()> {
        let exec = self.exec.as_mut().expect("execute stream open");
        match exec.next().await {
            Some(Ok(response)) => match response.payload {
                Some(execute_query_response::Payload::QueryInfo(status)) => {
                    self.store_status(status)?;
                    self.state = State::ExecDraining;
                    Ok(())
                }
                Some(execute_query_response::Payload::Heartbeat(_)) | None => Ok(()),
                Some(execute_query_response::Payload::InlineResult(_)) => {
                    Err(self.submission_failure(
                        "first execute response carried a result instead of a query status",
                    ))
                }
            },
            Some(Err(status)) => Err(self.submission_error(&status)),
            None => Err(self.submission_failure("execute stream ended without a query status")),
        }
    }

    fn handle_exec_message(&mut self, response: ExecuteQueryResponse) -> Result<()> {
        match response.payload {
            Some(execute_query_response::Payload::InlineResult(part)) => match part.part {
                Some(query_result_part::Part::BinaryPart(bytes))
                | Some(query_result_part::Part::StringPart(bytes)) => {
                    if self.transfer_mode == TransferMode::Async {
                        let err = DriverError::ProtocolViolation(
                            "inline result on an async-mode execute stream".into(),
                        );
                        return Err(self.fail(err));
                    }
                    if let Err(err) = self.decoder.feed(&bytes) {
                        return Err(self.fail(err));
                    }
                    Ok(())
                }
                Some(query_result_part::Part::RowCount(_)) | None => Ok(()),
            },
            Some(execute_query_response::Payload::QueryInfo(status)) => self.store_status(status),
            Some(execute_query_response::Payload::Heartbeat(_)) | None => Ok(()),
        }
    }

    /// Runs the current chunk stream to its next batch, opening one when
    /// chunks are pending, polling for status otherwise.
    async fn advance_chunks(&mut self) -> Result<Option<RecordBatch>> {
        if let Some(chunks) = self.chunks.as_mut() {
            match chunks.next_batch().await {
                Ok(Some(batch)) => return Ok(Some(batch)),
                Ok(None) => {
                    self.chunks = None;
                    return Ok(None);
                }
                Err(err) => return Err(self.fail(err)),
            }
        }
        let Some(status) = self.latest.clone() else {
            let err =
                DriverError::ProtocolViolation("chunk fetching entered without a status".into());
            return Err(self.fail(err));
        };
        if status.chunk_count > self.next_chunk {
            let first = self.next_chunk;
            let count = status.chunk_count - first;
            debug!(first, count, "fetching chunk range");
            self.chunks = Some(ChunkRangeStream::chunks(
                self.stub.clone(),
                self.config.clone(),
                status.query_id.clone(),
                first,
                count,
                self.deadline,
            ));
            self.next_chunk = status.chunk_count;
        } else if status.completion().is_terminal_producing() {
            self.state = State::Done;
            self.release_all();
        } else {
            self.state = State::InfoPolling;
        }
        Ok(None)
    }

    async fn poll_status(&mut self) -> Result<()> {
        if self.info.is_none() {
            let query_id = self
                .latest
                .as_ref()
                .map(|status| status.query_id.clone())
                .expect("status stored before polling");
            self.info = Some(QueryInfoStream::new(
                self.stub.clone(),
                self.config.clone(),
                query_id,
                self.deadline,
            ));
        }
        let info = self.info.as_mut().expect("info stream open");
        match info.next_status().await {
            Ok(Some(status)) => {
                self.store_status(status)?;
                self.state = State::ChunkFetching;
                Ok(())
            }
            Ok(None) => {
                let err = DriverError::ProtocolViolation(
                    "status stream finished while chunks were pending".into(),
                );
                Err(self.fail(err))
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn store_status(&mut self, status: QueryStatus) -> Result<()> {
        if status.query_id.is_empty() {
            let err = DriverError::ProtocolViolation("query status without a query id".into());
            return Err(self.fail(err));
        }
        if let Some(prev) = &self.latest {
            if prev.query_id != status.query_id {
                let err = DriverError::ProtocolViolation(format!(
                    "query id changed from {} to {}",
                    prev.query_id, status.query_id
                ));
                return Err(self.fail(err));
            }
            if status.chunk_count < prev.chunk_count || status.row_count < prev.row_count {
                let err =
                    DriverError::ProtocolViolation("query progress went backwards".into());
                return Err(self.fail(err));
            }
        }
        debug!(
            query_id = %status.query_id,
            completion = ?status.completion(),
            chunks = status.chunk_count,
            rows = status.row_count,
            "query status"
        );
        self.latest = Some(status);
        Ok(())
    }

    fn classify(&self, status: tonic::Status) -> DriverError {
        let query_id = self.latest.as_ref().map(|s| s.query_id.as_str());
        classify(
            status,
            &ErrorContext {
                sql: Some(&self.sql),
                query_id,
            },
            &self.config,
        )
    }

    fn submission_error(&mut self, status: &tonic::Status) -> DriverError {
        let message = if status.message().is_empty() {
            status.code().description().to_string()
        } else {
            status.message().to_string()
        };
        self.submission_failure(message)
    }

    fn submission_failure(&mut self, message: impl Into<String>) -> DriverError {
        self.fail(DriverError::Submission {
            message: message.into(),
            sql: truncate_query_text(&self.sql),
        })
    }

    fn fail(&mut self, err: DriverError) -> DriverError {
        self.state = State::Failed;
        self.release_all();
        err
    }

    fn release_exec(&mut self) {
        if let Some(mut exec) = self.exec.take() {
            exec.close();
        }
    }

    fn release_all(&mut self) {
        self.release_exec();
        if let Some(info) = self.info.as_mut() {
            info.close();
        }
        self.info = None;
        if let Some(chunks) = self.chunks.as_mut() {
            chunks.close();
        }
        self.chunks = None;
    }
}

impl Drop for QueryExecution {
    fn drop(&mut self) {
        self.release_all();
    }
}
