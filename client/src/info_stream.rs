//! Retrying stream of status updates for one query.

use std::sync::Arc;

use quarry_proto::{CompletionStatus, QueryInfoParam, QueryStatus, query_info_response};
use tracing::{debug, warn};

use crate::classifier::{ErrorContext, classify};
use crate::deadline::Deadline;
use crate::error::{DriverError, Result, is_cancelled};
use crate::grpc_stream::GrpcStreamIterator;
use crate::session::SessionConfig;
use crate::stub::QueryServiceStub;

/// Abnormal terminations tolerated between two successful status messages.
pub const MAX_CONSECUTIVE_TERMINATIONS: u32 = 2;

enum Termination {
    Cancelled,
    Ended,
}

/// Streaming source of [`QueryStatus`] for a query id.
///
/// The server is allowed to drop the status stream mid-flight (including via
/// CANCELLED); up to two consecutive terminations are absorbed by reopening,
/// and the budget resets on every successfully received status. Iteration
/// ends once completion reaches `Finished`.
pub struct QueryInfoStream {
    stub: Arc<dyn QueryServiceStub>,
    config: SessionConfig,
    query_id: String,
    deadline: Deadline,
    inner: Option<GrpcStreamIterator<quarry_proto::QueryInfoResponse>>,
    consecutive_terminations: u32,
    finished: bool,
    schema: Option<Vec<u8>>,
}

impl QueryInfoStream {
    pub fn new(
        stub: Arc<dyn QueryServiceStub>,
        config: SessionConfig,
        query_id: String,
        deadline: Deadline,
    ) -> Self {
        Self {
            stub,
            config,
            query_id,
            deadline,
            inner: None,
            consecutive_terminations: 0,
            finished: false,
            schema: None,
        }
    }

    /// Next status update; `None` once the query finished.
    pub async fn next_status(&mut self) -> Result<Option<QueryStatus>> {
        if self.finished {
            return Ok(None);
        }
        loop {
            if self.inner.is_none() {
                let stream = self
                    .stub
                    .get_query_info(
                        QueryInfoParam {
                            query_id: self.query_id.clone(),
                            streaming: true,
                        },
                        self.deadline,
                    )
                    .await
                    .map_err(|status| self.classify(status))?;
                self.inner = Some(GrpcStreamIterator::spawn(stream));
            }
            let inner = self.inner.as_mut().expect("stream just opened");
            match inner.next().await {
                Some(Ok(response)) => match response.payload {
                    Some(query_info_response::Payload::QueryInfo(status)) => {
                        self.consecutive_terminations = 0;
                        if status.completion() == CompletionStatus::Finished {
                            self.finished = true;
                            self.release();
                        }
                        return Ok(Some(status));
                    }
                    Some(query_info_response::Payload::ArrowSchema(bytes)) => {
                        self.schema = Some(bytes);
                    }
                    Some(query_info_response::Payload::Heartbeat(_)) | None => {}
                },
                Some(Err(status)) if is_cancelled(&status) => {
                    self.absorb_termination(Termination::Cancelled)?;
                }
                Some(Err(status)) => {
                    self.release();
                    return Err(self.classify(status));
                }
                None => {
                    self.absorb_termination(Termination::Ended)?;
                }
            }
        }
    }

    /// Latest serialized Arrow schema delivered on the stream, if any.
    pub fn arrow_schema(&self) -> Option<&[u8]> {
        self.schema.as_deref()
    }

    pub fn close(&mut self) {
        self.finished = true;
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

    fn absorb_termination(&mut self, kind: Termination) -> Result<()> {
        self.release();
        self.consecutive_terminations += 1;
        if self.consecutive_terminations > MAX_CONSECUTIVE_TERMINATIONS {
            return Err(match kind {
                Termination::Cancelled => DriverError::StreamCancelled { expected: false },
                Termination::Ended => DriverError::TransientStreamEnd,
            });
        }
        warn!(
            query_id = %self.query_id,
            attempt = self.consecutive_terminations,
            "status stream terminated, reopening"
        );
        Ok(())
    }
}

/// One-shot status snapshot, under the same termination budget but without a
/// streaming reopen.
pub async fn snapshot(
    stub: &Arc<dyn QueryServiceStub>,
    config: &SessionConfig,
    query_id: &str,
    deadline: Deadline,
) -> Result<QueryStatus> {
    let mut attempts = 0u32;
    loop {
        match snapshot_once(stub, config, query_id, deadline).await {
            Ok(status) => return Ok(status),
            Err(
                err @ (DriverError::StreamCancelled { .. } | DriverError::TransientStreamEnd),
            ) => {
                attempts += 1;
                if attempts > MAX_CONSECUTIVE_TERMINATIONS {
                    return Err(err);
                }
                debug!(query_id, attempt = attempts, "status snapshot retried");
            }
            Err(err) => return Err(err),
        }
    }
}

async fn snapshot_once(
    stub: &Arc<dyn QueryServiceStub>,
    config: &SessionConfig,
    query_id: &str,
    deadline: Deadline,
) -> Result<QueryStatus> {
    let context_err =
        |status| classify(status, &ErrorContext::with_query_id(Some(query_id)), config);
    let stream = stub
        .get_query_info(
            QueryInfoParam {
                query_id: query_id.to_string(),
                streaming: false,
            },
            deadline,
        )
        .await
        .map_err(context_err)?;
    let mut iter = GrpcStreamIterator::spawn(stream);
    loop {
        match iter.next().await {
            Some(Ok(response)) => match response.payload {
                Some(query_info_response::Payload::QueryInfo(status)) => {
                    iter.close();
                    return Ok(status);
                }
                _ => continue,
            },
            Some(Err(status)) if is_cancelled(&status) => {
                return Err(DriverError::StreamCancelled { expected: false });
            }
            Some(Err(status)) => return Err(context_err(status)),
            None => return Err(DriverError::TransientStreamEnd),
        }
    }
}
