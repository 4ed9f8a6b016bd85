//! Driver facade.

use std::sync::Arc;

use quarry_proto::{QueryStatus, TransferMode};
use tonic::transport::Channel;

use crate::deadline::Deadline;
use crate::error::Result;
use crate::execution::QueryExecution;
use crate::info_stream;
use crate::polling;
use crate::range_stream::{ChunkRangeStream, RowRangeStream};
use crate::result_set::ResultSetView;
use crate::session::SessionConfig;
use crate::stub::{GrpcQueryStub, QueryServiceStub};

/// Entry point of the driver.
///
/// Holds a transport stub and the session configuration; every query runs in
/// its own [`QueryExecution`] and independent queries do not interact.
#[derive(Clone)]
pub struct QueryClient {
    stub: Arc<dyn QueryServiceStub>,
    config: SessionConfig,
}

impl QueryClient {
    pub fn new(stub: Arc<dyn QueryServiceStub>, config: SessionConfig) -> Self {
        Self { stub, config }
    }

    /// Client over an established grpc channel. The channel may be shared;
    /// it is never mutated here.
    pub fn from_channel(channel: Channel, config: SessionConfig) -> Self {
        Self::new(Arc::new(GrpcQueryStub::new(channel)), config)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Submits a query. The execute stream opens lazily on the first pull.
    pub fn submit(&self, sql: impl Into<String>, transfer_mode: TransferMode) -> QueryExecution {
        QueryExecution::new(self.stub.clone(), self.config.clone(), sql, transfer_mode)
    }

    /// Submits a query and wraps it in a typed row cursor.
    pub fn query(
        &self,
        sql: impl Into<String>,
        transfer_mode: TransferMode,
    ) -> ResultSetView<QueryExecution> {
        ResultSetView::new(self.submit(sql, transfer_mode), &self.config)
    }

    /// Batches of the chunk range `[first_chunk, first_chunk + chunk_count)`
    /// of an already submitted query.
    pub fn get_chunk_range(
        &self,
        query_id: impl Into<String>,
        first_chunk: u64,
        chunk_count: u64,
    ) -> ChunkRangeStream {
        ChunkRangeStream::chunks(
            self.stub.clone(),
            self.config.clone(),
            query_id.into(),
            first_chunk,
            chunk_count,
            self.config.local_deadline(),
        )
    }

    /// Batches covering `row_count` rows starting at `offset`.
    pub fn get_row_range(
        &self,
        query_id: impl Into<String>,
        offset: u64,
        row_count: u64,
        byte_limit: u32,
    ) -> Result<RowRangeStream> {
        RowRangeStream::rows(
            self.stub.clone(),
            self.config.clone(),
            query_id.into(),
            offset,
            row_count,
            byte_limit,
            self.config.local_deadline(),
        )
    }

    /// First status satisfying `predicate`, bounded by `deadline`.
    pub async fn wait_for(
        &self,
        query_id: &str,
        deadline: Deadline,
        predicate: impl FnMut(&QueryStatus) -> bool,
    ) -> Result<QueryStatus> {
        polling::wait_for(
            self.stub.clone(),
            self.config.clone(),
            query_id,
            deadline,
            predicate,
        )
        .await
    }

    /// One-shot status snapshot.
    pub async fn snapshot(&self, query_id: &str) -> Result<QueryStatus> {
        info_stream::snapshot(
            &self.stub,
            &self.config,
            query_id,
            self.config.local_deadline(),
        )
        .await
    }
}
