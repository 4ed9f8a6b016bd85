//! Scripted transport stub and Arrow IPC helpers for driver tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result as AnyResult};
use arrow_array::{Int64Array, RecordBatch};
use arrow_ipc::writer::{
    CompressionContext, DictionaryTracker, IpcDataGenerator, IpcWriteOptions, write_message,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use tonic::Status;

use quarry_client::deadline::Deadline;
use quarry_client::stub::{MessageStream, QueryServiceStub};
use quarry_proto::{
    CompletionStatus, ExecuteQueryResponse, QueryInfoParam, QueryInfoResponse, QueryParam,
    QueryResultParam, QueryResultPart, QueryStatus, execute_query_response, query_info_response,
    query_result_part,
};

pub type Script<T> = Vec<Result<T, Status>>;

/// Stub whose three calls replay pre-recorded scripts, one per invocation,
/// and record the parameters they were called with.
#[derive(Default)]
pub struct ScriptedStub {
    exec_scripts: Mutex<VecDeque<Script<ExecuteQueryResponse>>>,
    info_scripts: Mutex<VecDeque<Script<QueryInfoResponse>>>,
    result_scripts: Mutex<VecDeque<Script<QueryResultPart>>>,
    exec_calls: AtomicUsize,
    info_calls: AtomicUsize,
    result_calls: AtomicUsize,
    exec_params: Mutex<Vec<QueryParam>>,
    info_params: Mutex<Vec<QueryInfoParam>>,
    result_params: Mutex<Vec<QueryResultParam>>,
}

impl ScriptedStub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_exec(&self, script: Script<ExecuteQueryResponse>) {
        self.exec_scripts.lock().unwrap().push_back(script);
    }

    pub fn push_info(&self, script: Script<QueryInfoResponse>) {
        self.info_scripts.lock().unwrap().push_back(script);
    }

    pub fn push_result(&self, script: Script<QueryResultPart>) {
        self.result_scripts.lock().unwrap().push_back(script);
    }

    pub fn exec_calls(&self) -> usize {
        self.exec_calls.load(Ordering::Relaxed)
    }

    pub fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::Relaxed)
    }

    pub fn result_calls(&self) -> usize {
        self.result_calls.load(Ordering::Relaxed)
    }

    pub fn exec_params(&self) -> Vec<QueryParam> {
        self.exec_params.lock().unwrap().clone()
    }

    pub fn info_params(&self) -> Vec<QueryInfoParam> {
        self.info_params.lock().unwrap().clone()
    }

    pub fn result_params(&self) -> Vec<QueryResultParam> {
        self.result_params.lock().unwrap().clone()
    }

    fn next_script<T>(scripts: &Mutex<VecDeque<Script<T>>>, what: &str) -> Result<Script<T>, Status> {
        scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Status::failed_precondition(format!("no scripted {what} response left")))
    }
}

#[async_trait]
impl QueryServiceStub for ScriptedStub {
    async fn execute_query(
        &self,
        param: QueryParam,
        _deadline: Deadline,
    ) -> Result<MessageStream<ExecuteQueryResponse>, Status> {
        self.exec_calls.fetch_add(1, Ordering::Relaxed);
        self.exec_params.lock().unwrap().push(param);
        let script = Self::next_script(&self.exec_scripts, "execute")?;
        Ok(stream::iter(script).boxed())
    }

    async fn get_query_info(
        &self,
        param: QueryInfoParam,
        _deadline: Deadline,
    ) -> Result<MessageStream<QueryInfoResponse>, Status> {
        self.info_calls.fetch_add(1, Ordering::Relaxed);
        self.info_params.lock().unwrap().push(param);
        let script = Self::next_script(&self.info_scripts, "query info")?;
        Ok(stream::iter(script).boxed())
    }

    async fn get_query_result(
        &self,
        param: QueryResultParam,
        _deadline: Deadline,
    ) -> Result<MessageStream<QueryResultPart>, Status> {
        self.result_calls.fetch_add(1, Ordering::Relaxed);
        self.result_params.lock().unwrap().push(param);
        let script = Self::next_script(&self.result_scripts, "query result")?;
        Ok(stream::iter(script).boxed())
    }
}

pub fn query_status(
    query_id: &str,
    completion: CompletionStatus,
    chunk_count: u64,
    row_count: u64,
) -> QueryStatus {
    QueryStatus {
        query_id: query_id.to_string(),
        completion: completion as i32,
        chunk_count,
        row_count,
    }
}

pub fn exec_status(status: QueryStatus) -> Result<ExecuteQueryResponse, Status> {
    Ok(ExecuteQueryResponse {
        payload: Some(execute_query_response::Payload::QueryInfo(status)),
    })
}

pub fn exec_inline(bytes: Vec<u8>) -> Result<ExecuteQueryResponse, Status> {
    Ok(ExecuteQueryResponse {
        payload: Some(execute_query_response::Payload::InlineResult(
            QueryResultPart {
                part: Some(query_result_part::Part::BinaryPart(bytes)),
            },
        )),
    })
}

pub fn info_status(status: QueryStatus) -> Result<QueryInfoResponse, Status> {
    Ok(QueryInfoResponse {
        payload: Some(query_info_response::Payload::QueryInfo(status)),
    })
}

pub fn result_binary(bytes: Vec<u8>) -> Result<QueryResultPart, Status> {
    Ok(QueryResultPart {
        part: Some(query_result_part::Part::BinaryPart(bytes)),
    })
}

pub fn result_rows(count: u64) -> Result<QueryResultPart, Status> {
    Ok(QueryResultPart {
        part: Some(query_result_part::Part::RowCount(count)),
    })
}

/// Server-side encoder: schema message once, then batch messages, as one
/// continuous IPC stream without end markers.
pub struct BatchEncoder {
    generator: IpcDataGenerator,
    tracker: DictionaryTracker,
    compression: CompressionContext,
    options: IpcWriteOptions,
}

impl BatchEncoder {
    pub fn new() -> Self {
        Self {
            generator: IpcDataGenerator::default(),
            tracker: DictionaryTracker::new(false),
            compression: CompressionContext::default(),
            options: IpcWriteOptions::default(),
        }
    }

    pub fn schema_bytes(&mut self, schema: &Schema) -> Vec<u8> {
        self.try_schema_bytes(schema).expect("encode schema")
    }

    pub fn batch_bytes(&mut self, batch: &RecordBatch) -> Vec<u8> {
        self.try_batch_bytes(batch).expect("encode batch")
    }

    fn try_schema_bytes(&mut self, schema: &Schema) -> AnyResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoded = self.generator.schema_to_bytes_with_dictionary_tracker(
            schema,
            &mut self.tracker,
            &self.options,
        );
        write_message(&mut buffer, encoded, &self.options).context("writing schema message")?;
        Ok(buffer)
    }

    fn try_batch_bytes(&mut self, batch: &RecordBatch) -> AnyResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let (dictionaries, encoded) = self
            .generator
            .encode(batch, &mut self.tracker, &self.options, &mut self.compression)
            .context("encoding batch")?;
        for dictionary in dictionaries {
            write_message(&mut buffer, dictionary, &self.options)
                .context("writing dictionary message")?;
        }
        write_message(&mut buffer, encoded, &self.options).context("writing batch message")?;
        Ok(buffer)
    }

    /// Schema plus batch in one payload, the shape of a first response.
    pub fn schema_and_batch_bytes(&mut self, batch: &RecordBatch) -> Vec<u8> {
        let mut bytes = self.schema_bytes(batch.schema().as_ref());
        bytes.extend_from_slice(&self.batch_bytes(batch));
        bytes
    }
}

impl Default for BatchEncoder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn int_schema() -> Schema {
    Schema::new(vec![Field::new("v", DataType::Int64, true)])
}

pub fn int_batch(values: &[Option<i64>]) -> RecordBatch {
    RecordBatch::try_new(
        Arc::new(int_schema()),
        vec![Arc::new(Int64Array::from(values.to_vec()))],
    )
    .expect("batch")
}

pub fn int_batch_of(len: usize, start: i64) -> RecordBatch {
    let values: Vec<Option<i64>> = (0..len as i64).map(|i| Some(start + i)).collect();
    int_batch(&values)
}
