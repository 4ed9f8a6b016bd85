//! Incremental decode of Arrow IPC result payloads.

use std::collections::VecDeque;

use arrow_array::RecordBatch;
use arrow_buffer::Buffer;
use arrow_ipc::reader::StreamDecoder;
use arrow_schema::SchemaRef;

use crate::error::{DriverError, Result};

/// Decodes binary result parts into record batches.
///
/// Parts are IPC stream fragments and may split messages arbitrarily; the
/// schema arrives in the first fragment of a result stream and is retained so
/// later fragments (and later calls made with the omit-schema flag) decode
/// against it.
pub struct BatchDecoder {
    inner: StreamDecoder,
    decoded: VecDeque<RecordBatch>,
    schema: Option<SchemaRef>,
}

impl BatchDecoder {
    pub fn new() -> Self {
        Self {
            inner: StreamDecoder::new(),
            decoded: VecDeque::new(),
            schema: None,
        }
    }

    /// Feeds one result part. Zero or more batches may become available.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<()> {
        let mut buffer = Buffer::from(bytes.to_vec());
        while !buffer.is_empty() {
            match self
                .inner
                .decode(&mut buffer)
                .map_err(|e| DriverError::ProtocolViolation(format!("malformed result payload: {e}")))?
            {
                Some(batch) => {
                    if self.schema.is_none() {
                        self.schema = Some(batch.schema());
                    }
                    self.decoded.push_back(batch);
                }
                None => break,
            }
        }
        Ok(())
    }

    pub fn next_batch(&mut self) -> Option<RecordBatch> {
        self.decoded.pop_front()
    }

    /// Schema of the result set, once the first batch was decoded.
    pub fn schema(&self) -> Option<SchemaRef> {
        self.schema.clone()
    }
}

impl Default for BatchDecoder {
    fn default() -> Self {
        Self::new()
    }
}
