//! Cursor over a stream of record batches.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use arrow_array::RecordBatch;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;

use crate::accessor::{ColumnArray, ValueAccessor};
use crate::error::Result;
use crate::execution::QueryExecution;
use crate::range_stream::{ChunkRangeStream, RowRangeStream};
use crate::session::SessionConfig;

/// Anything that can feed batches to a result set.
#[async_trait]
pub trait BatchSource: Send {
    async fn next_batch(&mut self) -> Result<Option<RecordBatch>>;
    fn close(&mut self);
}

#[async_trait]
impl BatchSource for QueryExecution {
    async fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        self.pull().await
    }

    fn close(&mut self) {
        QueryExecution::close(self);
    }
}

#[async_trait]
impl BatchSource for ChunkRangeStream {
    async fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        ChunkRangeStream::next_batch(self).await
    }

    fn close(&mut self) {
        ChunkRangeStream::close(self);
    }
}

#[async_trait]
impl BatchSource for RowRangeStream {
    async fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        RowRangeStream::next_batch(self).await
    }

    fn close(&mut self) {
        RowRangeStream::close(self);
    }
}

/// Typed row cursor over the batches of a source.
///
/// `next` advances one row, pulling and binding the next non-empty batch as
/// needed. The typed getters delegate to the bound [`ValueAccessor`];
/// `was_null` reflects the most recent read.
pub struct ResultSetView<S> {
    source: S,
    accessor: Option<ValueAccessor>,
    rows_in_batch: usize,
    next_row: usize,
    row: Arc<AtomicUsize>,
    null_seen: Arc<AtomicBool>,
    session_timezone: Tz,
    done: bool,
}

impl<S: BatchSource> ResultSetView<S> {
    pub fn new(source: S, config: &SessionConfig) -> Self {
        Self {
            source,
            accessor: None,
            rows_in_batch: 0,
            next_row: 0,
            row: Arc::new(AtomicUsize::new(0)),
            null_seen: Arc::new(AtomicBool::new(false)),
            session_timezone: config.resolve_session_timezone(),
            done: false,
        }
    }

    /// Positions on the next row; false once the result set is drained.
    pub async fn next(&mut self) -> Result<bool> {
        if self.done {
            return Ok(false);
        }
        loop {
            if self.next_row < self.rows_in_batch {
                self.row.store(self.next_row, Ordering::Relaxed);
                self.next_row += 1;
                return Ok(true);
            }
            match self.source.next_batch().await? {
                Some(batch) => {
                    if batch.num_rows() == 0 {
                        continue;
                    }
                    self.bind(&batch)?;
                }
                None => {
                    self.done = true;
                    self.source.close();
                    return Ok(false);
                }
            }
        }
    }

    fn bind(&mut self, batch: &RecordBatch) -> Result<()> {
        let row = self.row.clone();
        let null_seen = self.null_seen.clone();
        self.accessor = Some(ValueAccessor::bind(
            batch,
            Arc::new(move || row.load(Ordering::Relaxed)),
            Arc::new(move |is_null| null_seen.store(is_null, Ordering::Relaxed)),
            self.session_timezone,
        )?);
        self.rows_in_batch = batch.num_rows();
        self.next_row = 0;
        Ok(())
    }

    fn accessor(&self) -> Result<&ValueAccessor> {
        self.accessor.as_ref().ok_or_else(|| {
            crate::error::DriverError::Range("the cursor is not positioned on a row".into())
        })
    }

    /// Whether the last value read was null.
    pub fn was_null(&self) -> bool {
        self.null_seen.load(Ordering::Relaxed)
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.accessor()?.column_index(name)
    }

    pub fn is_null(&self, column: usize) -> Result<bool> {
        self.accessor()?.is_null(column)
    }

    pub fn get_bool(&self, column: usize) -> Result<bool> {
        self.accessor()?.get_bool(column)
    }

    pub fn get_byte(&self, column: usize) -> Result<i8> {
        self.accessor()?.get_byte(column)
    }

    pub fn get_short(&self, column: usize) -> Result<i16> {
        self.accessor()?.get_short(column)
    }

    pub fn get_int(&self, column: usize) -> Result<i32> {
        self.accessor()?.get_int(column)
    }

    pub fn get_long(&self, column: usize) -> Result<i64> {
        self.accessor()?.get_long(column)
    }

    pub fn get_float(&self, column: usize) -> Result<f32> {
        self.accessor()?.get_float(column)
    }

    pub fn get_double(&self, column: usize) -> Result<f64> {
        self.accessor()?.get_double(column)
    }

    pub fn get_decimal(&self, column: usize) -> Result<Option<BigDecimal>> {
        self.accessor()?.get_decimal(column)
    }

    pub fn get_string(&self, column: usize) -> Result<Option<String>> {
        self.accessor()?.get_string(column)
    }

    pub fn get_bytes(&self, column: usize) -> Result<Option<Vec<u8>>> {
        self.accessor()?.get_bytes(column)
    }

    pub fn get_date(&self, column: usize) -> Result<Option<NaiveDate>> {
        self.accessor()?.get_date(column)
    }

    pub fn get_time(&self, column: usize) -> Result<Option<NaiveTime>> {
        self.accessor()?.get_time(column)
    }

    pub fn get_timestamp(&self, column: usize) -> Result<Option<NaiveDateTime>> {
        self.accessor()?.get_timestamp(column)
    }

    pub fn get_timestamp_with_calendar(
        &self,
        column: usize,
        calendar: Option<Tz>,
    ) -> Result<Option<NaiveDateTime>> {
        self.accessor()?.get_timestamp_with_calendar(column, calendar)
    }

    pub fn get_array(&self, column: usize) -> Result<Option<ColumnArray>> {
        self.accessor()?.get_array(column)
    }

    pub fn get_bool_by_name(&self, name: &str) -> Result<bool> {
        self.get_bool(self.column_index(name)?)
    }

    pub fn get_int_by_name(&self, name: &str) -> Result<i32> {
        self.get_int(self.column_index(name)?)
    }

    pub fn get_long_by_name(&self, name: &str) -> Result<i64> {
        self.get_long(self.column_index(name)?)
    }

    pub fn get_double_by_name(&self, name: &str) -> Result<f64> {
        self.get_double(self.column_index(name)?)
    }

    pub fn get_string_by_name(&self, name: &str) -> Result<Option<String>> {
        self.get_string(self.column_index(name)?)
    }

    /// Releases the underlying source. Idempotent.
    pub fn close(&mut self) {
        self.done = true;
        self.source.close();
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
