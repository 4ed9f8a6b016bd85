//! Columnar value accessors.
//!
//! Row-at-a-time typed reads over one record batch. The accessor is driven by
//! an ambient row cursor and reports every null observation through a
//! callback, both supplied as closures by the owning cursor (see
//! [`ResultSetView`](crate::result_set::ResultSetView)). Columns are
//! addressed by 1-based index, following the database convention.

mod array;
mod reader;
mod timestamp;

use std::sync::Arc;

use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;

pub use array::ColumnArray;
use reader::ColumnReader;

use crate::error::{DriverError, Result};

/// Supplies the row the next read applies to.
pub type RowCursor = Arc<dyn Fn() -> usize + Send + Sync>;
/// Receives whether the value just read was null.
pub type NullObserver = Arc<dyn Fn(bool) + Send + Sync>;

/// Typed reads over the current batch.
///
/// Value operations return the database defaults for null cells (`false`,
/// `0`, `None`) after notifying the null observer; the observer fires exactly
/// once per read.
pub struct ValueAccessor {
    readers: Vec<ColumnReader>,
    schema: SchemaRef,
    row: RowCursor,
    observe_null: NullObserver,
    session_timezone: Tz,
}

impl ValueAccessor {
    pub fn bind(
        batch: &RecordBatch,
        row: RowCursor,
        observe_null: NullObserver,
        session_timezone: Tz,
    ) -> Result<Self> {
        let readers = batch
            .columns()
            .iter()
            .map(ColumnReader::bind)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            readers,
            schema: batch.schema(),
            row,
            observe_null,
            session_timezone,
        })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn column_count(&self) -> usize {
        self.readers.len()
    }

    /// 1-based index of a named column.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.schema
            .fields()
            .iter()
            .position(|field| field.name() == name)
            .map(|i| i + 1)
            .ok_or_else(|| DriverError::column_not_found(name))
    }

    fn reader(&self, column: usize) -> Result<&ColumnReader> {
        if column == 0 || column > self.readers.len() {
            return Err(DriverError::Range(format!(
                "column {column} is out of range, the batch has {} columns",
                self.readers.len()
            )));
        }
        Ok(&self.readers[column - 1])
    }

    fn current_row(&self) -> usize {
        (self.row)()
    }

    fn observe<T>(&self, value: Option<T>) -> Option<T> {
        (self.observe_null)(value.is_none());
        value
    }

    /// Native null bit of the cell; does not count as a read.
    pub fn is_null(&self, column: usize) -> Result<bool> {
        Ok(self.reader(column)?.is_null(self.current_row()))
    }

    pub fn get_bool(&self, column: usize) -> Result<bool> {
        let value = self.reader(column)?.bool_value(self.current_row())?;
        Ok(self.observe(value).unwrap_or(false))
    }

    pub fn get_byte(&self, column: usize) -> Result<i8> {
        let value = self.reader(column)?.i8_value(self.current_row())?;
        Ok(self.observe(value).unwrap_or(0))
    }

    pub fn get_short(&self, column: usize) -> Result<i16> {
        let value = self.reader(column)?.i16_value(self.current_row())?;
        Ok(self.observe(value).unwrap_or(0))
    }

    pub fn get_int(&self, column: usize) -> Result<i32> {
        let value = self.reader(column)?.i32_value(self.current_row())?;
        Ok(self.observe(value).unwrap_or(0))
    }

    pub fn get_long(&self, column: usize) -> Result<i64> {
        let value = self.reader(column)?.i64_value(self.current_row())?;
        Ok(self.observe(value).unwrap_or(0))
    }

    pub fn get_float(&self, column: usize) -> Result<f32> {
        let value = self.reader(column)?.f32_value(self.current_row())?;
        Ok(self.observe(value).unwrap_or(0.0))
    }

    pub fn get_double(&self, column: usize) -> Result<f64> {
        let value = self.reader(column)?.f64_value(self.current_row())?;
        Ok(self.observe(value).unwrap_or(0.0))
    }

    pub fn get_decimal(&self, column: usize) -> Result<Option<BigDecimal>> {
        let value = self.reader(column)?.decimal_value(self.current_row())?;
        Ok(self.observe(value))
    }

    pub fn get_string(&self, column: usize) -> Result<Option<String>> {
        let value = self.reader(column)?.string_value(self.current_row())?;
        Ok(self.observe(value))
    }

    pub fn get_bytes(&self, column: usize) -> Result<Option<Vec<u8>>> {
        let value = self.reader(column)?.bytes_value(self.current_row())?;
        Ok(self.observe(value))
    }

    pub fn get_date(&self, column: usize) -> Result<Option<NaiveDate>> {
        let value = self.reader(column)?.date_value(self.current_row())?;
        Ok(self.observe(value))
    }

    pub fn get_time(&self, column: usize) -> Result<Option<NaiveTime>> {
        let value = self.reader(column)?.time_value(self.current_row())?;
        Ok(self.observe(value))
    }

    pub fn get_timestamp(&self, column: usize) -> Result<Option<NaiveDateTime>> {
        self.get_timestamp_with_calendar(column, None)
    }

    /// Timestamp reinterpreted for presentation in `calendar`. A calendar
    /// matching the session timezone counts as framework-injected and is
    /// ignored for naive columns.
    pub fn get_timestamp_with_calendar(
        &self,
        column: usize,
        calendar: Option<Tz>,
    ) -> Result<Option<NaiveDateTime>> {
        let value = self.reader(column)?.timestamp_value(
            self.current_row(),
            calendar,
            self.session_timezone,
        )?;
        Ok(self.observe(value))
    }

    pub fn get_array(&self, column: usize) -> Result<Option<ColumnArray>> {
        let value = self.reader(column)?.array_value(self.current_row())?;
        Ok(self.observe(value))
    }
}
