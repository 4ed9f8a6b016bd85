//! Typed handles on the columns of a record batch.

use arrow_array::{
    Array, ArrayRef, BinaryArray, BooleanArray, Date32Array, Date64Array, Decimal128Array,
    Decimal256Array, FixedSizeBinaryArray, Float32Array, Float64Array, Int8Array, Int16Array,
    Int32Array, Int64Array, LargeBinaryArray, LargeListArray, LargeStringArray, ListArray,
    StringArray, Time32MillisecondArray, Time32SecondArray, Time64MicrosecondArray,
    Time64NanosecondArray,
};
use arrow_schema::{DataType, TimeUnit};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use num_bigint::BigInt;

use super::array::ColumnArray;
use super::timestamp::TimestampReader;
use crate::error::{DriverError, Result};

/// One column of the current batch, downcast once at bind time.
///
/// Every value operation returns `Ok(None)` for a null cell without touching
/// the data; mismatched accessor/column pairs are unsupported-feature errors.
#[derive(Clone)]
pub(crate) enum ColumnReader {
    Boolean(BooleanArray),
    Int8(Int8Array),
    Int16(Int16Array),
    Int32(Int32Array),
    Int64(Int64Array),
    Float32(Float32Array),
    Float64(Float64Array),
    Decimal128(Decimal128Array),
    Decimal256(Decimal256Array),
    Utf8(StringArray),
    LargeUtf8(LargeStringArray),
    Binary(BinaryArray),
    LargeBinary(LargeBinaryArray),
    FixedSizeBinary(FixedSizeBinaryArray),
    Date32(Date32Array),
    Date64(Date64Array),
    Time32Second(Time32SecondArray),
    Time32Millisecond(Time32MillisecondArray),
    Time64Microsecond(Time64MicrosecondArray),
    Time64Nanosecond(Time64NanosecondArray),
    Timestamp(TimestampReader),
    List(ListArray),
    LargeList(LargeListArray),
}

fn downcast<T: Array + Clone + 'static>(array: &ArrayRef, what: &str) -> Result<T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| DriverError::unsupported(format!("column is not a {what} array")))
}

impl ColumnReader {
    pub fn bind(array: &ArrayRef) -> Result<Self> {
        Ok(match array.data_type() {
            DataType::Boolean => Self::Boolean(downcast(array, "boolean")?),
            DataType::Int8 => Self::Int8(downcast(array, "int8")?),
            DataType::Int16 => Self::Int16(downcast(array, "int16")?),
            DataType::Int32 => Self::Int32(downcast(array, "int32")?),
            DataType::Int64 => Self::Int64(downcast(array, "int64")?),
            DataType::Float32 => Self::Float32(downcast(array, "float32")?),
            DataType::Float64 => Self::Float64(downcast(array, "float64")?),
            DataType::Decimal128(_, _) => Self::Decimal128(downcast(array, "decimal128")?),
            DataType::Decimal256(_, _) => Self::Decimal256(downcast(array, "decimal256")?),
            DataType::Utf8 => Self::Utf8(downcast(array, "utf8")?),
            DataType::LargeUtf8 => Self::LargeUtf8(downcast(array, "large utf8")?),
            DataType::Binary => Self::Binary(downcast(array, "binary")?),
            DataType::LargeBinary => Self::LargeBinary(downcast(array, "large binary")?),
            DataType::FixedSizeBinary(_) => {
                Self::FixedSizeBinary(downcast(array, "fixed size binary")?)
            }
            DataType::Date32 => Self::Date32(downcast(array, "date32")?),
            DataType::Date64 => Self::Date64(downcast(array, "date64")?),
            DataType::Time32(TimeUnit::Second) => {
                Self::Time32Second(downcast(array, "time32[s]")?)
            }
            DataType::Time32(TimeUnit::Millisecond) => {
                Self::Time32Millisecond(downcast(array, "time32[ms]")?)
            }
            DataType::Time64(TimeUnit::Microsecond) => {
                Self::Time64Microsecond(downcast(array, "time64[us]")?)
            }
            DataType::Time64(TimeUnit::Nanosecond) => {
                Self::Time64Nanosecond(downcast(array, "time64[ns]")?)
            }
            DataType::Timestamp(unit, tz) => {
                Self::Timestamp(TimestampReader::bind(array, unit, tz.as_deref())?)
            }
            DataType::List(_) => Self::List(downcast(array, "list")?),
            DataType::LargeList(_) => Self::LargeList(downcast(array, "large list")?),
            other => {
                return Err(DriverError::unsupported(format!(
                    "unsupported column type {other:?}"
                )));
            }
        })
    }

    fn as_array(&self) -> &dyn Array {
        match self {
            Self::Boolean(a) => a,
            Self::Int8(a) => a,
            Self::Int16(a) => a,
            Self::Int32(a) => a,
            Self::Int64(a) => a,
            Self::Float32(a) => a,
            Self::Float64(a) => a,
            Self::Decimal128(a) => a,
            Self::Decimal256(a) => a,
            Self::Utf8(a) => a,
            Self::LargeUtf8(a) => a,
            Self::Binary(a) => a,
            Self::LargeBinary(a) => a,
            Self::FixedSizeBinary(a) => a,
            Self::Date32(a) => a,
            Self::Date64(a) => a,
            Self::Time32Second(a) => a,
            Self::Time32Millisecond(a) => a,
            Self::Time64Microsecond(a) => a,
            Self::Time64Nanosecond(a) => a,
            Self::Timestamp(ts) => ts.as_array(),
            Self::List(a) => a,
            Self::LargeList(a) => a,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Int8(_) => "int8",
            Self::Int16(_) => "int16",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Float32(_) => "float32",
            Self::Float64(_) => "float64",
            Self::Decimal128(_) => "decimal128",
            Self::Decimal256(_) => "decimal256",
            Self::Utf8(_) => "utf8",
            Self::LargeUtf8(_) => "large utf8",
            Self::Binary(_) => "binary",
            Self::LargeBinary(_) => "large binary",
            Self::FixedSizeBinary(_) => "fixed size binary",
            Self::Date32(_) => "date32",
            Self::Date64(_) => "date64",
            Self::Time32Second(_) => "time32[s]",
            Self::Time32Millisecond(_) => "time32[ms]",
            Self::Time64Microsecond(_) => "time64[us]",
            Self::Time64Nanosecond(_) => "time64[ns]",
            Self::Timestamp(_) => "timestamp",
            Self::List(_) => "list",
            Self::LargeList(_) => "large list",
        }
    }

    fn mismatch(&self, wanted: &str) -> DriverError {
        DriverError::unsupported(format!(
            "cannot read a {} column as {wanted}",
            self.type_name()
        ))
    }

    pub fn is_null(&self, row: usize) -> bool {
        self.as_array().is_null(row)
    }

    pub fn bool_value(&self, row: usize) -> Result<Option<bool>> {
        if self.is_null(row) {
            return Ok(None);
        }
        Ok(Some(match self {
            Self::Boolean(a) => a.value(row),
            Self::Int8(a) => a.value(row) != 0,
            Self::Int16(a) => a.value(row) != 0,
            Self::Int32(a) => a.value(row) != 0,
            Self::Int64(a) => a.value(row) != 0,
            _ => return Err(self.mismatch("boolean")),
        }))
    }

    pub fn i8_value(&self, row: usize) -> Result<Option<i8>> {
        if self.is_null(row) {
            return Ok(None);
        }
        Ok(Some(match self {
            Self::Boolean(a) => i8::from(a.value(row)),
            Self::Int8(a) => a.value(row),
            _ => return Err(self.mismatch("a byte")),
        }))
    }

    pub fn i16_value(&self, row: usize) -> Result<Option<i16>> {
        if self.is_null(row) {
            return Ok(None);
        }
        Ok(Some(match self {
            Self::Boolean(a) => i16::from(a.value(row)),
            Self::Int8(a) => i16::from(a.value(row)),
            Self::Int16(a) => a.value(row),
            _ => return Err(self.mismatch("a short")),
        }))
    }

    pub fn i32_value(&self, row: usize) -> Result<Option<i32>> {
        if self.is_null(row) {
            return Ok(None);
        }
        Ok(Some(match self {
            Self::Boolean(a) => i32::from(a.value(row)),
            Self::Int8(a) => i32::from(a.value(row)),
            Self::Int16(a) => i32::from(a.value(row)),
            Self::Int32(a) => a.value(row),
            Self::Int64(a) => i32::try_from(a.value(row)).map_err(|_| {
                DriverError::Range(format!("value {} does not fit in an i32", a.value(row)))
            })?,
            _ => return Err(self.mismatch("an integer")),
        }))
    }

    pub fn i64_value(&self, row: usize) -> Result<Option<i64>> {
        if self.is_null(row) {
            return Ok(None);
        }
        Ok(Some(match self {
            Self::Boolean(a) => i64::from(a.value(row)),
            Self::Int8(a) => i64::from(a.value(row)),
            Self::Int16(a) => i64::from(a.value(row)),
            Self::Int32(a) => i64::from(a.value(row)),
            Self::Int64(a) => a.value(row),
            _ => return Err(self.mismatch("a long")),
        }))
    }

    pub fn f32_value(&self, row: usize) -> Result<Option<f32>> {
        if self.is_null(row) {
            return Ok(None);
        }
        Ok(Some(match self {
            Self::Float32(a) => a.value(row),
            Self::Int8(a) => f32::from(a.value(row)),
            Self::Int16(a) => f32::from(a.value(row)),
            Self::Int32(a) => a.value(row) as f32,
            Self::Int64(a) => a.value(row) as f32,
            _ => return Err(self.mismatch("a float")),
        }))
    }

    pub fn f64_value(&self, row: usize) -> Result<Option<f64>> {
        if self.is_null(row) {
            return Ok(None);
        }
        Ok(Some(match self {
            Self::Float32(a) => f64::from(a.value(row)),
            Self::Float64(a) => a.value(row),
            Self::Int8(a) => f64::from(a.value(row)),
            Self::Int16(a) => f64::from(a.value(row)),
            Self::Int32(a) => f64::from(a.value(row)),
            Self::Int64(a) => a.value(row) as f64,
            _ => return Err(self.mismatch("a double")),
        }))
    }

    pub fn decimal_value(&self, row: usize) -> Result<Option<BigDecimal>> {
        if self.is_null(row) {
            return Ok(None);
        }
        Ok(Some(match self {
            Self::Decimal128(a) => {
                BigDecimal::new(BigInt::from(a.value(row)), i64::from(a.scale()))
            }
            Self::Decimal256(a) => BigDecimal::new(
                BigInt::from_signed_bytes_be(&a.value(row).to_be_bytes()),
                i64::from(a.scale()),
            ),
            Self::Int8(a) => BigDecimal::from(i64::from(a.value(row))),
            Self::Int16(a) => BigDecimal::from(i64::from(a.value(row))),
            Self::Int32(a) => BigDecimal::from(i64::from(a.value(row))),
            Self::Int64(a) => BigDecimal::from(a.value(row)),
            Self::Float32(a) => BigDecimal::try_from(f64::from(a.value(row)))
                .map_err(|_| DriverError::Range("value is not a finite number".into()))?,
            Self::Float64(a) => BigDecimal::try_from(a.value(row))
                .map_err(|_| DriverError::Range("value is not a finite number".into()))?,
            _ => return Err(self.mismatch("a decimal")),
        }))
    }

    pub fn string_value(&self, row: usize) -> Result<Option<String>> {
        if self.is_null(row) {
            return Ok(None);
        }
        Ok(Some(match self {
            Self::Boolean(a) => a.value(row).to_string(),
            Self::Int8(a) => a.value(row).to_string(),
            Self::Int16(a) => a.value(row).to_string(),
            Self::Int32(a) => a.value(row).to_string(),
            Self::Int64(a) => a.value(row).to_string(),
            Self::Float32(a) => a.value(row).to_string(),
            Self::Float64(a) => a.value(row).to_string(),
            Self::Decimal128(_) | Self::Decimal256(_) => self
                .decimal_value(row)?
                .expect("checked non-null")
                .to_string(),
            Self::Utf8(a) => a.value(row).to_string(),
            Self::LargeUtf8(a) => a.value(row).to_string(),
            Self::Binary(_) | Self::LargeBinary(_) | Self::FixedSizeBinary(_) => {
                let bytes = self.bytes_value(row)?.expect("checked non-null");
                String::from_utf8(bytes).map_err(|_| {
                    DriverError::unsupported("binary value is not valid utf-8")
                })?
            }
            Self::Date32(_) | Self::Date64(_) => self
                .date_value(row)?
                .expect("checked non-null")
                .format("%Y-%m-%d")
                .to_string(),
            Self::Time32Second(_) => self
                .time_value(row)?
                .expect("checked non-null")
                .format("%H:%M:%S")
                .to_string(),
            Self::Time32Millisecond(_) | Self::Time64Microsecond(_) | Self::Time64Nanosecond(_) => {
                self.time_value(row)?
                    .expect("checked non-null")
                    .format("%H:%M:%S%.3f")
                    .to_string()
            }
            Self::Timestamp(ts) => ts.format(row)?,
            Self::List(_) | Self::LargeList(_) => return Err(self.mismatch("a string")),
        }))
    }

    pub fn bytes_value(&self, row: usize) -> Result<Option<Vec<u8>>> {
        if self.is_null(row) {
            return Ok(None);
        }
        Ok(Some(match self {
            Self::Binary(a) => a.value(row).to_vec(),
            Self::LargeBinary(a) => a.value(row).to_vec(),
            Self::FixedSizeBinary(a) => a.value(row).to_vec(),
            Self::Utf8(a) => a.value(row).as_bytes().to_vec(),
            Self::LargeUtf8(a) => a.value(row).as_bytes().to_vec(),
            _ => return Err(self.mismatch("bytes")),
        }))
    }

    pub fn date_value(&self, row: usize) -> Result<Option<NaiveDate>> {
        if self.is_null(row) {
            return Ok(None);
        }
        Ok(Some(match self {
            Self::Date32(a) => {
                let days = i64::from(a.value(row));
                DateTime::from_timestamp(days * 86_400, 0)
                    .ok_or_else(|| {
                        DriverError::unsupported_datetime("date value is out of range")
                    })?
                    .date_naive()
            }
            Self::Date64(a) => DateTime::from_timestamp_millis(a.value(row))
                .ok_or_else(|| DriverError::unsupported_datetime("date value is out of range"))?
                .date_naive(),
            Self::Timestamp(ts) => ts.naive_default(row)?.date(),
            _ => return Err(self.mismatch("a date")),
        }))
    }

    pub fn time_value(&self, row: usize) -> Result<Option<NaiveTime>> {
        if self.is_null(row) {
            return Ok(None);
        }
        let (seconds, nanos) = match self {
            Self::Time32Second(a) => (i64::from(a.value(row)), 0),
            Self::Time32Millisecond(a) => {
                let v = i64::from(a.value(row));
                (v.div_euclid(1_000), v.rem_euclid(1_000) * 1_000_000)
            }
            Self::Time64Microsecond(a) => {
                let v = a.value(row);
                (v.div_euclid(1_000_000), v.rem_euclid(1_000_000) * 1_000)
            }
            Self::Time64Nanosecond(a) => {
                let v = a.value(row);
                (v.div_euclid(1_000_000_000), v.rem_euclid(1_000_000_000))
            }
            Self::Timestamp(ts) => return Ok(Some(ts.naive_default(row)?.time())),
            _ => return Err(self.mismatch("a time")),
        };
        let seconds = u32::try_from(seconds)
            .map_err(|_| DriverError::Range("negative time-of-day value".into()))?;
        NaiveTime::from_num_seconds_from_midnight_opt(seconds, nanos as u32)
            .ok_or_else(|| DriverError::Range("time-of-day value is out of range".into()))
            .map(Some)
    }

    pub fn timestamp_value(
        &self,
        row: usize,
        calendar: Option<Tz>,
        session_timezone: Tz,
    ) -> Result<Option<NaiveDateTime>> {
        match self {
            Self::Timestamp(ts) => {
                if ts.is_null(row) {
                    return Ok(None);
                }
                ts.naive_value(row, calendar, session_timezone).map(Some)
            }
            _ => Err(DriverError::unsupported_datetime(format!(
                "cannot read a {} column as a timestamp",
                self.type_name()
            ))),
        }
    }

    pub fn array_value(&self, row: usize) -> Result<Option<ColumnArray>> {
        if self.is_null(row) {
            return Ok(None);
        }
        Ok(Some(match self {
            Self::List(a) => ColumnArray::from_list(a, row)?,
            Self::LargeList(a) => ColumnArray::from_large_list(a, row)?,
            _ => return Err(self.mismatch("an array")),
        }))
    }
}
