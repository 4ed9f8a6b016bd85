//! Timestamp columns and their timezone semantics.
//!
//! A raw timestamp is an integer with a unit. Columns may carry a timezone
//! tag; callers may supply a calendar zone. The interplay:
//!
//! - naive column, no calendar: the raw value is UTC wall-clock, returned
//!   literally.
//! - naive column, calendar equal to the session timezone: the calendar is
//!   framework-injected and ignored.
//! - naive column, calendar differing from the session timezone: the UTC
//!   instant is converted to the calendar zone.
//! - tagged column: the instant is converted to the calendar zone when one is
//!   supplied, to the tag zone otherwise.
//!
//! The result is always a naive local datetime.

use arrow_array::cast::AsArray;
use arrow_array::types::{
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType,
};
use arrow_array::{
    Array, ArrayRef, TimestampMicrosecondArray, TimestampMillisecondArray,
    TimestampNanosecondArray, TimestampSecondArray,
};
use arrow_schema::TimeUnit;
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;

use crate::error::{DriverError, Result};

#[derive(Clone)]
enum TimestampValues {
    Second(TimestampSecondArray),
    Millisecond(TimestampMillisecondArray),
    Microsecond(TimestampMicrosecondArray),
    Nanosecond(TimestampNanosecondArray),
}

/// Typed handle on one timestamp column.
#[derive(Clone)]
pub(crate) struct TimestampReader {
    values: TimestampValues,
    tz: Option<Tz>,
}

impl TimestampReader {
    pub fn bind(array: &ArrayRef, unit: &TimeUnit, tz: Option<&str>) -> Result<Self> {
        let tz = tz.map(parse_zone_tag).transpose()?;
        let values = match unit {
            TimeUnit::Second => {
                TimestampValues::Second(array.as_primitive::<TimestampSecondType>().clone())
            }
            TimeUnit::Millisecond => TimestampValues::Millisecond(
                array.as_primitive::<TimestampMillisecondType>().clone(),
            ),
            TimeUnit::Microsecond => TimestampValues::Microsecond(
                array.as_primitive::<TimestampMicrosecondType>().clone(),
            ),
            TimeUnit::Nanosecond => {
                TimestampValues::Nanosecond(array.as_primitive::<TimestampNanosecondType>().clone())
            }
        };
        Ok(Self { values, tz })
    }

    pub fn as_array(&self) -> &dyn Array {
        match &self.values {
            TimestampValues::Second(a) => a,
            TimestampValues::Millisecond(a) => a,
            TimestampValues::Microsecond(a) => a,
            TimestampValues::Nanosecond(a) => a,
        }
    }

    pub fn is_null(&self, row: usize) -> bool {
        self.as_array().is_null(row)
    }

    pub fn has_zone_tag(&self) -> bool {
        self.tz.is_some()
    }

    fn raw(&self, row: usize) -> i64 {
        match &self.values {
            TimestampValues::Second(a) => a.value(row),
            TimestampValues::Millisecond(a) => a.value(row),
            TimestampValues::Microsecond(a) => a.value(row),
            TimestampValues::Nanosecond(a) => a.value(row),
        }
    }

    fn utc_instant(&self, row: usize) -> Result<DateTime<Utc>> {
        let raw = self.raw(row);
        let instant = match &self.values {
            TimestampValues::Second(_) => DateTime::from_timestamp(raw, 0),
            TimestampValues::Millisecond(_) => DateTime::from_timestamp_millis(raw),
            TimestampValues::Microsecond(_) => DateTime::from_timestamp_micros(raw),
            TimestampValues::Nanosecond(_) => Some(DateTime::from_timestamp_nanos(raw)),
        };
        instant.ok_or_else(|| {
            DriverError::unsupported_datetime(format!("timestamp value {raw} is out of range"))
        })
    }

    /// The naive local datetime under the tag/calendar rules above.
    pub fn naive_value(
        &self,
        row: usize,
        calendar: Option<Tz>,
        session_timezone: Tz,
    ) -> Result<NaiveDateTime> {
        let instant = self.utc_instant(row)?;
        Ok(match (self.tz, calendar) {
            (None, None) => instant.naive_utc(),
            (None, Some(cal)) if cal == session_timezone => instant.naive_utc(),
            (None, Some(cal)) => instant.with_timezone(&cal).naive_local(),
            (Some(tag), None) => instant.with_timezone(&tag).naive_local(),
            (Some(_), Some(cal)) => instant.with_timezone(&cal).naive_local(),
        })
    }

    /// The naive value under the no-calendar rules: tag zone for tagged
    /// columns, literal UTC otherwise.
    pub fn naive_default(&self, row: usize) -> Result<NaiveDateTime> {
        self.naive_value(row, None, Tz::UTC)
    }

    /// ISO-8601 text: seconds precision for second-unit columns, millisecond
    /// precision otherwise, `Z` suffix iff the column carries a zone tag.
    pub fn format(&self, row: usize) -> Result<String> {
        let naive = self.utc_instant(row)?.naive_utc();
        let mut text = match &self.values {
            TimestampValues::Second(_) => naive.format("%Y-%m-%dT%H:%M:%S").to_string(),
            _ => naive.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
        };
        if self.tz.is_some() {
            text.push('Z');
        }
        Ok(text)
    }
}

/// Arrow tags zones either as IANA names or as fixed UTC offsets; only the
/// UTC offset spelling of the latter is accepted.
fn parse_zone_tag(tag: &str) -> Result<Tz> {
    if tag == "+00:00" || tag == "Z" {
        return Ok(Tz::UTC);
    }
    tag.parse::<Tz>().map_err(|_| {
        DriverError::unsupported_datetime(format!("unsupported timezone tag {tag:?}"))
    })
}
