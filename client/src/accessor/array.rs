//! Materialized array values.

use arrow_array::{Array, ArrayRef, LargeListArray, ListArray};
use arrow_schema::DataType;
use arrow_select::concat::concat;

use crate::error::{DriverError, Result};

/// A self-contained copy of one list cell.
///
/// The element range is copied out of the column's child at construction, so
/// the value stays valid after the originating batch and stream are gone.
/// Indexing follows the 1-based database convention.
pub struct ColumnArray {
    values: ArrayRef,
}

impl ColumnArray {
    pub(crate) fn from_list(list: &ListArray, row: usize) -> Result<Self> {
        Self::materialize(list.value(row))
    }

    pub(crate) fn from_large_list(list: &LargeListArray, row: usize) -> Result<Self> {
        Self::materialize(list.value(row))
    }

    fn materialize(element: ArrayRef) -> Result<Self> {
        // concat re-buffers, detaching the slice from the parent column
        let values = concat(&[element.as_ref()])
            .map_err(|e| DriverError::unsupported(format!("cannot materialize array: {e}")))?;
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn element_type(&self) -> &DataType {
        self.values.data_type()
    }

    /// The whole array.
    pub fn values(&self) -> ArrayRef {
        self.values.clone()
    }

    /// `count` elements starting at 1-based `index`. `slice(1, 0)` on an
    /// empty array is valid.
    pub fn slice(&self, index: i64, count: usize) -> Result<ArrayRef> {
        if index < 1 {
            return Err(DriverError::Range(format!(
                "array index {index} is below the 1-based minimum"
            )));
        }
        let start = (index - 1) as usize;
        let end = start.checked_add(count);
        if end.is_none() || start > self.len() || end.expect("checked") > self.len() {
            return Err(DriverError::Range(format!(
                "array range [{index}, +{count}) is out of bounds for length {}",
                self.len()
            )));
        }
        Ok(self.values.slice(start, count))
    }
}
