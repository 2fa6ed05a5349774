//! Query results and typed access to row values.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::{OraError, OraResult};
use crate::protocol::{BackendError, ColumnMetadata, ColumnValue, LobLocator};
use crate::types::{FromOracle, TypeError};

/// One fetched row. Duplicate markers are already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct OraRow {
    values: Vec<ColumnValue>,
    columns: Arc<[ColumnMetadata]>,
}

impl OraRow {
    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Position of a column by name, case-insensitive like Oracle identifiers.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.name.eq_ignore_ascii_case(name))
    }

    pub fn value(&self, idx: usize) -> Option<&ColumnValue> {
        self.values.get(idx)
    }

    /// Decode a non-null column.
    ///
    /// # Example
    /// ```ignore
    /// let name: String = row.get(0)?;
    /// let salary: f64 = row.get(1)?;
    /// ```
    pub fn get<T: FromOracle>(&self, idx: usize) -> OraResult<T> {
        self.get_opt(idx)?
            .ok_or(OraError::Type(TypeError::UnexpectedNull))
    }

    /// Decode a column, mapping NULL to `None`.
    pub fn get_opt<T: FromOracle>(&self, idx: usize) -> OraResult<Option<T>> {
        let (value, column) = self
            .values
            .get(idx)
            .zip(self.columns.get(idx))
            .ok_or_else(|| TypeError::InvalidData(format!("column index {idx} out of range")))?;
        match value {
            ColumnValue::Null | ColumnValue::Duplicate => Ok(None),
            ColumnValue::Bytes(bytes) => Ok(Some(T::from_oracle(bytes, column.data_type)?)),
            ColumnValue::Lob(_) => Err(TypeError::UnexpectedType {
                expected: "inline value",
                got: column.data_type,
            }
            .into()),
        }
    }

    pub fn get_by_name<T: FromOracle>(&self, name: &str) -> OraResult<T> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| TypeError::InvalidData(format!("no column named {name}")))?;
        self.get(idx)
    }

    /// Get a column value as String.
    /// Returns None if the value is NULL or not text.
    pub fn get_string(&self, idx: usize) -> Option<String> {
        self.get_opt(idx).ok().flatten()
    }

    pub fn get_i64(&self, idx: usize) -> Option<i64> {
        self.get_opt(idx).ok().flatten()
    }

    pub fn get_bytes(&self, idx: usize) -> Option<&[u8]> {
        match self.values.get(idx)? {
            ColumnValue::Bytes(bytes) => Some(&bytes[..]),
            _ => None,
        }
    }

    /// Locator of a CLOB, NCLOB, BLOB or BFILE column.
    pub fn lob(&self, idx: usize) -> Option<&LobLocator> {
        match self.values.get(idx)? {
            ColumnValue::Lob(locator) => Some(locator),
            _ => None,
        }
    }

    pub fn is_null(&self, idx: usize) -> bool {
        matches!(self.values.get(idx), None | Some(ColumnValue::Null))
    }
}

/// Outcome of one statement execution, rows included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Option<Arc<[ColumnMetadata]>>,
    pub rows: Vec<OraRow>,
    /// Rows fetched for a query, rows affected for DML.
    pub row_count: u64,
    pub warning: Option<BackendError>,
    pub cursor_id: u16,
}

impl QueryResult {
    /// Append a decoded row, filling duplicate columns from the previous row.
    pub(crate) fn push_row(&mut self, mut values: Vec<ColumnValue>) {
        let Some(columns) = self.columns.clone() else {
            return;
        };
        if let Some(previous) = self.rows.last() {
            for (idx, value) in values.iter_mut().enumerate() {
                if *value == ColumnValue::Duplicate {
                    *value = previous.values.get(idx).cloned().unwrap_or(ColumnValue::Null);
                }
            }
        } else {
            for value in values.iter_mut().filter(|v| **v == ColumnValue::Duplicate) {
                *value = ColumnValue::Null;
            }
        }
        self.rows.push(OraRow { values, columns });
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Raw bytes of the first column of the first row.
    pub fn scalar_bytes(&self) -> Option<Bytes> {
        match self.rows.first()?.values.first()? {
            ColumnValue::Bytes(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }
}
