//! Result Normalization
//!
//! Converts a resolved remote value into the uniform form the dispatchers
//! hand back to callers: a scalar, an ordered sequence of rows, or a single
//! field map. The catalog declares which shape an operation produces; a
//! remote value of any other shape is a `MalformedResult`.
//!
//! Absence of data is never an error. A missing row list normalizes to an
//! empty sequence and a missing field map to an empty map.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{RawValue, Row};
use crate::error::{MonitorError, Result};

/// Shape a catalog entry expects from the remote operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultShape {
    /// A single number or string
    Scalar,
    /// An ordered sequence of records
    RowList,
    /// A single ordered name/value map
    FieldMap,
}

impl ResultShape {
    /// Shape name as used in error messages
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::RowList => "rowList",
            Self::FieldMap => "fieldMap",
        }
    }
}

impl std::fmt::Display for ResultShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A normalized remote value
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Scalar(Value),
    Rows(Vec<Row>),
    Fields(Row),
}

impl Normalized {
    /// Rows, if this is a row sequence
    #[must_use]
    pub fn into_rows(self) -> Option<Vec<Row>> {
        match self {
            Self::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    /// Field map, if this is a field map
    #[must_use]
    pub fn into_fields(self) -> Option<Row> {
        match self {
            Self::Fields(fields) => Some(fields),
            _ => None,
        }
    }

    /// The count metric for a row sequence: exactly the number of rows
    #[must_use]
    pub fn row_count(&self) -> Option<usize> {
        match self {
            Self::Rows(rows) => Some(rows.len()),
            _ => None,
        }
    }

    /// Plain JSON form of the normalized value
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Scalar(value) => value,
            Self::Rows(rows) => Value::Array(rows.into_iter().map(Value::Object).collect()),
            Self::Fields(fields) => Value::Object(fields),
        }
    }
}

/// Normalize a remote value against the shape the catalog declared
///
/// `operation` is the remote operation name, used only for error reporting.
pub fn normalize(operation: &str, raw: Option<RawValue>, shape: ResultShape) -> Result<Normalized> {
    match (shape, raw) {
        (ResultShape::Scalar, None) => Ok(Normalized::Scalar(Value::Null)),
        (ResultShape::RowList, None) => Ok(Normalized::Rows(Vec::new())),
        (ResultShape::FieldMap, None) => Ok(Normalized::Fields(Row::new())),
        (ResultShape::Scalar, Some(RawValue::Scalar(value))) => Ok(Normalized::Scalar(value)),
        (ResultShape::RowList, Some(RawValue::RowList(rows))) => Ok(Normalized::Rows(rows)),
        (ResultShape::FieldMap, Some(RawValue::FieldMap(fields))) => Ok(Normalized::Fields(fields)),
        (expected, Some(other)) => Err(MonitorError::malformed_result(
            operation,
            format!("expected {expected}, got {}", other.shape()),
        )),
    }
}

/// Build rows from positional records (a list of value lists)
///
/// Each inner list is zipped with `columns`; surplus values are dropped and
/// missing trailing values are left out of the row.
pub fn rows_from_columns(operation: &str, columns: &[&str], value: Value) -> Result<Vec<Row>> {
    let Value::Array(records) = value else {
        return Err(MonitorError::malformed_result(
            operation,
            "expected a list of records",
        ));
    };

    records
        .into_iter()
        .map(|record| match record {
            Value::Array(values) => Ok(columns
                .iter()
                .zip(values)
                .map(|(column, value)| ((*column).to_string(), value))
                .collect::<Row>()),
            Value::Object(row) => Ok(row),
            other => Err(MonitorError::malformed_result(
                operation,
                format!("record is neither a list nor a map: {other}"),
            )),
        })
        .collect()
}
