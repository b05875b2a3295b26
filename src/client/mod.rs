//! Management Client Abstractions
//!
//! This module defines the boundary to the remote management protocol.
//! The protocol itself is a black box: a request names an operation, an
//! address inside the engine, and an ordered bag of additional properties;
//! the answer is a [`ManagementResult`].
//!
//! # Stateless Design
//! Every call to [`ManagementClient::execute`] is one request and one
//! response. No batching, no retries, no shared state between calls.
//!
//! # Transport Boundary
//! The heterogeneous remote value (scalar, list of records, nested map) is
//! resolved into [`RawValue`] as soon as a result is constructed, so call
//! sites never inspect untyped JSON to find out what they received.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;

use crate::error::Result;
use crate::normalize::ResultShape;

pub mod replay;

/// One record returned by the engine (session, request, transaction, statistic)
///
/// Field order is the order the engine reported.
pub type Row = Map<String, Value>;

/// Ordered additional properties sent with a request
pub type Properties = Map<String, Value>;

/// Path identifying a subsystem or resource inside the remote engine
///
/// Immutable: [`ManagementAddress::child`] returns a new address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagementAddress {
    segments: Vec<(String, String)>,
}

impl ManagementAddress {
    /// The server root (empty path)
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// The engine subsystem, `/subsystem=teiid`
    #[must_use]
    pub fn teiid() -> Self {
        Self::root().child("subsystem", "teiid")
    }

    /// A deployment by name, `/deployment=<name>`
    #[must_use]
    pub fn deployment(name: &str) -> Self {
        Self::root().child("deployment", name)
    }

    /// Compose a child address
    #[must_use]
    pub fn child(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push((key.into(), value.into()));
        Self { segments }
    }

    /// Append every segment of `other` below this address
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Address segments in order
    #[must_use]
    pub fn segments(&self) -> &[(String, String)] {
        &self.segments
    }
}

impl fmt::Display for ManagementAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for (key, value) in &self.segments {
            write!(f, "/{key}={value}")?;
        }
        Ok(())
    }
}

// Wire form: `[{"subsystem": "teiid"}, {"transport": "jdbc"}]`
impl Serialize for ManagementAddress {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let wire: Vec<Map<String, Value>> = self
            .segments
            .iter()
            .map(|(key, value)| {
                let mut segment = Map::new();
                segment.insert(key.clone(), Value::String(value.clone()));
                segment
            })
            .collect();
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ManagementAddress {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let wire = Vec::<Map<String, Value>>::deserialize(deserializer)?;
        let mut segments = Vec::with_capacity(wire.len());
        for segment in wire {
            for (key, value) in segment {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                segments.push((key, value));
            }
        }
        Ok(Self { segments })
    }
}

/// A single remote management request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagementRequest {
    /// Remote operation name (e.g. `list-sessions`)
    pub operation: String,

    /// Target address inside the engine
    pub address: ManagementAddress,

    /// Additional properties, sent in insertion order
    #[serde(flatten)]
    pub params: Properties,
}

impl ManagementRequest {
    /// Create a request without additional properties
    pub fn new(operation: impl Into<String>, address: ManagementAddress) -> Self {
        Self {
            operation: operation.into(),
            address,
            params: Properties::new(),
        }
    }

    /// Add one property, keeping insertion order
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// The remote value, resolved into one of the three shapes the engine produces
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// A single number, string, boolean, or anything that is not a record
    Scalar(Value),
    /// A list of records
    RowList(Vec<Row>),
    /// A single name/value map
    FieldMap(Row),
}

impl RawValue {
    /// The shape this value has
    #[must_use]
    pub const fn shape(&self) -> ResultShape {
        match self {
            Self::Scalar(_) => ResultShape::Scalar,
            Self::RowList(_) => ResultShape::RowList,
            Self::FieldMap(_) => ResultShape::FieldMap,
        }
    }

    /// Convert back into plain JSON
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Scalar(value) => value,
            Self::RowList(rows) => Value::Array(rows.into_iter().map(Value::Object).collect()),
            Self::FieldMap(fields) => Value::Object(fields),
        }
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self::FieldMap(fields),
            Value::Array(items) if items.iter().all(Value::is_object) => Self::RowList(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(row) => Some(row),
                        _ => None,
                    })
                    .collect(),
            ),
            other => Self::Scalar(other),
        }
    }
}

const UNSPECIFIED_FAILURE: &str = "operation failed without a failure description";

/// Outcome of one remote request
///
/// Invariant: a failed result carries no value and a non-empty failure
/// description; a successful result carries no failure description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireResult", into = "WireResult")]
pub struct ManagementResult {
    success: bool,
    value: Option<RawValue>,
    failure_description: Option<String>,
}

impl ManagementResult {
    /// Successful outcome; `Value::Null` is treated as "no value"
    #[must_use]
    pub fn success(value: Value) -> Self {
        let value = if value.is_null() {
            None
        } else {
            Some(RawValue::from(value))
        };
        Self {
            success: true,
            value,
            failure_description: None,
        }
    }

    /// Successful outcome without a value
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            success: true,
            value: None,
            failure_description: None,
        }
    }

    /// Failed outcome
    #[must_use]
    pub fn failure(description: impl Into<String>) -> Self {
        let mut description = description.into();
        if description.trim().is_empty() {
            description = UNSPECIFIED_FAILURE.to_string();
        }
        Self {
            success: false,
            value: None,
            failure_description: Some(description),
        }
    }

    /// Whether the engine reported success
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// The resolved value (always `None` for failures)
    #[must_use]
    pub const fn value(&self) -> Option<&RawValue> {
        self.value.as_ref()
    }

    /// Take the resolved value
    #[must_use]
    pub fn into_value(self) -> Option<RawValue> {
        self.value
    }

    /// Failure description (always `Some` for failures)
    #[must_use]
    pub fn failure_description(&self) -> Option<&str> {
        self.failure_description.as_deref()
    }
}

/// Remote protocol form: `{"outcome": "success", "result": ...}` or
/// `{"outcome": "failed", "failure-description": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireResult {
    outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(rename = "failure-description", default, skip_serializing_if = "Option::is_none")]
    failure_description: Option<Value>,
}

impl TryFrom<WireResult> for ManagementResult {
    type Error = String;

    fn try_from(wire: WireResult) -> std::result::Result<Self, Self::Error> {
        match wire.outcome.as_str() {
            "success" => Ok(Self::success(wire.result.unwrap_or(Value::Null))),
            "failed" | "cancelled" => {
                let description = match wire.failure_description {
                    Some(Value::String(s)) => s,
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                Ok(Self::failure(description))
            }
            other => Err(format!("unknown outcome '{other}'")),
        }
    }
}

impl From<ManagementResult> for WireResult {
    fn from(result: ManagementResult) -> Self {
        if result.success {
            Self {
                outcome: "success".to_string(),
                result: result.value.map(RawValue::into_value),
                failure_description: None,
            }
        } else {
            Self {
                outcome: "failed".to_string(),
                result: None,
                failure_description: result.failure_description.map(Value::String),
            }
        }
    }
}

/// Remote management client
///
/// Implementations own connection handling and any transport concurrency.
/// A returned `Err` means no result could be obtained at all; an engine-side
/// failure is an `Ok` result with `is_success() == false`.
pub trait ManagementClient {
    /// Execute a single request
    fn execute(
        &self,
        request: &ManagementRequest,
    ) -> impl Future<Output = Result<ManagementResult>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_address_composition() {
        let base = ManagementAddress::teiid();
        let jdbc = base.child("transport", "jdbc");

        assert_eq!(base.to_string(), "/subsystem=teiid");
        assert_eq!(jdbc.to_string(), "/subsystem=teiid/transport=jdbc");
        // the base address is left untouched
        assert_eq!(base.segments().len(), 1);
        assert_eq!(ManagementAddress::root().to_string(), "/");
    }

    #[test]
    fn test_address_join() {
        let server = ManagementAddress::root()
            .child("host", "master")
            .child("server", "one");
        let full = server.join(&ManagementAddress::teiid());
        assert_eq!(full.to_string(), "/host=master/server=one/subsystem=teiid");
    }

    #[test]
    fn test_address_wire_form() {
        let address = ManagementAddress::teiid().child("transport", "odbc");
        let json = serde_json::to_value(&address).unwrap();
        assert_eq!(json, json!([{"subsystem": "teiid"}, {"transport": "odbc"}]));

        let back: ManagementAddress = serde_json::from_value(json).unwrap();
        assert_eq!(back, address);
    }

    #[test]
    fn test_request_serializes_params_inline() {
        let request = ManagementRequest::new("terminate-session", ManagementAddress::teiid())
            .with("session", "abc");
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""operation":"terminate-session""#));
        assert!(json.contains(r#""session":"abc""#));
    }

    #[test]
    fn test_raw_value_resolution() {
        let shape = |value: Value| RawValue::from(value).shape();
        assert_eq!(shape(json!(3)), ResultShape::Scalar);
        assert_eq!(shape(json!({"a": 1})), ResultShape::FieldMap);
        assert_eq!(shape(json!([{"a": 1}, {"a": 2}])), ResultShape::RowList);
        assert_eq!(shape(json!([])), ResultShape::RowList);
        // positional rows are not records
        assert_eq!(shape(json!([["a", 1]])), ResultShape::Scalar);
    }

    #[test]
    fn test_failure_invariant() {
        let failed = ManagementResult::failure("");
        assert!(!failed.is_success());
        assert!(failed.value().is_none());
        assert!(!failed.failure_description().unwrap().is_empty());

        let ok = ManagementResult::success(json!([]));
        assert!(ok.is_success());
        assert!(ok.failure_description().is_none());
    }

    #[test]
    fn test_null_success_has_no_value() {
        assert!(ManagementResult::success(Value::Null).value().is_none());
    }

    #[test]
    fn test_wire_result_parsing() {
        let wire = json!({"outcome": "success", "result": [{"session-id": "1"}]});
        let ok: ManagementResult = serde_json::from_value(wire).unwrap();
        assert!(ok.is_success());
        assert_eq!(ok.value().unwrap().shape(), ResultShape::RowList);

        let wire = json!({
            "outcome": "failed",
            "failure-description": "TEIID50012 no such session"
        });
        let failed: ManagementResult = serde_json::from_value(wire).unwrap();
        assert!(!failed.is_success());
        assert_eq!(
            failed.failure_description(),
            Some("TEIID50012 no such session")
        );

        let bogus = serde_json::from_value::<ManagementResult>(json!({"outcome": "maybe"}));
        assert!(bogus.is_err());
    }
}
