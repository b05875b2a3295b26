//! CLI Result Envelopes
//!
//! Every `teiid-monitor` command prints exactly one JSON document on stdout:
//! a `SuccessEnvelope` carrying the metric value, operation outcome or role
//! report, or an `ErrorEnvelope` carrying the adapter's stable error code.
//!
//! # Shapes
//! - Success: `{"ok": true, "component": "VDB", "command": "...", "data": 4, "meta": {...}}`
//! - Error: `{"ok": false, "component": "...", "command": "...", "error": {"code", "message"}}`
//!
//! `data` is the bare value: a number or text for metrics, the
//! `{success, content}` outcome for operations. Consoles key on `ok` first.

use serde::{Deserialize, Serialize};

use crate::error::MonitorError;

/// Envelope printed when a command succeeds
///
/// A failed administrative operation still succeeds at this level; its
/// outcome carries `success: false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope<T> {
    pub ok: bool,

    /// `Platform` or `VDB`; empty for commands such as `targets`
    pub component: String,

    /// Metric name, operation name, or CLI command
    pub command: String,

    pub data: T,

    pub meta: Metadata,
}

impl<T> SuccessEnvelope<T> {
    pub fn new(
        component: impl Into<String>,
        command: impl Into<String>,
        data: T,
        meta: Metadata,
    ) -> Self {
        Self {
            ok: true,
            component: component.into(),
            command: command.into(),
            data,
            meta,
        }
    }
}

/// Envelope printed when a command fails with a [`MonitorError`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub ok: bool,

    pub component: String,

    pub command: String,

    pub error: ErrorInfo,
}

impl ErrorEnvelope {
    pub fn new(component: impl Into<String>, command: impl Into<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            component: component.into(),
            command: command.into(),
            error,
        }
    }

    /// Wrap an adapter error, keeping its stable code
    pub fn from_error(
        component: impl Into<String>,
        command: impl Into<String>,
        err: &MonitorError,
    ) -> Self {
        Self::new(component, command, ErrorInfo::from(err))
    }
}

/// Code and message of a failed command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// One of the codes returned by [`MonitorError::error_code`]
    pub code: String,

    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&MonitorError> for ErrorInfo {
    fn from(err: &MonitorError) -> Self {
        Self::new(err.error_code(), err.message())
    }
}

/// Timing of a successful command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Wall time spent on remote calls and aggregation
    pub execution_ms: u64,

    /// Row count of a reporting operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_returned: Option<usize>,
}

impl Metadata {
    pub const fn new(execution_ms: u64) -> Self {
        Self {
            execution_ms,
            rows_returned: None,
        }
    }

    pub const fn with_rows(execution_ms: u64, rows_returned: usize) -> Self {
        Self {
            execution_ms,
            rows_returned: Some(rows_returned),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_serialization() {
        let envelope = SuccessEnvelope::new(
            "VDB",
            "GET_SESSIONS",
            serde_json::json!([{"session-id": "a"}]),
            Metadata::with_rows(42, 1),
        );

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains(r#""ok":true"#));
        assert!(json.contains(r#""component":"VDB""#));
        assert!(json.contains(r#""command":"GET_SESSIONS""#));
        assert!(json.contains(r#""execution_ms":42"#));
        assert!(json.contains(r#""rows_returned":1"#));
    }

    #[test]
    fn test_error_envelope_serialization() {
        let envelope = ErrorEnvelope::new(
            "Platform",
            "KILL_SESSION",
            ErrorInfo::new("MISSING_PARAMETER", "Missing required parameter: sessionId"),
        );

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains(r#""ok":false"#));
        assert!(json.contains(r#""component":"Platform""#));
        assert!(json.contains(r#""code":"MISSING_PARAMETER""#));
        assert!(json.contains("Missing required parameter: sessionId"));
    }

    #[test]
    fn test_error_envelope_from_monitor_error() {
        let err = MonitorError::unknown_metric("Platform", "BOGUS");
        let envelope = ErrorEnvelope::from_error("Platform", "BOGUS", &err);

        assert!(!envelope.ok);
        assert_eq!(envelope.component, "Platform");
        assert_eq!(envelope.command, "BOGUS");
        assert_eq!(envelope.error.code, "UNKNOWN_METRIC");
        assert!(envelope.error.message.contains("BOGUS"));
    }

    #[test]
    fn test_administrative_failure_is_still_ok() {
        let outcome = serde_json::json!({
            "success": false,
            "content": "failure - see log for details"
        });
        let envelope = SuccessEnvelope::new("VDB", "CLEAR_CACHE", outcome, Metadata::new(3));

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["data"]["success"], false);
    }

    #[test]
    fn test_metadata_without_rows() {
        let meta = Metadata::new(100);
        let json = serde_json::to_string(&meta).unwrap();

        assert!(json.contains(r#""execution_ms":100"#));
        assert!(!json.contains("rows_returned"));
    }
}
