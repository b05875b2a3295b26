//! Output Envelope Tests
//!
//! Validates that command output keeps its JSON contract:
//! - Success envelopes carry `ok`, `component`, `command`, `data`, `meta`
//! - Error envelopes carry the stable error code and message
//! - Metric values and operation outcomes serialize bare inside `data`
//!
//! Uses `insta` inline snapshots to detect unintended output changes.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use teiid_monitor::roles::RoleUpdateReport;
use teiid_monitor::{
    ErrorEnvelope, ErrorInfo, Metadata, MetricValue, MonitorError, OperationOutcome,
    SuccessEnvelope,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn top_level_keys(value: &Value) -> Vec<&str> {
    value
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect()
}

// ============================================================================
// Envelope Structure
// ============================================================================

#[test]
fn test_success_envelope_fields() {
    let data = MetricValue::Count(4);
    let envelope = SuccessEnvelope::new("VDB", "SESSION_COUNT", data, Metadata::new(3));
    let value = serde_json::to_value(&envelope).expect("Should serialize");

    let keys = top_level_keys(&value);
    assert_eq!(keys, vec!["ok", "component", "command", "data", "meta"]);
}

#[test]
fn test_error_envelope_fields() {
    let error = ErrorInfo::new("TRANSPORT_ERROR", "connection refused");
    let envelope = ErrorEnvelope::new("Platform", "KILL_SESSION", error);
    let value = serde_json::to_value(&envelope).expect("Should serialize");

    let keys = top_level_keys(&value);
    assert_eq!(keys, vec!["ok", "component", "command", "error"]);
    assert_eq!(
        value["error"],
        json!({"code": "TRANSPORT_ERROR", "message": "connection refused"})
    );
}

// ============================================================================
// Snapshot Tests (using insta)
// ============================================================================

#[test]
fn test_metric_envelope_snapshot() {
    let envelope = SuccessEnvelope::new(
        "Platform",
        "ENGINE_STATISTIC.buffer-usage",
        MetricValue::Number(0.25),
        Metadata::new(12),
    );

    let json_str = serde_json::to_string_pretty(&envelope).expect("Should serialize");
    insta::assert_snapshot!(json_str, @r#"
    {
      "ok": true,
      "component": "Platform",
      "command": "ENGINE_STATISTIC.buffer-usage",
      "data": 0.25,
      "meta": {
        "execution_ms": 12
      }
    }
    "#);
}

#[test]
fn test_failed_operation_envelope_snapshot() {
    let outcome = OperationOutcome::failed();
    let envelope = SuccessEnvelope::new("VDB", "CLEAR_CACHE", outcome, Metadata::new(7));

    let json_str = serde_json::to_string_pretty(&envelope).expect("Should serialize");
    insta::assert_snapshot!(json_str, @r#"
    {
      "ok": true,
      "component": "VDB",
      "command": "CLEAR_CACHE",
      "data": {
        "success": false,
        "content": "failure - see log for details"
      },
      "meta": {
        "execution_ms": 7
      }
    }
    "#);
}

#[test]
fn test_role_report_envelope_snapshot() {
    let report = RoleUpdateReport::failure("role not defined");
    let envelope = SuccessEnvelope::new("VDB", "roles", report, Metadata::new(40));

    let json_str = serde_json::to_string_pretty(&envelope).expect("Should serialize");
    insta::assert_snapshot!(json_str, @r#"
    {
      "ok": true,
      "component": "VDB",
      "command": "roles",
      "data": {
        "status": "failure",
        "errorMessage": "role not defined"
      },
      "meta": {
        "execution_ms": 40
      }
    }
    "#);
}

#[test]
fn test_error_envelope_snapshot() {
    let err = MonitorError::missing_parameter("vdbVersion");
    let envelope = ErrorEnvelope::from_error("VDB", "GET_SESSIONS", &err);

    let json_str = serde_json::to_string_pretty(&envelope).expect("Should serialize");
    insta::assert_snapshot!(json_str, @r#"
    {
      "ok": false,
      "component": "VDB",
      "command": "GET_SESSIONS",
      "error": {
        "code": "MISSING_PARAMETER",
        "message": "Missing required parameter: vdbVersion"
      }
    }
    "#);
}

#[test]
fn test_rows_envelope_reports_row_count() {
    let rows = vec![
        json!({"session-id": "a"}).as_object().cloned().unwrap(),
        json!({"session-id": "b"}).as_object().cloned().unwrap(),
    ];
    let outcome = OperationOutcome::rows(rows);
    let meta = Metadata::with_rows(5, outcome.row_count().unwrap());
    let envelope = SuccessEnvelope::new("Platform", "GET_SESSIONS", outcome, meta);

    let value = serde_json::to_value(&envelope).expect("Should serialize");
    assert_eq!(
        value["meta"],
        json!({"execution_ms": 5, "rows_returned": 2})
    );
    assert_eq!(value["data"]["content"][1], json!({"session-id": "b"}));
}
