//! Console Bridge
//!
//! JSON-RPC 2.0 over stdio, one request per line and one response per line.
//! Consoles that embed the adapter out of process talk to it through this
//! bridge instead of the CLI.
//!
//! # Methods
//!
//! - `initialize` - server info plus the metric and operation catalog
//! - `getMetric` - `{componentType, metricName, vdbName?, vdbVersion?, params?}`
//! - `executeOperation` - `{componentType, operationName, params?}`
//!
//! Adapter errors become JSON-RPC errors whose `data.code` carries the
//! stable error code (`UNKNOWN_METRIC`, `REMOTE_CALL_FAILED`, ...).
//!
//! # Usage
//!
//! ```text
//! $ teiid-monitor --responses fixtures/recorded.json serve
//! {"jsonrpc":"2.0","id":1,"method":"getMetric","params":{"componentType":"Platform","metricName":"SESSION_COUNT"}}
//! {"jsonrpc":"2.0","id":1,"result":{"value":3}}
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::io::{self, BufRead, Write};

use crate::catalog::{Catalog, ComponentType};
use crate::client::ManagementClient;
use crate::dispatch::Dispatcher;
use crate::error::MonitorError;
use crate::params::{keys, ParameterBag, ScopeFilter};

const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;

/// JSON-RPC 2.0 Request
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    params: Option<Value>,
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn result(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl From<&MonitorError> for JsonRpcError {
    fn from(err: &MonitorError) -> Self {
        let code = if err.is_caller_error() {
            INVALID_PARAMS
        } else {
            INTERNAL_ERROR
        };
        Self {
            code,
            message: err.message(),
            data: Some(json!({ "code": err.error_code() })),
        }
    }
}

impl JsonRpcError {
    fn new(code: i32, message: String) -> Self {
        Self {
            code,
            message,
            data: None,
        }
    }
}

/// Failure of one bridge call
enum CallError {
    UnknownMethod(String),
    Monitor(MonitorError),
}

impl From<MonitorError> for CallError {
    fn from(err: MonitorError) -> Self {
        Self::Monitor(err)
    }
}

/// Serve requests from stdin until it closes
///
/// # Errors
///
/// Returns an error if stdio communication fails.
#[allow(clippy::future_not_send)]
pub async fn serve<C: ManagementClient>(client: &C, catalog: &Catalog) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve_lines(client, catalog, stdin.lock(), stdout.lock()).await
}

/// Serve line-delimited requests from `reader`, answering on `writer`
///
/// # Errors
///
/// Returns an error if reading or writing fails.
#[allow(clippy::future_not_send)]
pub async fn serve_lines<C, R, W>(
    client: &C,
    catalog: &Catalog,
    reader: R,
    mut writer: W,
) -> Result<()>
where
    C: ManagementClient,
    R: BufRead,
    W: Write,
{
    let dispatcher = Dispatcher::new(client, catalog);

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
            Ok(request) => handle_request(&dispatcher, request).await,
            Err(e) => {
                tracing::debug!(error = %e, "Unparseable bridge request");
                let error = JsonRpcError::new(PARSE_ERROR, format!("Parse error: {e}"));
                JsonRpcResponse::error(None, error)
            }
        };

        writeln!(writer, "{}", serde_json::to_string(&response)?)?;
        writer.flush()?;
    }

    Ok(())
}

async fn handle_request<C: ManagementClient>(
    dispatcher: &Dispatcher<'_, C>,
    request: JsonRpcRequest,
) -> JsonRpcResponse {
    tracing::debug!(method = %request.method, "Bridge request");
    let params = request.params.unwrap_or(Value::Null);

    let result = match request.method.as_str() {
        "initialize" => Ok(handle_initialize(dispatcher.catalog())),
        "getMetric" => handle_get_metric(dispatcher, &params).await,
        "executeOperation" => handle_execute_operation(dispatcher, &params).await,
        other => Err(CallError::UnknownMethod(other.to_string())),
    };

    match result {
        Ok(value) => JsonRpcResponse::result(request.id, value),
        Err(CallError::UnknownMethod(method)) => {
            let error = JsonRpcError::new(METHOD_NOT_FOUND, format!("Unknown method: {method}"));
            JsonRpcResponse::error(request.id, error)
        }
        Err(CallError::Monitor(err)) => {
            JsonRpcResponse::error(request.id, JsonRpcError::from(&err))
        }
    }
}

fn handle_initialize(catalog: &Catalog) -> Value {
    let components: Map<String, Value> = ComponentType::ALL
        .iter()
        .map(|component| {
            let operations: Vec<Value> = catalog
                .operation_plans(*component)
                .map(|plan| {
                    json!({
                        "name": plan.name,
                        "class": plan.class,
                        "required": plan
                            .required
                            .iter()
                            .map(|spec| spec.key)
                            .collect::<Vec<_>>(),
                    })
                })
                .collect();
            let entry = json!({
                "metrics": catalog.metric_names(*component),
                "operations": operations
            });
            (component.as_str().to_string(), entry)
        })
        .collect();

    json!({
        "serverInfo": {
            "name": "teiid-monitor",
            "version": env!("CARGO_PKG_VERSION")
        },
        "components": components
    })
}

fn required_text<'v>(params: &'v Value, key: &str) -> Result<&'v str, MonitorError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| MonitorError::missing_parameter(key))
}

fn parameter_bag(params: &Value) -> Result<ParameterBag, MonitorError> {
    match params.get("params") {
        None | Some(Value::Null) => Ok(ParameterBag::new()),
        Some(Value::Object(map)) => Ok(ParameterBag::from(map.clone())),
        Some(_) => Err(MonitorError::invalid_parameter(
            "params",
            "expected an object",
        )),
    }
}

/// `vdbName`/`vdbVersion` given next to the metric name
///
/// Either key alone is an error naming the other; numeric versions are
/// accepted.
fn top_level_scope(params: &Value) -> Result<Option<ScopeFilter>, MonitorError> {
    let top_level = match params {
        Value::Object(map) => ParameterBag::from(map.clone()),
        _ => ParameterBag::new(),
    };
    if top_level.contains(keys::VDB_NAME) || top_level.contains(keys::VDB_VERSION) {
        ScopeFilter::from_params(&top_level).map(Some)
    } else {
        Ok(None)
    }
}

async fn handle_get_metric<C: ManagementClient>(
    dispatcher: &Dispatcher<'_, C>,
    params: &Value,
) -> Result<Value, CallError> {
    let component = required_text(params, "componentType")?;
    let metric = required_text(params, "metricName")?;
    let bag = parameter_bag(params)?;

    let scope = top_level_scope(params)?;

    let value = dispatcher
        .get_metric(component, scope.as_ref(), metric, &bag)
        .await?;
    Ok(json!({ "value": value }))
}

async fn handle_execute_operation<C: ManagementClient>(
    dispatcher: &Dispatcher<'_, C>,
    params: &Value,
) -> Result<Value, CallError> {
    let component = required_text(params, "componentType")?;
    let operation = required_text(params, "operationName")?;
    let bag = parameter_bag(params)?;

    let outcome = dispatcher
        .execute_operation(component, operation, &bag)
        .await?;
    serde_json::to_value(outcome)
        .map_err(|e| MonitorError::malformed_result(operation, e.to_string()).into())
}
