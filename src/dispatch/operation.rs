//! Operation execution
//!
//! Reporting operations return rows; a failed remote call is an error.
//! Administrative operations are issued once and always yield an outcome:
//! a failed remote call becomes the fixed failure content, with the engine's
//! description left in the log.

use serde::Serialize;
use serde_json::{json, Value};

use super::{engine_request, require_success, Dispatcher};
use crate::catalog::{
    content, deployment_name, refresh_query, remote_params, CacheType, OperationClass,
    OperationKind, OperationPlan, MAT_VIEW_COLUMNS, MAT_VIEW_QUERY, QUERY_TIMEOUT_MILLIS,
};
use crate::client::{
    ManagementAddress, ManagementClient, ManagementRequest, ManagementResult, RawValue, Row,
};
use crate::error::{MonitorError, Result};
use crate::normalize::rows_from_columns;
use crate::params::{keys, ParameterBag, ScopeFilter};

/// Content returned to the console
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperationContent {
    Message(String),
    Rows(Vec<Row>),
    Value(Value),
}

/// Result of one operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationOutcome {
    pub success: bool,
    pub content: OperationContent,
}

impl OperationOutcome {
    #[must_use]
    pub fn rows(rows: Vec<Row>) -> Self {
        Self {
            success: true,
            content: OperationContent::Rows(rows),
        }
    }

    #[must_use]
    pub fn failed() -> Self {
        Self {
            success: false,
            content: OperationContent::Message(content::FAILURE.to_string()),
        }
    }

    /// Number of rows for reporting outcomes
    #[must_use]
    pub fn row_count(&self) -> Option<usize> {
        match &self.content {
            OperationContent::Rows(rows) => Some(rows.len()),
            _ => None,
        }
    }
}

impl<'a, C: ManagementClient> Dispatcher<'a, C> {
    /// Execute one operation
    ///
    /// Required parameters are checked before any remote call. Virtual
    /// database names are passed through [`crate::params::format_vdb_name`].
    pub async fn execute_operation(
        &self,
        component: &str,
        operation: &str,
        params: &ParameterBag,
    ) -> Result<OperationOutcome> {
        let plan = self.catalog().resolve_operation(component, operation)?;
        for spec in plan.required {
            params.require(spec)?;
        }
        let scope = if plan.scoped() {
            Some(ScopeFilter::from_params(params)?.with_formatted_name())
        } else {
            None
        };

        tracing::debug!(
            component,
            operation,
            scope = ?scope.as_ref().map(ToString::to_string),
            "Executing operation"
        );

        match plan.class {
            OperationClass::Reporting => {
                let rows = self.report(plan, scope.as_ref()).await?;
                Ok(OperationOutcome::rows(rows))
            }
            OperationClass::Administrative => {
                let request = administrative_request(plan, params, scope.as_ref())?;
                let result = self.invoke(&request).await?;
                Ok(administrative_outcome(plan, result))
            }
        }
    }

    async fn report(&self, plan: &OperationPlan, scope: Option<&ScopeFilter>) -> Result<Vec<Row>> {
        let request = engine_request(plan.remote_operation);
        match (plan.kind, scope) {
            (OperationKind::ListSessions, Some(scope)) => self.scoped_sessions(scope).await,
            (OperationKind::ListRequests, Some(scope)) => {
                let request = request
                    .with(remote_params::VDB_NAME, scope.vdb_name.as_str())
                    .with(remote_params::VDB_VERSION, scope.vdb_version.as_str());
                self.fetch_rows(&request).await
            }
            (OperationKind::ListMaterializedViews, Some(scope)) => {
                let request = request
                    .with(remote_params::VDB_NAME, scope.vdb_name.as_str())
                    .with(remote_params::VDB_VERSION, scope.vdb_version.as_str())
                    .with(remote_params::SQL_QUERY, MAT_VIEW_QUERY)
                    .with(remote_params::TIMEOUT_IN_MILLI, QUERY_TIMEOUT_MILLIS);
                let result = self.invoke(&request).await?;
                let result = require_success(&request.operation, result)?;
                match result.into_value() {
                    None => Ok(Vec::new()),
                    Some(raw) => {
                        rows_from_columns(&request.operation, MAT_VIEW_COLUMNS, raw.into_value())
                    }
                }
            }
            _ => self.fetch_rows(&request).await,
        }
    }
}

/// Build the single remote request of an administrative operation
fn administrative_request(
    plan: &OperationPlan,
    params: &ParameterBag,
    scope: Option<&ScopeFilter>,
) -> Result<ManagementRequest> {
    let request = engine_request(plan.remote_operation);
    let request = match plan.kind {
        OperationKind::KillSession => {
            request.with(remote_params::SESSION, params.text(keys::SESSION_ID)?)
        }
        OperationKind::KillRequest => request
            .with(remote_params::EXECUTION_ID, params.long(keys::REQUEST_ID)?)
            .with(remote_params::SESSION, params.text(keys::SESSION_ID)?),
        OperationKind::KillTransaction => {
            request.with(remote_params::XID, params.text(keys::TRANSACTION_ID)?)
        }
        OperationKind::DeployVdbByUrl => {
            let version = if params.contains(keys::VDB_VERSION) {
                Some(params.long(keys::VDB_VERSION)?)
            } else {
                None
            };
            let name = deployment_name(&params.text(keys::VDB_DEPLOY_NAME)?, version);
            let url = params.text(keys::VDB_URL)?;
            let address = ManagementAddress::deployment(&name);
            let content = json!([{ (remote_params::URL): url }]);
            ManagementRequest::new(plan.remote_operation, address)
                .with(remote_params::CONTENT, content)
                .with(remote_params::ENABLED, true)
        }
        OperationKind::ClearCache => {
            let scope = required_scope(scope)?;
            let cache_type = params.text(keys::CACHE_TYPE)?;
            let cache = CacheType::from_name(&cache_type).ok_or_else(|| {
                MonitorError::invalid_parameter(
                    keys::CACHE_TYPE,
                    format!("unknown cache type '{cache_type}'"),
                )
            })?;
            request
                .with(remote_params::CACHE_TYPE, cache.as_str())
                .with(remote_params::VDB_NAME, scope.vdb_name.as_str())
                .with(remote_params::VDB_VERSION, scope.version_number()?)
        }
        OperationKind::ReloadMaterializedView => {
            let scope = required_scope(scope)?;
            let query = refresh_query(
                &params.text(keys::MATVIEW_SCHEMA)?,
                &params.text(keys::MATVIEW_TABLE)?,
                params.flag(keys::INVALIDATE_MATVIEW)?,
            );
            request
                .with(remote_params::VDB_NAME, scope.vdb_name.as_str())
                .with(remote_params::VDB_VERSION, scope.version_number()?)
                .with(remote_params::SQL_QUERY, query)
                .with(remote_params::TIMEOUT_IN_MILLI, QUERY_TIMEOUT_MILLIS)
        }
        OperationKind::ListSessions
        | OperationKind::ListRequests
        | OperationKind::ListTransactions
        | OperationKind::ListLongRunningQueries
        | OperationKind::ListMaterializedViews => {
            return Err(MonitorError::unknown_operation(
                plan.component.as_str(),
                plan.name,
            ))
        }
    };
    Ok(request)
}

fn required_scope(scope: Option<&ScopeFilter>) -> Result<&ScopeFilter> {
    scope.ok_or_else(|| MonitorError::missing_parameter(keys::VDB_NAME))
}

fn administrative_outcome(plan: &OperationPlan, result: ManagementResult) -> OperationOutcome {
    if !result.is_success() {
        return OperationOutcome::failed();
    }
    let content = match plan.success_content {
        Some(message) => OperationContent::Message(message.to_string()),
        None => {
            let value = result
                .into_value()
                .map_or(Value::Null, RawValue::into_value);
            OperationContent::Value(value)
        }
    };
    OperationOutcome {
        success: true,
        content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::client::replay::ReplayClient;
    use pretty_assertions::assert_eq;

    fn reload_params(invalidate: Value) -> ParameterBag {
        ParameterBag::new()
            .with(keys::VDB_NAME, "Portfolio.vdb")
            .with(keys::VDB_VERSION, "1")
            .with(keys::MATVIEW_SCHEMA, "views")
            .with(keys::MATVIEW_TABLE, "orders")
            .with(keys::INVALIDATE_MATVIEW, invalidate)
    }

    #[tokio::test]
    async fn test_reload_matview_builds_refresh_query() {
        let refreshed = ManagementResult::success(json!([[1]]));
        let client = ReplayClient::new().respond("execute-query", refreshed);
        let catalog = Catalog::standard();
        let dispatcher = Dispatcher::new(&client, &catalog);
        let params = reload_params(json!(true));

        let outcome = dispatcher
            .execute_operation("VDB", "RELOAD_MATVIEW", &params)
            .await
            .unwrap();
        let message = OperationContent::Message("data successfully refreshed!".to_string());
        assert_eq!(outcome.content, message);

        let sent = &client.requests()[0];
        let query = "exec SYSADMIN.refreshMatView('views.orders', true)";
        assert_eq!(sent.params["vdb-name"], json!("Portfolio"));
        assert_eq!(sent.params["vdb-version"], json!(1));
        assert_eq!(sent.params["sql-query"], json!(query));
        assert_eq!(sent.params["timeout-in-milli"], json!("9999999"));
    }

    #[tokio::test]
    async fn test_reload_matview_requires_flag() {
        let client = ReplayClient::new();
        let catalog = Catalog::standard();
        let dispatcher = Dispatcher::new(&client, &catalog);
        let params = reload_params(json!("maybe"));

        let err = dispatcher
            .execute_operation("VDB", "RELOAD_MATVIEW", &params)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PARAMETER");
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_kill_request_sends_execution_id_and_session() {
        let cancelled = ManagementResult::success(json!(true));
        let client = ReplayClient::new().respond("cancel-request", cancelled);
        let catalog = Catalog::standard();
        let dispatcher = Dispatcher::new(&client, &catalog);
        let params = ParameterBag::new()
            .with(keys::REQUEST_ID, "42")
            .with(keys::SESSION_ID, "abc");

        let outcome = dispatcher
            .execute_operation("Platform", "KILL_REQUEST", &params)
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.content, OperationContent::Value(json!(true)));

        let sent = &client.requests()[0];
        let keys: Vec<&str> = sent.params.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["execution-id", "session"]);
        assert_eq!(sent.params["execution-id"], json!(42));
    }

    #[tokio::test]
    async fn test_deploy_by_url_targets_deployment_address() {
        let client = ReplayClient::new().respond("add", ManagementResult::empty());
        let catalog = Catalog::standard();
        let dispatcher = Dispatcher::new(&client, &catalog);
        let params = ParameterBag::new()
            .with(keys::VDB_URL, "file:///tmp/portfolio.vdb")
            .with(keys::VDB_DEPLOY_NAME, "portfolio.vdb")
            .with(keys::VDB_VERSION, 2);

        let outcome = dispatcher
            .execute_operation("Platform", "DEPLOY_VDB_BY_URL", &params)
            .await
            .unwrap();
        let deployed = OperationOutcome {
            success: true,
            content: OperationContent::Value(Value::Null),
        };
        assert_eq!(outcome, deployed);

        let sent = &client.requests()[0];
        let content = json!([{"url": "file:///tmp/portfolio.vdb"}]);
        let address = ManagementAddress::deployment("portfolio.2.vdb");
        assert_eq!(sent.address, address);
        assert_eq!(sent.params["content"], content);
        assert_eq!(sent.params["enabled"], json!(true));
    }

    #[tokio::test]
    async fn test_clear_cache_rejects_unknown_cache_type() {
        let client = ReplayClient::new();
        let catalog = Catalog::standard();
        let dispatcher = Dispatcher::new(&client, &catalog);
        let params = ParameterBag::new()
            .with(keys::VDB_NAME, "x")
            .with(keys::VDB_VERSION, "1")
            .with(keys::CACHE_TYPE, "EVERYTHING");

        let err = dispatcher
            .execute_operation("VDB", "CLEAR_CACHE", &params)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PARAMETER");
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_matviews_accepts_positional_rows() {
        let row = json!([
            "views",
            "orders",
            "mv",
            "orders_mv",
            true,
            "LOADED",
            "2024-01-01",
            10
        ]);
        let client = ReplayClient::new().respond(
            "execute-query",
            ManagementResult::success(json!([row])),
        );
        let catalog = Catalog::standard();
        let dispatcher = Dispatcher::new(&client, &catalog);
        let params = ParameterBag::new()
            .with(keys::VDB_NAME, "Portfolio")
            .with(keys::VDB_VERSION, "1");

        let outcome = dispatcher
            .execute_operation("VDB", "GET_MATVIEWS", &params)
            .await
            .unwrap();
        let OperationContent::Rows(rows) = outcome.content else {
            panic!("expected rows")
        };
        assert_eq!(rows[0]["Name"], json!("orders"));
        assert_eq!(rows[0]["LoadState"], json!("LOADED"));
        let sent = &client.requests()[0];
        assert_eq!(sent.params["sql-query"], json!(MAT_VIEW_QUERY));
    }

    #[test]
    fn test_outcome_serializes_content_bare() {
        let outcome = OperationOutcome::failed();
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"success": false, "content": "failure - see log for details"})
        );
    }
}
