//! Metric and Operation Dispatch
//!
//! The [`Dispatcher`] is the entry point consoles call into. It resolves a
//! plan from the [`Catalog`], validates parameters, awaits the remote calls
//! the plan needs (sequentially, never retried), normalizes the answers and
//! applies scoped aggregation.
//!
//! - [`metric`] - `get_metric`, returning a [`MetricValue`]
//! - [`operation`] - `execute_operation`, returning an [`OperationOutcome`]
//!
//! Every dispatch call is independent: the dispatcher only borrows the
//! client and the catalog and keeps no state between calls.

use crate::catalog::{remote, remote_params, Catalog};
use crate::client::{ManagementAddress, ManagementClient, ManagementRequest, ManagementResult, Row};
use crate::error::{MonitorError, Result};
use crate::normalize::{normalize, Normalized, ResultShape};
use crate::params::{ParameterBag, ScopeFilter};
use crate::scope::ScopedAggregator;

pub mod metric;
pub mod operation;

pub use metric::MetricValue;
pub use operation::{OperationContent, OperationOutcome};

/// Request against the engine subsystem
pub(crate) fn engine_request(operation: &str) -> ManagementRequest {
    ManagementRequest::new(operation, ManagementAddress::teiid())
}

/// Turn a failed outcome into `RemoteCallFailed`
pub(crate) fn require_success(
    operation: &str,
    result: ManagementResult,
) -> Result<ManagementResult> {
    if result.is_success() {
        Ok(result)
    } else {
        let description = result.failure_description().unwrap_or_default();
        Err(MonitorError::remote_call_failed(operation, description))
    }
}

/// Scope from an explicit key, or from `vdbName`/`vdbVersion` parameters
pub(crate) fn resolve_scope(
    scope: Option<&ScopeFilter>,
    params: &ParameterBag,
) -> Result<ScopeFilter> {
    match scope {
        Some(scope) => Ok(scope.clone()),
        None => ScopeFilter::from_params(params),
    }
}

/// Routes console requests to the remote engine
#[derive(Debug)]
pub struct Dispatcher<'a, C> {
    client: &'a C,
    catalog: &'a Catalog,
}

impl<'a, C> Clone for Dispatcher<'a, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, C> Copy for Dispatcher<'a, C> {}

impl<'a, C: ManagementClient> Dispatcher<'a, C> {
    #[must_use]
    pub const fn new(client: &'a C, catalog: &'a Catalog) -> Self {
        Self { client, catalog }
    }

    #[must_use]
    pub const fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    #[must_use]
    pub const fn client(&self) -> &'a C {
        self.client
    }

    #[must_use]
    pub fn aggregator(&self) -> ScopedAggregator<'a> {
        ScopedAggregator::new(self.catalog.fields())
    }

    /// Issue one request
    ///
    /// `Err` only when no result could be obtained. An engine-side failure
    /// is logged here and returned as a failed result.
    pub async fn invoke(&self, request: &ManagementRequest) -> Result<ManagementResult> {
        tracing::debug!(
            operation = %request.operation,
            address = %request.address,
            "Invoking remote operation"
        );
        let result = self.client.execute(request).await?;
        if !result.is_success() {
            tracing::warn!(
                operation = %request.operation,
                failure = result.failure_description().unwrap_or_default(),
                "Remote operation failed"
            );
        }
        Ok(result)
    }

    /// Issue one request, require success and normalize the value
    pub async fn fetch(
        &self,
        request: &ManagementRequest,
        shape: ResultShape,
    ) -> Result<Normalized> {
        let result = require_success(&request.operation, self.invoke(request).await?)?;
        normalize(&request.operation, result.into_value(), shape)
    }

    pub async fn fetch_rows(&self, request: &ManagementRequest) -> Result<Vec<Row>> {
        let normalized = self.fetch(request, ResultShape::RowList).await?;
        Ok(normalized.into_rows().unwrap_or_default())
    }

    pub async fn fetch_fields(&self, request: &ManagementRequest) -> Result<Row> {
        let normalized = self.fetch(request, ResultShape::FieldMap).await?;
        Ok(normalized.into_fields().unwrap_or_default())
    }

    /// Sessions of one virtual database (direct name match only)
    pub async fn scoped_sessions(&self, scope: &ScopeFilter) -> Result<Vec<Row>> {
        let request = engine_request(remote::LIST_SESSIONS);
        let sessions = self.fetch_rows(&request).await?;
        Ok(self.aggregator().filter_by_scope(&sessions, scope))
    }

    /// Count engine-wide rows belonging to `scope`
    ///
    /// The scope's session list is fetched once, and only when some row can
    /// only be attributed through its session.
    pub async fn count_in_scope(&self, rows: &[Row], scope: &ScopeFilter) -> Result<usize> {
        let aggregator = self.aggregator();
        let sessions = if aggregator.needs_session_correlation(rows) {
            self.scoped_sessions(scope).await?
        } else {
            Vec::new()
        };
        Ok(aggregator.count_by_scope(rows, scope, &sessions))
    }

    /// The engine's description of one virtual database
    pub async fn vdb_map(&self, scope: &ScopeFilter) -> Result<Row> {
        let request = engine_request(remote::GET_VDB)
            .with(remote_params::VDB_NAME, scope.vdb_name.as_str())
            .with(remote_params::VDB_VERSION, scope.version_number()?);
        self.fetch_fields(&request).await
    }
}
