//! Metric reads
//!
//! Counts are row-list sizes. Scoped counts over engine-wide listings go
//! through the scoped aggregator. `STATUS` and `ERROR_COUNT` read the VDB
//! map; dotted statistics read one field of a statistics map.

use serde::Serialize;
use serde_json::Value;

use super::{engine_request, resolve_scope, Dispatcher};
use crate::catalog::{remote_params, MetricKind};
use crate::client::{ManagementClient, Row};
use crate::error::{MonitorError, Result};
use crate::params::{ParameterBag, ScopeFilter};

/// Value of one metric read
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Number of rows
    Count(usize),
    /// Numeric statistic
    Number(f64),
    /// Textual value such as a status
    Text(String),
    /// The engine reported no value
    Absent,
}

impl MetricValue {
    /// Classify a value read from a field map
    #[must_use]
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Absent,
            Some(Value::Number(n)) => n.as_f64().map_or(Self::Absent, Self::Number),
            Some(Value::String(s)) => Self::Text(s.clone()),
            Some(other) => Self::Text(other.to_string()),
        }
    }

    /// Numeric reading; numeric text is parsed
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Count(count) => Some(*count as f64),
            Self::Number(number) => Some(*number),
            Self::Text(text) => text.trim().parse().ok(),
            Self::Absent => None,
        }
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Count(count) => write!(f, "{count}"),
            Self::Number(number) => write!(f, "{number}"),
            Self::Text(text) => write!(f, "{text}"),
            Self::Absent => write!(f, "null"),
        }
    }
}

impl<'a, C: ManagementClient> Dispatcher<'a, C> {
    /// Read one metric
    ///
    /// Scoped metrics take their scope from `scope`, or else from the
    /// `vdbName`/`vdbVersion` parameters. Unknown metrics and missing scope
    /// parameters fail before any remote call.
    pub async fn get_metric(
        &self,
        component: &str,
        scope: Option<&ScopeFilter>,
        metric: &str,
        params: &ParameterBag,
    ) -> Result<MetricValue> {
        let plan = self.catalog().resolve_metric(component, metric)?;
        let scope = if plan.scoped {
            Some(resolve_scope(scope, params)?)
        } else {
            None
        };

        tracing::debug!(
            component,
            metric,
            scope = ?scope.as_ref().map(ToString::to_string),
            "Reading metric"
        );

        let request = engine_request(plan.remote_operation);
        match (&plan.kind, scope.as_ref()) {
            (MetricKind::QueryCount | MetricKind::SessionCount, None)
            | (MetricKind::LongRunningQueries, None) => {
                Ok(MetricValue::Count(self.fetch_rows(&request).await?.len()))
            }
            (MetricKind::QueryCount, Some(scope)) => {
                let request = request
                    .with(remote_params::VDB_NAME, scope.vdb_name.as_str())
                    .with(remote_params::VDB_VERSION, scope.vdb_version.as_str());
                Ok(MetricValue::Count(self.fetch_rows(&request).await?.len()))
            }
            (MetricKind::SessionCount | MetricKind::LongRunningQueries, Some(scope)) => {
                let rows = self.fetch_rows(&request).await?;
                Ok(MetricValue::Count(self.count_in_scope(&rows, scope).await?))
            }
            (MetricKind::Status, Some(scope)) => {
                let vdb = self.vdb_map(scope).await?;
                let status = vdb.get(&self.catalog().fields().status);
                Ok(MetricValue::from_value(status))
            }
            (MetricKind::ErrorCount, Some(scope)) => {
                let vdb = self.vdb_map(scope).await?;
                let errors = self.validity_error_count(plan.remote_operation, &vdb)?;
                Ok(MetricValue::Count(errors))
            }
            (MetricKind::CacheStatistic { cache, property }, _) => {
                let request = request.with(remote_params::CACHE_TYPE, cache.as_str());
                let stats = self.fetch_fields(&request).await?;
                Ok(MetricValue::from_value(stats.get(property)))
            }
            (MetricKind::EngineStatistic { property }, _) => {
                let stats = self.fetch_fields(&request).await?;
                Ok(MetricValue::from_value(stats.get(property)))
            }
            // the catalog marks these scoped, so a scope is always resolved
            (MetricKind::Status | MetricKind::ErrorCount, None) => {
                Err(MonitorError::unknown_metric(component, metric))
            }
        }
    }

    /// Sum of validation errors over all models of a VDB map
    fn validity_error_count(&self, operation: &str, vdb: &Row) -> Result<usize> {
        let fields = self.catalog().fields();
        let models = match vdb.get(&fields.models) {
            None | Some(Value::Null) => return Ok(0),
            Some(Value::Array(models)) => models,
            Some(other) => {
                return Err(MonitorError::malformed_result(
                    operation,
                    format!("'{}' is not a list: {other}", fields.models),
                ))
            }
        };

        let mut count = 0;
        for model in models {
            match model.get(&fields.validity_errors) {
                None | Some(Value::Null) => {}
                Some(Value::Array(errors)) => count += errors.len(),
                Some(other) => {
                    return Err(MonitorError::malformed_result(
                        operation,
                        format!("'{}' is not a list: {other}", fields.validity_errors),
                    ))
                }
            }
        }
        Ok(count)
    }
}
