//! Operation Catalog
//!
//! Static mapping from `(component type, metric or operation name)` to the
//! plan that serves it: which remote operation to invoke, which parameters
//! are mandatory, and what shape the answer has. The catalog does no I/O.
//!
//! The console-facing names (`SESSION_COUNT`, `CLEAR_CACHE`, ...) and the
//! remote operation names (`list-sessions`, `clear-cache`, ...) are wire
//! contracts and must not change.
//!
//! # Dotted Metrics
//! Metric names of the form `<group>.<property>` select a statistics group
//! (`PREPARED_PLAN_CACHE`, `QUERY_SERVICE_RESULT_SET_CACHE`,
//! `ENGINE_STATISTIC`). The prefix decides the remote call, the suffix names
//! the field to extract from the returned map. Only the first `.` splits.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{MonitorError, Result};
use crate::normalize::ResultShape;
use crate::params::{keys, ParamSpec};

/// Remote operation names
pub mod remote {
    pub const LIST_SESSIONS: &str = "list-sessions";
    pub const LIST_REQUESTS: &str = "list-requests";
    pub const LIST_REQUESTS_PER_VDB: &str = "list-requests-per-vdb";
    pub const LIST_LONG_RUNNING_REQUESTS: &str = "list-long-running-requests";
    pub const LIST_TRANSACTIONS: &str = "list-transactions";
    pub const TERMINATE_SESSION: &str = "terminate-session";
    pub const CANCEL_REQUEST: &str = "cancel-request";
    pub const TERMINATE_TRANSACTION: &str = "terminate-transaction";
    pub const CACHE_STATISTICS: &str = "cache-statistics";
    pub const ENGINE_STATISTICS: &str = "engine-statistics";
    pub const CLEAR_CACHE: &str = "clear-cache";
    pub const EXECUTE_QUERY: &str = "execute-query";
    pub const GET_VDB: &str = "get-vdb";
    pub const ADD: &str = "add";
    pub const READ_RESOURCE: &str = "read-resource";
    pub const ADD_ANY_AUTHENTICATED_ROLE: &str = "add-anyauthenticated-role";
    pub const REMOVE_ANY_AUTHENTICATED_ROLE: &str = "remove-anyauthenticated-role";
    pub const ADD_DATA_ROLE: &str = "add-data-role";
    pub const REMOVE_DATA_ROLE: &str = "remove-data-role";
}

/// Additional-property names understood by the remote operations
pub mod remote_params {
    pub const VDB_NAME: &str = "vdb-name";
    pub const VDB_VERSION: &str = "vdb-version";
    pub const SESSION: &str = "session";
    pub const EXECUTION_ID: &str = "execution-id";
    pub const XID: &str = "xid";
    pub const CACHE_TYPE: &str = "cache-type";
    pub const SQL_QUERY: &str = "sql-query";
    pub const TIMEOUT_IN_MILLI: &str = "timeout-in-milli";
    pub const DATA_ROLE: &str = "data-role";
    pub const MAPPED_ROLE: &str = "mapped-role";
    pub const CONTENT: &str = "content";
    pub const URL: &str = "url";
    pub const ENABLED: &str = "enabled";
}

/// Console-facing metric names
pub mod metrics {
    pub const QUERY_COUNT: &str = "QUERY_COUNT";
    pub const SESSION_COUNT: &str = "SESSION_COUNT";
    pub const LONG_RUNNING_QUERIES: &str = "LONG_RUNNING_QUERIES";
    pub const ERROR_COUNT: &str = "ERROR_COUNT";
    pub const STATUS: &str = "STATUS";
    pub const ENGINE_STATISTIC: &str = "ENGINE_STATISTIC";
}

/// Console-facing operation names
pub mod operations {
    pub const GET_SESSIONS: &str = "GET_SESSIONS";
    pub const GET_REQUESTS: &str = "GET_REQUESTS";
    pub const GET_TRANSACTIONS: &str = "GET_TRANSACTIONS";
    pub const GET_LONG_RUNNING_QUERIES: &str = "GET_LONG_RUNNING_QUERIES";
    pub const GET_MATVIEWS: &str = "GET_MATVIEWS";
    pub const KILL_SESSION: &str = "KILL_SESSION";
    pub const KILL_REQUEST: &str = "KILL_REQUEST";
    pub const KILL_TRANSACTION: &str = "KILL_TRANSACTION";
    pub const DEPLOY_VDB_BY_URL: &str = "DEPLOY_VDB_BY_URL";
    pub const CLEAR_CACHE: &str = "CLEAR_CACHE";
    pub const RELOAD_MATVIEW: &str = "RELOAD_MATVIEW";
}

/// Operation result contents reported to the console
pub mod content {
    pub const CACHE_CLEARED: &str = "cache successfully cleared!";
    pub const DATA_REFRESHED: &str = "data successfully refreshed!";
    pub const FAILURE: &str = "failure - see log for details";
}

/// Server-side timeout sent with engine queries; effectively unbounded
pub const QUERY_TIMEOUT_MILLIS: &str = "9999999";

/// Query listing the materialized views of a virtual database
pub const MAT_VIEW_QUERY: &str = "select SchemaName, Name, TargetSchemaName, TargetName, Valid, \
     LoadState, Updated, Cardinality from SYSADMIN.MatViews where SchemaName != 'pg_catalog'";

/// Columns of [`MAT_VIEW_QUERY`], in select order
pub const MAT_VIEW_COLUMNS: &[&str] = &[
    "SchemaName",
    "Name",
    "TargetSchemaName",
    "TargetName",
    "Valid",
    "LoadState",
    "Updated",
    "Cardinality",
];

/// Refresh procedure call; `param1` is the view, `param2` the invalidate flag
pub const MAT_VIEW_REFRESH: &str = "exec SYSADMIN.refreshMatView('param1', param2)";

/// Build the refresh statement for one materialized view
#[must_use]
pub fn refresh_query(schema: &str, table: &str, invalidate: bool) -> String {
    let view = format!("{schema}.{table}");
    MAT_VIEW_REFRESH
        .replace("param1", &view)
        .replace("param2", &invalidate.to_string())
}

/// Archive suffix of a packaged virtual database
pub const VDB_EXT: &str = ".vdb";

/// Suffix of a dynamic (descriptor-only) virtual database
pub const DYNAMIC_VDB_EXT: &str = "-vdb.xml";

/// Deployment name for a virtual database deployed by URL
///
/// A user-supplied `.vdb` suffix is dropped first; a version, when given, is
/// appended as `<name>.<version>.vdb`. Names without either recognized
/// suffix get `.vdb`.
#[must_use]
pub fn deployment_name(deploy_name: &str, version: Option<i64>) -> String {
    let mut name = deploy_name
        .strip_suffix(VDB_EXT)
        .unwrap_or(deploy_name)
        .to_string();
    if let Some(version) = version {
        name = format!("{name}.{version}{VDB_EXT}");
    }
    if !name.ends_with(VDB_EXT) && !name.ends_with(DYNAMIC_VDB_EXT) {
        name.push_str(VDB_EXT);
    }
    name
}

/// Component types the console asks about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentType {
    /// The engine as a whole
    Platform,
    /// One virtual database (scoped by name and version)
    #[serde(rename = "VDB")]
    Vdb,
}

impl ComponentType {
    /// Wire name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Platform => "Platform",
            Self::Vdb => "VDB",
        }
    }

    /// Look up a component type by wire name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Platform" => Some(Self::Platform),
            "VDB" => Some(Self::Vdb),
            _ => None,
        }
    }

    /// All component types
    pub const ALL: [Self; 2] = [Self::Platform, Self::Vdb];
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Engine caches with their own statistics and clear operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheType {
    #[serde(rename = "PREPARED_PLAN_CACHE")]
    PreparedPlan,
    #[serde(rename = "QUERY_SERVICE_RESULT_SET_CACHE")]
    ResultSet,
}

impl CacheType {
    /// Wire name, used both as metric group and as `cache-type` argument
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PreparedPlan => "PREPARED_PLAN_CACHE",
            Self::ResultSet => "QUERY_SERVICE_RESULT_SET_CACHE",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "PREPARED_PLAN_CACHE" => Some(Self::PreparedPlan),
            "QUERY_SERVICE_RESULT_SET_CACHE" => Some(Self::ResultSet),
            _ => None,
        }
    }
}

/// Field names read from engine records
///
/// Built once (defaults or a target's overrides) and passed by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldNames {
    /// Virtual-database name on session and request rows
    pub vdb_name: String,
    /// Session identifier on session and request rows
    pub session_id: String,
    /// Status entry of the VDB map
    pub status: String,
    /// Model list of the VDB map
    pub models: String,
    /// Validation error list of a model
    pub validity_errors: String,
    /// Data policy list of the VDB map
    pub data_policies: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            vdb_name: "vdb-name".to_string(),
            session_id: "session-id".to_string(),
            status: "status".to_string(),
            models: "models".to_string(),
            validity_errors: "validity-errors".to_string(),
            data_policies: "data-policies".to_string(),
        }
    }
}

/// What a metric computes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricKind {
    QueryCount,
    SessionCount,
    LongRunningQueries,
    ErrorCount,
    Status,
    CacheStatistic { cache: CacheType, property: String },
    EngineStatistic { property: String },
}

/// Resolved plan for one metric read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricPlan {
    pub component: ComponentType,
    pub kind: MetricKind,
    pub remote_operation: &'static str,
    pub shape: ResultShape,
    /// Requires a virtual-database scope
    pub scoped: bool,
}

/// What an operation does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    ListSessions,
    ListRequests,
    ListTransactions,
    ListLongRunningQueries,
    ListMaterializedViews,
    KillSession,
    KillRequest,
    KillTransaction,
    DeployVdbByUrl,
    ClearCache,
    ReloadMaterializedView,
}

/// Reporting operations return rows; administrative ones change engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationClass {
    Reporting,
    Administrative,
}

/// Resolved plan for one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationPlan {
    pub component: ComponentType,
    pub name: &'static str,
    pub kind: OperationKind,
    pub class: OperationClass,
    pub remote_operation: &'static str,
    pub required: &'static [ParamSpec],
    pub shape: ResultShape,
    /// Fixed content reported when an administrative call succeeds;
    /// `None` reports the remote value instead
    pub success_content: Option<&'static str>,
}

impl OperationPlan {
    /// Whether the plan is bound to one virtual database
    #[must_use]
    pub fn scoped(&self) -> bool {
        self.component == ComponentType::Vdb
    }
}

const VDB_SCOPE: [ParamSpec; 2] = [
    ParamSpec::text(keys::VDB_NAME),
    ParamSpec::text(keys::VDB_VERSION),
];

/// Immutable metric and operation lookup table
#[derive(Debug, Clone)]
pub struct Catalog {
    metrics: HashMap<ComponentType, BTreeMap<&'static str, MetricPlan>>,
    operations: HashMap<ComponentType, BTreeMap<&'static str, OperationPlan>>,
    fields: FieldNames,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl Catalog {
    /// Catalog with the default record field names
    #[must_use]
    pub fn standard() -> Self {
        Self::with_fields(FieldNames::default())
    }

    /// Catalog reading records with the given field names
    #[must_use]
    pub fn with_fields(fields: FieldNames) -> Self {
        let mut catalog = Self {
            metrics: HashMap::new(),
            operations: HashMap::new(),
            fields,
        };
        catalog.register_metrics();
        catalog.register_operations();
        catalog
    }

    /// Record field names in use
    #[must_use]
    pub const fn fields(&self) -> &FieldNames {
        &self.fields
    }

    fn metric(
        &mut self,
        component: ComponentType,
        name: &'static str,
        kind: MetricKind,
        remote_operation: &'static str,
        shape: ResultShape,
    ) {
        let plan = MetricPlan {
            component,
            kind,
            remote_operation,
            shape,
            scoped: component == ComponentType::Vdb,
        };
        self.metrics
            .entry(component)
            .or_default()
            .insert(name, plan);
    }

    fn register_metrics(&mut self) {
        use ComponentType::{Platform, Vdb};
        use MetricKind::{ErrorCount, LongRunningQueries, QueryCount, SessionCount, Status};
        use ResultShape::{FieldMap, RowList};

        self.metric(
            Platform,
            metrics::QUERY_COUNT,
            QueryCount,
            remote::LIST_REQUESTS,
            RowList,
        );
        self.metric(
            Platform,
            metrics::SESSION_COUNT,
            SessionCount,
            remote::LIST_SESSIONS,
            RowList,
        );
        self.metric(
            Platform,
            metrics::LONG_RUNNING_QUERIES,
            LongRunningQueries,
            remote::LIST_LONG_RUNNING_REQUESTS,
            RowList,
        );

        self.metric(
            Vdb,
            metrics::QUERY_COUNT,
            QueryCount,
            remote::LIST_REQUESTS_PER_VDB,
            RowList,
        );
        self.metric(
            Vdb,
            metrics::SESSION_COUNT,
            SessionCount,
            remote::LIST_SESSIONS,
            RowList,
        );
        self.metric(
            Vdb,
            metrics::LONG_RUNNING_QUERIES,
            LongRunningQueries,
            remote::LIST_LONG_RUNNING_REQUESTS,
            RowList,
        );
        self.metric(
            Vdb,
            metrics::ERROR_COUNT,
            ErrorCount,
            remote::GET_VDB,
            FieldMap,
        );
        self.metric(Vdb, metrics::STATUS, Status, remote::GET_VDB, FieldMap);
    }

    /// Register a row-listing operation
    fn reporting(
        &mut self,
        component: ComponentType,
        name: &'static str,
        kind: OperationKind,
        remote_operation: &'static str,
        required: &'static [ParamSpec],
    ) {
        let plan = OperationPlan {
            component,
            name,
            kind,
            class: OperationClass::Reporting,
            remote_operation,
            required,
            shape: ResultShape::RowList,
            success_content: None,
        };
        self.operations
            .entry(component)
            .or_default()
            .insert(name, plan);
    }

    /// Register a state-changing operation
    fn administrative(
        &mut self,
        component: ComponentType,
        name: &'static str,
        kind: OperationKind,
        remote_operation: &'static str,
        required: &'static [ParamSpec],
        success_content: Option<&'static str>,
    ) {
        let plan = OperationPlan {
            component,
            name,
            kind,
            class: OperationClass::Administrative,
            remote_operation,
            required,
            shape: ResultShape::Scalar,
            success_content,
        };
        self.operations
            .entry(component)
            .or_default()
            .insert(name, plan);
    }

    fn register_operations(&mut self) {
        use ComponentType::{Platform, Vdb};
        use OperationKind::*;

        const KILL_SESSION: &[ParamSpec] = &[ParamSpec::text(keys::SESSION_ID)];
        const KILL_REQUEST: &[ParamSpec] = &[
            ParamSpec::long(keys::REQUEST_ID),
            ParamSpec::text(keys::SESSION_ID),
        ];
        const KILL_TRANSACTION: &[ParamSpec] = &[ParamSpec::text(keys::TRANSACTION_ID)];
        const DEPLOY: &[ParamSpec] = &[
            ParamSpec::text(keys::VDB_URL),
            ParamSpec::text(keys::VDB_DEPLOY_NAME),
        ];
        const CLEAR_CACHE: &[ParamSpec] = &[
            VDB_SCOPE[0],
            VDB_SCOPE[1],
            ParamSpec::text(keys::CACHE_TYPE),
        ];
        const RELOAD: &[ParamSpec] = &[
            VDB_SCOPE[0],
            VDB_SCOPE[1],
            ParamSpec::text(keys::MATVIEW_SCHEMA),
            ParamSpec::text(keys::MATVIEW_TABLE),
            ParamSpec::flag(keys::INVALIDATE_MATVIEW),
        ];

        self.reporting(
            Platform,
            operations::GET_SESSIONS,
            ListSessions,
            remote::LIST_SESSIONS,
            &[],
        );
        self.reporting(
            Platform,
            operations::GET_REQUESTS,
            ListRequests,
            remote::LIST_REQUESTS,
            &[],
        );
        self.reporting(
            Platform,
            operations::GET_TRANSACTIONS,
            ListTransactions,
            remote::LIST_TRANSACTIONS,
            &[],
        );
        self.reporting(
            Platform,
            operations::GET_LONG_RUNNING_QUERIES,
            ListLongRunningQueries,
            remote::LIST_LONG_RUNNING_REQUESTS,
            &[],
        );
        self.administrative(
            Platform,
            operations::KILL_SESSION,
            KillSession,
            remote::TERMINATE_SESSION,
            KILL_SESSION,
            None,
        );
        self.administrative(
            Platform,
            operations::KILL_REQUEST,
            KillRequest,
            remote::CANCEL_REQUEST,
            KILL_REQUEST,
            None,
        );
        self.administrative(
            Platform,
            operations::KILL_TRANSACTION,
            KillTransaction,
            remote::TERMINATE_TRANSACTION,
            KILL_TRANSACTION,
            None,
        );
        self.administrative(
            Platform,
            operations::DEPLOY_VDB_BY_URL,
            DeployVdbByUrl,
            remote::ADD,
            DEPLOY,
            None,
        );

        self.reporting(
            Vdb,
            operations::GET_SESSIONS,
            ListSessions,
            remote::LIST_SESSIONS,
            &VDB_SCOPE,
        );
        self.reporting(
            Vdb,
            operations::GET_REQUESTS,
            ListRequests,
            remote::LIST_REQUESTS_PER_VDB,
            &VDB_SCOPE,
        );
        self.reporting(
            Vdb,
            operations::GET_MATVIEWS,
            ListMaterializedViews,
            remote::EXECUTE_QUERY,
            &VDB_SCOPE,
        );
        self.administrative(
            Vdb,
            operations::CLEAR_CACHE,
            ClearCache,
            remote::CLEAR_CACHE,
            CLEAR_CACHE,
            Some(content::CACHE_CLEARED),
        );
        self.administrative(
            Vdb,
            operations::RELOAD_MATVIEW,
            ReloadMaterializedView,
            remote::EXECUTE_QUERY,
            RELOAD,
            Some(content::DATA_REFRESHED),
        );
    }

    /// Resolve a metric plan
    ///
    /// Fails with `UnknownMetric` for an unknown component type, an unknown
    /// flat name, or an unknown dotted group.
    pub fn resolve_metric(&self, component: &str, metric: &str) -> Result<MetricPlan> {
        let unknown = || MonitorError::unknown_metric(component, metric);
        let component_type = ComponentType::from_name(component).ok_or_else(unknown)?;

        if let Some((group, property)) = metric.split_once('.') {
            if component_type != ComponentType::Platform || property.is_empty() {
                return Err(unknown());
            }
            let property = property.to_string();
            let (kind, remote_operation) = if group == metrics::ENGINE_STATISTIC {
                (
                    MetricKind::EngineStatistic { property },
                    remote::ENGINE_STATISTICS,
                )
            } else if let Some(cache) = CacheType::from_name(group) {
                (
                    MetricKind::CacheStatistic { cache, property },
                    remote::CACHE_STATISTICS,
                )
            } else {
                return Err(unknown());
            };
            return Ok(MetricPlan {
                component: component_type,
                kind,
                remote_operation,
                shape: ResultShape::FieldMap,
                scoped: false,
            });
        }

        self.metrics
            .get(&component_type)
            .and_then(|plans| plans.get(metric))
            .cloned()
            .ok_or_else(unknown)
    }

    /// Resolve an operation plan
    pub fn resolve_operation(&self, component: &str, operation: &str) -> Result<&OperationPlan> {
        ComponentType::from_name(component)
            .and_then(|component_type| self.operations.get(&component_type))
            .and_then(|plans| plans.get(operation))
            .ok_or_else(|| MonitorError::unknown_operation(component, operation))
    }

    /// Flat metric names for a component type, sorted
    #[must_use]
    pub fn metric_names(&self, component: ComponentType) -> Vec<&'static str> {
        self.metrics
            .get(&component)
            .map(|plans| plans.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Operation plans for a component type, sorted by name
    pub fn operation_plans(
        &self,
        component: ComponentType,
    ) -> impl Iterator<Item = &OperationPlan> {
        self.operations
            .get(&component)
            .into_iter()
            .flat_map(BTreeMap::values)
    }
}
