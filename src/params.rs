//! Request Parameters
//!
//! The console hands every metric read and operation a string-keyed bag of
//! named arguments. The catalog decides which keys an operation requires and
//! of which kind; this module only knows how to read them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MonitorError, Result};

/// Parameter keys recognized by the catalog
pub mod keys {
    pub const REQUEST_ID: &str = "requestId";
    pub const SESSION_ID: &str = "sessionId";
    pub const TRANSACTION_ID: &str = "transactionId";
    pub const VDB_NAME: &str = "vdbName";
    pub const VDB_VERSION: &str = "vdbVersion";
    pub const VDB_URL: &str = "vdbUrl";
    pub const VDB_DEPLOY_NAME: &str = "vdbDeployName";
    pub const CACHE_TYPE: &str = "cacheType";
    pub const MATVIEW_SCHEMA: &str = "matviewSchema";
    pub const MATVIEW_TABLE: &str = "matviewTable";
    pub const INVALIDATE_MATVIEW: &str = "invalidateMatview";
}

/// Kind of value a parameter must carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    Long,
    Flag,
}

/// A required parameter of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub key: &'static str,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub const fn text(key: &'static str) -> Self {
        Self {
            key,
            kind: ParamKind::Text,
        }
    }

    pub const fn long(key: &'static str) -> Self {
        Self {
            key,
            kind: ParamKind::Long,
        }
    }

    pub const fn flag(key: &'static str) -> Self {
        Self {
            key,
            kind: ParamKind::Flag,
        }
    }
}

/// Ordered bag of named request arguments
///
/// A key bound to JSON `null` counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterBag(Map<String, Value>);

impl ParameterBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one argument
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Set one argument in place
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Raw value for `key`, if present and not null
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// String argument; numbers are accepted and rendered as text
    pub fn text(&self, key: &str) -> Result<String> {
        match self.get(key) {
            None => Err(MonitorError::missing_parameter(key)),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(other) => Err(MonitorError::invalid_parameter(
                key,
                format!("expected text, got {other}"),
            )),
        }
    }

    /// Integer argument; numeric strings are accepted
    pub fn long(&self, key: &str) -> Result<i64> {
        match self.get(key) {
            None => Err(MonitorError::missing_parameter(key)),
            Some(Value::Number(n)) => n.as_i64().ok_or_else(|| {
                MonitorError::invalid_parameter(key, format!("expected an integer, got {n}"))
            }),
            Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| {
                MonitorError::invalid_parameter(key, format!("expected an integer, got '{s}'"))
            }),
            Some(other) => Err(MonitorError::invalid_parameter(
                key,
                format!("expected an integer, got {other}"),
            )),
        }
    }

    /// Boolean argument; `"true"`/`"false"` strings are accepted
    pub fn flag(&self, key: &str) -> Result<bool> {
        match self.get(key) {
            None => Err(MonitorError::missing_parameter(key)),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(MonitorError::invalid_parameter(
                    key,
                    format!("expected true or false, got '{s}'"),
                )),
            },
            Some(other) => Err(MonitorError::invalid_parameter(
                key,
                format!("expected true or false, got {other}"),
            )),
        }
    }

    /// Check that `spec` is present and of the right kind
    pub fn require(&self, spec: &ParamSpec) -> Result<()> {
        match spec.kind {
            ParamKind::Text => self.text(spec.key).map(|_| ()),
            ParamKind::Long => self.long(spec.key).map(|_| ()),
            ParamKind::Flag => self.flag(spec.key).map(|_| ()),
        }
    }

    /// Parse a `key=value` assignment
    ///
    /// The value is read as JSON when it parses (numbers, booleans, quoted
    /// strings), and as a plain string otherwise.
    pub fn parse_assignment(assignment: &str) -> Result<(String, Value)> {
        let (key, raw) = assignment
            .split_once('=')
            .ok_or_else(|| {
                MonitorError::invalid_parameter(assignment, "expected key=value")
            })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(MonitorError::invalid_parameter(
                assignment,
                "empty parameter name",
            ));
        }
        let value = serde_json::from_str::<Value>(raw)
            .unwrap_or_else(|_| Value::String(raw.to_string()));
        Ok((key.to_string(), value))
    }

    /// Underlying ordered map
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for ParameterBag {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for ParameterBag {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Correlation key narrowing engine-wide rows to one virtual database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeFilter {
    pub vdb_name: String,
    pub vdb_version: String,
}

impl ScopeFilter {
    pub fn new(vdb_name: impl Into<String>, vdb_version: impl Into<String>) -> Self {
        Self {
            vdb_name: vdb_name.into(),
            vdb_version: vdb_version.into(),
        }
    }

    /// Read `vdbName` and `vdbVersion` from a parameter bag
    pub fn from_params(params: &ParameterBag) -> Result<Self> {
        Ok(Self::new(
            params.text(keys::VDB_NAME)?,
            params.text(keys::VDB_VERSION)?,
        ))
    }

    /// Same scope with the name passed through [`format_vdb_name`]
    #[must_use]
    pub fn with_formatted_name(&self) -> Self {
        Self::new(format_vdb_name(&self.vdb_name), self.vdb_version.clone())
    }

    /// Version as an integer, for remote operations that require one
    pub fn version_number(&self) -> Result<i64> {
        self.vdb_version.trim().parse::<i64>().map_err(|_| {
            MonitorError::invalid_parameter(
                keys::VDB_VERSION,
                format!("expected an integer, got '{}'", self.vdb_version),
            )
        })
    }
}

impl std::fmt::Display for ScopeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.vdb_name, self.vdb_version)
    }
}

/// Strip a packaging suffix from a virtual-database name
///
/// Truncates at the last `.`, so `"myVDB.vdb"` becomes `"myVDB"`. A name
/// without any `.` is returned unchanged.
#[must_use]
pub fn format_vdb_name(name: &str) -> &str {
    name.rfind('.').map_or(name, |dot| &name[..dot])
}
