//! Data-Role Management
//!
//! Reads the data policies of a virtual database and rewrites the role
//! mappings of one policy.
//!
//! # Update Sequence
//! 1. `add-anyauthenticated-role` or `remove-anyauthenticated-role`
//! 2. `get-vdb` to find the policy's current mapped roles
//! 3. `remove-data-role` for each current mapped role
//! 4. `add-data-role` for each configured mapped role
//!
//! The first failed step ends the update and the report carries the
//! engine's description. Steps already applied stay applied: there is no
//! compensating rollback, so a failure can leave the mappings half updated.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{remote, remote_params, Catalog, FieldNames};
use crate::client::{ManagementClient, ManagementRequest, Row};
use crate::dispatch::{engine_request, Dispatcher};
use crate::error::{MonitorError, Result};
use crate::params::ScopeFilter;

/// Field names of a data policy entry
pub mod policy_fields {
    pub const POLICY_NAME: &str = "policy-name";
    pub const POLICY_DESCRIPTION: &str = "policy-description";
    pub const ANY_AUTHENTICATED: &str = "any-authenticated";
    pub const ALLOW_CREATE_TEMP_TABLES: &str = "allow-create-temp-tables";
    pub const DATA_PERMISSIONS: &str = "data-permissions";
    pub const RESOURCE_NAME: &str = "resource-name";
    pub const ALLOW_CREATE: &str = "allow-create";
    pub const ALLOW_UPDATE: &str = "allow-update";
    pub const ALLOW_READ: &str = "allow-read";
    pub const MAPPED_ROLE_NAMES: &str = "mapped-role-names";
}

/// Desired configuration of one data role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdate {
    pub role_name: String,
    pub any_authenticated: bool,
    #[serde(default)]
    pub mapped_role_names: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    Success,
    Failure,
}

/// Outcome of a role update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdateReport {
    pub status: UpdateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl RoleUpdateReport {
    #[must_use]
    pub const fn success() -> Self {
        Self {
            status: UpdateStatus::Success,
            error_message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: UpdateStatus::Failure,
            error_message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == UpdateStatus::Success
    }
}

/// Permission of a data role on one resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPermission {
    pub resource_name: Option<String>,
    pub allow_create: Option<bool>,
    pub allow_update: Option<bool>,
    pub allow_read: Option<bool>,
}

/// A data role as configured in a virtual database
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRole {
    pub name: String,
    pub description: Option<String>,
    pub any_authenticated: bool,
    pub allow_create_temp_tables: bool,
    pub permissions: Vec<DataPermission>,
    pub mapped_role_names: Vec<String>,
}

fn text(map: &Row, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn flag(map: &Row, key: &str) -> Option<bool> {
    match map.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn objects<'a>(map: &'a Row, key: &str) -> impl Iterator<Item = &'a Row> {
    map.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn data_role(policy: &Row) -> DataRole {
    let permissions = objects(policy, policy_fields::DATA_PERMISSIONS)
        .map(|permission| DataPermission {
            resource_name: text(permission, policy_fields::RESOURCE_NAME),
            allow_create: flag(permission, policy_fields::ALLOW_CREATE),
            allow_update: flag(permission, policy_fields::ALLOW_UPDATE),
            allow_read: flag(permission, policy_fields::ALLOW_READ),
        })
        .collect();

    let mapped_role_names = policy
        .get(policy_fields::MAPPED_ROLE_NAMES)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|name| name.as_str().map(str::to_string))
        .collect();

    DataRole {
        name: text(policy, policy_fields::POLICY_NAME).unwrap_or_default(),
        description: text(policy, policy_fields::POLICY_DESCRIPTION),
        any_authenticated: flag(policy, policy_fields::ANY_AUTHENTICATED).unwrap_or(false),
        allow_create_temp_tables: flag(policy, policy_fields::ALLOW_CREATE_TEMP_TABLES)
            .unwrap_or(false),
        permissions,
        mapped_role_names,
    }
}

/// Data roles of a VDB map, in the order the engine lists them
#[must_use]
pub fn describe_data_roles(vdb: &Row, fields: &FieldNames) -> Vec<DataRole> {
    objects(vdb, &fields.data_policies).map(data_role).collect()
}

/// Issue one step; a failed outcome ends the sequence
async fn step<C: ManagementClient>(
    dispatcher: &Dispatcher<'_, C>,
    request: &ManagementRequest,
) -> Result<Option<RoleUpdateReport>> {
    let result = dispatcher.invoke(request).await?;
    if result.is_success() {
        Ok(None)
    } else {
        let description = result.failure_description().unwrap_or_default();
        Ok(Some(RoleUpdateReport::failure(description)))
    }
}

/// Rewrite the mappings of one data role
///
/// Engine-side failures end the sequence and are reported in the returned
/// report; `Err` is reserved for invalid scopes, transport and
/// malformed-result errors. A non-integer version is rejected before the
/// first remote call.
pub async fn update_data_role_mappings<C: ManagementClient>(
    client: &C,
    catalog: &Catalog,
    scope: &ScopeFilter,
    update: &RoleUpdate,
) -> Result<RoleUpdateReport> {
    // get-vdb needs an integer version; reject a bad one before the toggle is sent
    scope.version_number()?;

    let dispatcher = Dispatcher::new(client, catalog);
    let role_request = |operation: &str| {
        engine_request(operation)
            .with(remote_params::VDB_NAME, scope.vdb_name.as_str())
            .with(remote_params::VDB_VERSION, scope.vdb_version.as_str())
            .with(remote_params::DATA_ROLE, update.role_name.as_str())
    };

    tracing::debug!(
        scope = %scope,
        role = %update.role_name,
        "Updating data role mappings"
    );

    let toggle = if update.any_authenticated {
        remote::ADD_ANY_AUTHENTICATED_ROLE
    } else {
        remote::REMOVE_ANY_AUTHENTICATED_ROLE
    };
    if let Some(report) = step(&dispatcher, &role_request(toggle)).await? {
        return Ok(report);
    }

    let vdb = match dispatcher.vdb_map(scope).await {
        Ok(vdb) => vdb,
        Err(MonitorError::RemoteCallFailed { description, .. }) => {
            return Ok(RoleUpdateReport::failure(description))
        }
        Err(err) => return Err(err),
    };

    let roles = describe_data_roles(&vdb, catalog.fields());
    for role in roles.iter().filter(|role| role.name == update.role_name) {
        for mapped in &role.mapped_role_names {
            let request = role_request(remote::REMOVE_DATA_ROLE)
                .with(remote_params::MAPPED_ROLE, mapped.as_str());
            if let Some(report) = step(&dispatcher, &request).await? {
                return Ok(report);
            }
        }
        for mapped in &update.mapped_role_names {
            let request = role_request(remote::ADD_DATA_ROLE)
                .with(remote_params::MAPPED_ROLE, mapped.as_str());
            if let Some(report) = step(&dispatcher, &request).await? {
                return Ok(report);
            }
        }
    }

    Ok(RoleUpdateReport::success())
}
