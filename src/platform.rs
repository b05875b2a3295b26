//! Engine-Level Facet
//!
//! Availability checks, subsystem configuration properties and batched
//! numeric measurements for the engine as a whole.

use serde::{Deserialize, Serialize};

use crate::catalog::remote;
use crate::client::{ManagementAddress, ManagementClient, ManagementRequest, Properties, RawValue};
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::params::{ParameterBag, ScopeFilter};

/// Property prefix for the JDBC transport
pub const JDBC_TRANSPORT_CONFIGURATION: &str = "JDBCTransportConfiguration";

/// Property prefix for the ODBC transport
pub const ODBC_TRANSPORT_CONFIGURATION: &str = "ODBCTransportConfiguration";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Availability {
    Up,
    Down,
}

/// Check a resource with `read-resource`
///
/// Any failure, including a transport error, means `Down`.
pub async fn availability<C: ManagementClient>(
    client: &C,
    address: &ManagementAddress,
) -> Availability {
    let request = ManagementRequest::new(remote::READ_RESOURCE, address.clone());
    match client.execute(&request).await {
        Ok(result) if result.is_success() => Availability::Up,
        Ok(result) => {
            tracing::debug!(
                %address,
                failure = result.failure_description().unwrap_or_default(),
                "Resource unavailable"
            );
            Availability::Down
        }
        Err(err) => {
            tracing::debug!(%address, error = %err, "Resource unreachable");
            Availability::Down
        }
    }
}

async fn read_resource<C: ManagementClient>(
    client: &C,
    address: ManagementAddress,
) -> Result<Properties> {
    let request = ManagementRequest::new(remote::READ_RESOURCE, address);
    let result = client.execute(&request).await?;
    if !result.is_success() {
        tracing::warn!(
            address = %request.address,
            failure = result.failure_description().unwrap_or_default(),
            "Failed to read resource"
        );
        return Ok(Properties::new());
    }
    Ok(match result.into_value() {
        Some(RawValue::FieldMap(fields)) => fields,
        _ => Properties::new(),
    })
}

/// Configuration properties of the engine subsystem at `address`
///
/// Subsystem attributes keep their names; attributes of the `jdbc` and
/// `odbc` transports are prefixed with [`JDBC_TRANSPORT_CONFIGURATION`] and
/// [`ODBC_TRANSPORT_CONFIGURATION`]. A failed read contributes nothing.
pub async fn read_properties<C: ManagementClient>(
    client: &C,
    address: &ManagementAddress,
) -> Result<Properties> {
    let mut properties = read_resource(client, address.clone()).await?;

    let transports = [
        ("jdbc", JDBC_TRANSPORT_CONFIGURATION),
        ("odbc", ODBC_TRANSPORT_CONFIGURATION),
    ];
    for (transport, prefix) in transports {
        let fields = read_resource(client, address.child("transport", transport)).await?;
        let prefixed = fields
            .into_iter()
            .map(|(name, value)| (format!("{prefix}.{name}"), value));
        properties.extend(prefixed);
    }

    Ok(properties)
}

/// One numeric reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub value: f64,
}

/// Read a batch of metrics as numbers
///
/// Non-numeric values are logged and left out. The first metric that fails
/// aborts the batch.
pub async fn collect_measurements<C: ManagementClient>(
    dispatcher: &Dispatcher<'_, C>,
    component: &str,
    scope: Option<&ScopeFilter>,
    names: &[String],
) -> Result<Vec<Measurement>> {
    let params = ParameterBag::new();
    let mut measurements = Vec::with_capacity(names.len());

    for name in names {
        tracing::debug!(component, metric = %name, "Collecting measurement");
        let value = match dispatcher.get_metric(component, scope, name, &params).await {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(
                    component,
                    metric = %name,
                    error = %err,
                    "Failed to obtain measurement"
                );
                return Err(err);
            }
        };

        match value.as_f64() {
            Some(value) => measurements.push(Measurement {
                name: name.clone(),
                value,
            }),
            None => tracing::error!(
                component,
                metric = %name,
                %value,
                "Metric value must be a numeric value"
            ),
        }
    }

    Ok(measurements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::client::replay::{Exchange, ReplayClient};
    use crate::client::ManagementResult;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn measurement(name: &str, value: f64) -> Measurement {
        Measurement {
            name: name.to_string(),
            value,
        }
    }

    #[tokio::test]
    async fn test_availability() {
        let up = ReplayClient::new().respond("read-resource", ManagementResult::success(json!({})));
        let down = ReplayClient::new().respond(
            "read-resource",
            ManagementResult::failure("not found"),
        );
        let unreachable = ReplayClient::new();

        let address = ManagementAddress::teiid();
        assert_eq!(availability(&up, &address).await, Availability::Up);
        assert_eq!(availability(&down, &address).await, Availability::Down);
        assert_eq!(
            availability(&unreachable, &address).await,
            Availability::Down
        );
    }

    #[tokio::test]
    async fn test_read_properties_prefixes_transports() {
        let base = ManagementAddress::teiid();
        let jdbc = Exchange::new(
            "read-resource",
            ManagementResult::success(json!({"port": 31000})),
        );
        let odbc = Exchange::new("read-resource", ManagementResult::failure("no odbc"));
        let engine = Exchange::new(
            "read-resource",
            ManagementResult::success(json!({"max-threads": 64})),
        );
        let client = ReplayClient::new()
            .exchange(jdbc.at(base.child("transport", "jdbc")))
            .exchange(odbc.at(base.child("transport", "odbc")))
            .exchange(engine.at(base.clone()));

        let properties = read_properties(&client, &base).await.unwrap();
        assert_eq!(
            Value::Object(properties),
            json!({"max-threads": 64, "JDBCTransportConfiguration.port": 31000})
        );
    }

    #[tokio::test]
    async fn test_collect_skips_non_numeric() {
        let sessions = ManagementResult::success(json!([{"session-id": "a"}]));
        let stats = ManagementResult::success(json!({"state": "RUNNING", "buffer-usage": "12"}));
        let client = ReplayClient::new()
            .respond("list-sessions", sessions)
            .respond("engine-statistics", stats);
        let catalog = Catalog::standard();
        let dispatcher = Dispatcher::new(&client, &catalog);
        let names = vec![
            "SESSION_COUNT".to_string(),
            "ENGINE_STATISTIC.state".to_string(),
            "ENGINE_STATISTIC.buffer-usage".to_string(),
        ];

        let measurements = collect_measurements(&dispatcher, "Platform", None, &names)
            .await
            .unwrap();
        assert_eq!(
            measurements,
            vec![
                measurement("SESSION_COUNT", 1.0),
                measurement("ENGINE_STATISTIC.buffer-usage", 12.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_collect_aborts_on_failure() {
        let failed = ManagementResult::failure("boom");
        let client = ReplayClient::new().respond("list-requests", failed);
        let catalog = Catalog::standard();
        let dispatcher = Dispatcher::new(&client, &catalog);
        let names = ["QUERY_COUNT".to_string()];

        let err = collect_measurements(&dispatcher, "Platform", None, &names)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "REMOTE_CALL_FAILED");
    }
}
