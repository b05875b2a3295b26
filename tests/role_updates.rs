//! Data-Role Update Tests
//!
//! Exercises the mapping rewrite sequence against recorded engine answers:
//! - Call order (toggle, read, remove existing, add configured)
//! - Partial failure stops the sequence and leaves earlier steps applied
//! - Failure descriptions are carried in the report

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use teiid_monitor::roles::{update_data_role_mappings, UpdateStatus};
use teiid_monitor::{
    Catalog, Exchange, ManagementResult, ReplayClient, RoleUpdate, RoleUpdateReport, ScopeFilter,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn vdb() -> Value {
    json!({
        "status": "ACTIVE",
        "data-policies": [
            {"policy-name": "readers", "mapped-role-names": ["analyst", "auditor"]},
            {"policy-name": "writers", "mapped-role-names": ["admin"]}
        ]
    })
}

fn update(any_authenticated: bool, mapped: &[&str]) -> RoleUpdate {
    RoleUpdate {
        role_name: "readers".to_string(),
        any_authenticated,
        mapped_role_names: mapped.iter().map(|role| (*role).to_string()).collect(),
    }
}

/// Run one update against version `version` of the `Portfolio` VDB
async fn apply(
    client: &ReplayClient,
    version: &str,
    update: &RoleUpdate,
) -> teiid_monitor::Result<RoleUpdateReport> {
    let catalog = Catalog::standard();
    let scope = ScopeFilter::new("Portfolio", version);
    update_data_role_mappings(client, &catalog, &scope, update).await
}

/// Every step succeeds
fn healthy_engine() -> ReplayClient {
    ReplayClient::new()
        .respond("add-anyauthenticated-role", ManagementResult::empty())
        .respond("remove-anyauthenticated-role", ManagementResult::empty())
        .respond("get-vdb", ManagementResult::success(vdb()))
        .respond("remove-data-role", ManagementResult::empty())
        .respond("add-data-role", ManagementResult::empty())
}

fn step(client: &ReplayClient, index: usize) -> (String, Option<Value>) {
    let request = client.requests()[index].clone();
    (request.operation, request.params.get("mapped-role").cloned())
}

fn count(client: &ReplayClient, operation: &str) -> usize {
    client
        .operations()
        .iter()
        .filter(|op| *op == operation)
        .count()
}

// ============================================================================
// Sequence
// ============================================================================

#[tokio::test]
async fn test_full_sequence_order() {
    let client = healthy_engine();

    let update = update(true, &["ops", "finance"]);
    let report = apply(&client, "2", &update).await.unwrap();
    assert_eq!(report, RoleUpdateReport::success());

    assert_eq!(
        client.operations(),
        vec![
            "add-anyauthenticated-role",
            "get-vdb",
            "remove-data-role",
            "remove-data-role",
            "add-data-role",
            "add-data-role",
        ]
    );
    assert_eq!(step(&client, 2).1, Some(json!("analyst")));
    assert_eq!(step(&client, 3).1, Some(json!("auditor")));
    assert_eq!(step(&client, 4).1, Some(json!("ops")));
    assert_eq!(step(&client, 5).1, Some(json!("finance")));

    let requests = client.requests();
    let toggle = &requests[0];
    assert_eq!(toggle.params["vdb-name"], json!("Portfolio"));
    assert_eq!(toggle.params["vdb-version"], json!("2"));
    assert_eq!(toggle.params["data-role"], json!("readers"));
    assert_eq!(requests[1].params["vdb-version"], json!(2));
}

#[tokio::test]
async fn test_remove_any_authenticated() {
    let client = healthy_engine();

    let report = apply(&client, "1", &update(false, &[])).await.unwrap();
    assert!(report.is_success());
    assert_eq!(step(&client, 0).0, "remove-anyauthenticated-role");
    // existing mappings are removed even when none are configured
    assert_eq!(count(&client, "add-data-role"), 0);
    assert_eq!(count(&client, "remove-data-role"), 2);
}

#[tokio::test]
async fn test_unknown_role_only_toggles() {
    let client = healthy_engine();
    let mut update = update(true, &["ops"]);
    update.role_name = "nobody".to_string();

    let report = apply(&client, "1", &update).await.unwrap();
    assert!(report.is_success());
    assert_eq!(
        client.operations(),
        vec!["add-anyauthenticated-role", "get-vdb"]
    );
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_partial_failure_has_no_rollback() {
    let undefined = ManagementResult::failure("role 'finance' is not defined");
    let finance = Exchange::new("add-data-role", undefined).with("mapped-role", "finance");
    let client = ReplayClient::new()
        .respond("add-anyauthenticated-role", ManagementResult::empty())
        .respond("get-vdb", ManagementResult::success(vdb()))
        .respond("remove-data-role", ManagementResult::empty())
        .exchange(finance)
        .respond("add-data-role", ManagementResult::empty());

    let update = update(true, &["ops", "finance", "audit"]);
    let report = apply(&client, "1", &update).await.unwrap();

    assert_eq!(report.status, UpdateStatus::Failure);
    assert_eq!(
        report.error_message.as_deref(),
        Some("role 'finance' is not defined")
    );

    // the removals and the first add stay applied; "audit" is never added
    assert_eq!(
        client.operations(),
        vec![
            "add-anyauthenticated-role",
            "get-vdb",
            "remove-data-role",
            "remove-data-role",
            "add-data-role",
            "add-data-role",
        ]
    );
    assert_eq!(step(&client, 5).1, Some(json!("finance")));
}

#[tokio::test]
async fn test_toggle_failure_stops_immediately() {
    let failed = ManagementResult::failure("no such policy");
    let client = ReplayClient::new().respond("add-anyauthenticated-role", failed);

    let report = apply(&client, "1", &update(true, &["ops"])).await.unwrap();
    assert_eq!(report, RoleUpdateReport::failure("no such policy"));
    assert_eq!(client.operations(), vec!["add-anyauthenticated-role"]);
}

#[tokio::test]
async fn test_read_failure_is_reported() {
    let missing = "vdb Portfolio.1 not found";
    let client = ReplayClient::new()
        .respond("add-anyauthenticated-role", ManagementResult::empty())
        .respond("get-vdb", ManagementResult::failure(missing));

    let report = apply(&client, "1", &update(true, &[])).await.unwrap();
    assert_eq!(report, RoleUpdateReport::failure(missing));
}

#[tokio::test]
async fn test_non_numeric_version_sends_nothing() {
    let client = healthy_engine();

    let update = update(true, &["ops"]);
    let err = apply(&client, "one", &update).await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_PARAMETER");
    assert!(client.requests().is_empty());
}

#[tokio::test]
async fn test_transport_error_is_err() {
    let toggled = ManagementResult::empty();
    let client = ReplayClient::new().respond("add-anyauthenticated-role", toggled);

    let err = apply(&client, "1", &update(true, &[])).await.unwrap_err();
    assert_eq!(err.error_code(), "TRANSPORT_ERROR");
}
