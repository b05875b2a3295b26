//! Recorded-Response Client
//!
//! A [`ManagementClient`] that answers from a list of recorded exchanges
//! instead of a live connection. Used by the command line (`--responses`)
//! and by tests.
//!
//! # Fixture Format
//! ```json
//! {
//!   "exchanges": [
//!     {"operation": "list-sessions", "response": {"outcome": "success", "result": []}},
//!     {"operation": "get-vdb", "params": {"vdb-name": "Portfolio"},
//!      "response": {"outcome": "failed", "failure-description": "no such vdb"}}
//!   ]
//! }
//! ```
//!
//! An exchange matches a request when the operation names are equal, the
//! recorded address (if any) is equal, and every recorded parameter is
//! present in the request with an equal value. The first match wins.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use super::{ManagementAddress, ManagementClient, ManagementRequest, ManagementResult, Properties};
use crate::error::{MonitorError, Result};

/// One recorded request/response pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<ManagementAddress>,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub params: Properties,
    pub response: ManagementResult,
}

impl Exchange {
    pub fn new(operation: impl Into<String>, response: ManagementResult) -> Self {
        Self {
            operation: operation.into(),
            address: None,
            params: Properties::new(),
            response,
        }
    }

    /// Only match requests sent to `address`
    #[must_use]
    pub fn at(mut self, address: ManagementAddress) -> Self {
        self.address = Some(address);
        self
    }

    /// Only match requests carrying this parameter value
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    fn matches(&self, request: &ManagementRequest) -> bool {
        let address_matches = match &self.address {
            Some(address) => *address == request.address,
            None => true,
        };
        self.operation == request.operation
            && address_matches
            && self
                .params
                .iter()
                .all(|(key, value)| request.params.get(key) == Some(value))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Fixture {
    #[serde(default)]
    exchanges: Vec<Exchange>,
}

/// Client answering from recorded exchanges
#[derive(Debug, Default)]
pub struct ReplayClient {
    exchanges: Vec<Exchange>,
    log: Mutex<Vec<ManagementRequest>>,
}

impl ReplayClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an exchange
    #[must_use]
    pub fn exchange(mut self, exchange: Exchange) -> Self {
        self.exchanges.push(exchange);
        self
    }

    /// Answer every request for `operation` with `response`
    #[must_use]
    pub fn respond(self, operation: impl Into<String>, response: ManagementResult) -> Self {
        self.exchange(Exchange::new(operation, response))
    }

    /// Load exchanges from a JSON fixture string
    pub fn from_json(json: &str) -> Result<Self> {
        let fixture: Fixture = serde_json::from_str(json).map_err(|e| {
            MonitorError::config_error(format!("Invalid recorded responses: {e}"))
        })?;
        Ok(Self {
            exchanges: fixture.exchanges,
            log: Mutex::default(),
        })
    }

    /// Load exchanges from a JSON fixture file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MonitorError::config_error(format!("Failed to read {}: {e}", path.display()))
        })?;
        let client = Self::from_json(&content)?;
        tracing::debug!(
            path = %path.display(),
            exchanges = client.exchanges.len(),
            "Loaded recorded responses"
        );
        Ok(client)
    }

    /// Requests received so far, in call order
    #[must_use]
    pub fn requests(&self) -> Vec<ManagementRequest> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Operation names received so far, in call order
    #[must_use]
    pub fn operations(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|request| request.operation)
            .collect()
    }

    fn answer(&self, request: &ManagementRequest) -> Result<ManagementResult> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        self.exchanges
            .iter()
            .find(|exchange| exchange.matches(request))
            .map(|exchange| {
                tracing::debug!(
                    operation = %request.operation,
                    address = %request.address,
                    "Replaying recorded response"
                );
                exchange.response.clone()
            })
            .ok_or_else(|| {
                MonitorError::transport(format!(
                    "no recorded response for '{}' at {}",
                    request.operation, request.address
                ))
            })
    }
}

impl ManagementClient for ReplayClient {
    fn execute(
        &self,
        request: &ManagementRequest,
    ) -> impl std::future::Future<Output = Result<ManagementResult>> + Send {
        let answer = self.answer(request);
        async move { answer }
    }
}
