//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout the adapter.
//! All errors are structured and map to specific error codes for JSON output.
//!
//! # Error Categories
//! - `UnknownMetric` / `UnknownOperation`: catalog lookup misses (caller errors)
//! - `MissingParameter` / `InvalidParameter`: request validation, raised before any
//!   remote call
//! - `RemoteCallFailed`: the engine answered with a failed outcome
//! - `MalformedResult`: the engine answered with a value of the wrong shape
//! - `Transport`: the management client could not produce an answer at all
//! - `ConfigError`: target registry or recorded-response file problems

use thiserror::Error;

/// Main error type for adapter operations
#[derive(Error, Debug)]
pub enum MonitorError {
    /// No metric with this name exists for the component type
    #[error("Unknown metric '{metric}' for component type '{component}'")]
    UnknownMetric { component: String, metric: String },

    /// No operation with this name exists for the component type
    #[error("Unknown operation '{operation}' for component type '{component}'")]
    UnknownOperation {
        component: String,
        operation: String,
    },

    /// A parameter required by the catalog entry was not supplied
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// A parameter was supplied with a value of the wrong kind
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The remote engine reported a failed outcome
    #[error("Remote operation '{operation}' failed: {description}")]
    RemoteCallFailed {
        operation: String,
        description: String,
    },

    /// The remote value does not match the shape declared by the catalog
    #[error("Malformed result from '{operation}': {detail}")]
    MalformedResult { operation: String, detail: String },

    /// The management client could not complete the exchange
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration error (file not found, invalid JSON, etc.)
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl MonitorError {
    /// Convert error to error code string for JSON output
    ///
    /// Error codes are stable and suitable for programmatic handling by consoles.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownMetric { .. } => "UNKNOWN_METRIC",
            Self::UnknownOperation { .. } => "UNKNOWN_OPERATION",
            Self::MissingParameter(_) => "MISSING_PARAMETER",
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
            Self::RemoteCallFailed { .. } => "REMOTE_CALL_FAILED",
            Self::MalformedResult { .. } => "MALFORMED_RESULT",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    /// Get human-readable error message
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// True for errors raised before the remote system was contacted
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownMetric { .. }
                | Self::UnknownOperation { .. }
                | Self::MissingParameter(_)
                | Self::InvalidParameter { .. }
        )
    }

    /// Create an unknown metric error
    pub fn unknown_metric(component: impl Into<String>, metric: impl Into<String>) -> Self {
        Self::UnknownMetric {
            component: component.into(),
            metric: metric.into(),
        }
    }

    /// Create an unknown operation error
    pub fn unknown_operation(component: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::UnknownOperation {
            component: component.into(),
            operation: operation.into(),
        }
    }

    /// Create a missing parameter error
    pub fn missing_parameter(name: impl Into<String>) -> Self {
        Self::MissingParameter(name.into())
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a remote call failure
    pub fn remote_call_failed(
        operation: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::RemoteCallFailed {
            operation: operation.into(),
            description: description.into(),
        }
    }

    /// Create a malformed result error
    pub fn malformed_result(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedResult {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }
}

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, MonitorError>;
