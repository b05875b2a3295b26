//! Teiid Monitor - Management-Plane Adapter
//!
//! Teiid Monitor exposes the runtime state of a data-virtualization engine
//! to monitoring consoles. Consoles ask for named metrics and operations on
//! two component types, the engine as a whole (`Platform`) and one virtual
//! database (`VDB`); the adapter translates each into remote management
//! calls and returns normalized values.
//!
//! # Core Principles
//! - Machine-only interface (JSON-only output)
//! - Every console request is independent; nothing is cached between calls
//! - Parameters are validated before any remote call
//! - Reporting failures are errors; administrative failures are outcomes
//!
//! # Architecture
//! This library provides the core functionality for both the CLI and the
//! stdio bridge. Both are thin wrappers over [`Dispatcher`].
//!
//! # Module Organization
//! - [`error`] - Error types and handling
//! - [`output`] - JSON output envelope types
//! - [`client`] - Remote management client trait and replay transport
//! - [`catalog`] - Metric and operation catalog
//! - [`params`] - Request parameters and VDB scope
//! - [`normalize`] - Result shape normalization
//! - [`scope`] - Scoped aggregation of engine-wide rows
//! - [`dispatch`] - Metric and operation dispatch
//! - [`roles`] - Data-role inspection and mapping updates
//! - [`platform`] - Availability, properties and measurements
//! - [`config`] - Configuration management
//! - [`bridge`] - JSON-RPC 2.0 stdio bridge

pub mod bridge;
pub mod catalog;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod normalize;
pub mod output;
pub mod params;
pub mod platform;
pub mod roles;
pub mod scope;

// Re-export commonly used types for convenience
pub use catalog::{Catalog, ComponentType, FieldNames};
pub use client::replay::{Exchange, ReplayClient};
pub use client::{
    ManagementAddress, ManagementClient, ManagementRequest, ManagementResult, RawValue, Row,
};
pub use config::{resolve_target, save_target, ConfigLocation, StoredTarget, TargetRegistry};
pub use dispatch::{Dispatcher, MetricValue, OperationContent, OperationOutcome};
pub use error::{MonitorError, Result};
pub use output::{ErrorEnvelope, ErrorInfo, Metadata, SuccessEnvelope};
pub use params::{ParameterBag, ScopeFilter};
pub use roles::{RoleUpdate, RoleUpdateReport};
pub use scope::ScopedAggregator;
