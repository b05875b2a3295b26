//! Teiid Monitor CLI Entry Point
//!
//! This is the main binary entry point for the Teiid Monitor CLI.
//! It provides these subcommands:
//! - `metric` - Read one metric
//! - `operation` - Execute one operation
//! - `measure` - Read a batch of numeric metrics
//! - `roles` - Inspect and update data-role mappings
//! - `status` - Engine availability and configuration properties
//! - `targets` - Manage saved monitoring targets
//! - `serve` - JSON-RPC bridge over stdio
//!
//! All output to stdout is JSON-only. Logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use teiid_monitor::params::keys;
use teiid_monitor::{
    bridge, config, platform, roles, Catalog, ConfigLocation, Dispatcher, ErrorEnvelope,
    ManagementAddress, Metadata, MetricValue, MonitorError, OperationOutcome, ParameterBag,
    ReplayClient, RoleUpdate, ScopeFilter, StoredTarget, SuccessEnvelope,
};

/// Teiid Monitor - management-plane adapter for monitoring consoles
#[derive(Parser)]
#[command(name = "teiid-monitor")]
#[command(about = "Expose data-virtualization engine runtime state to monitoring consoles")]
#[command(version)]
struct Cli {
    /// Saved target to use (defaults to the configured default target)
    #[arg(long, global = true, conflicts_with = "responses")]
    target: Option<String>,

    /// Recorded-response file to answer from, bypassing saved targets
    #[arg(long, global = true)]
    responses: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Virtual database scope flags
#[derive(clap::Args)]
struct ScopeArgs {
    /// Virtual database name
    #[arg(long)]
    vdb_name: Option<String>,

    /// Virtual database version
    #[arg(long, requires = "vdb_name")]
    vdb_version: Option<String>,
}

impl ScopeArgs {
    fn scope(&self) -> Option<ScopeFilter> {
        match (&self.vdb_name, &self.vdb_version) {
            (Some(name), Some(version)) => Some(ScopeFilter::new(name.clone(), version.clone())),
            _ => None,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Read one metric
    Metric {
        /// Component type (Platform or VDB)
        #[arg(long)]
        component: String,

        /// Metric name (e.g. SESSION_COUNT, ENGINE_STATISTIC.buffer-usage)
        name: String,

        #[command(flatten)]
        scope: ScopeArgs,

        /// Extra parameter as key=value (repeatable)
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },

    /// Execute one operation
    Operation {
        /// Component type (Platform or VDB)
        #[arg(long)]
        component: String,

        /// Operation name (e.g. GET_SESSIONS, KILL_REQUEST)
        name: String,

        /// Operation parameter as key=value (repeatable)
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },

    /// Read a batch of metrics as numbers
    Measure {
        /// Component type (Platform or VDB)
        #[arg(long)]
        component: String,

        /// Metric names
        #[arg(required = true)]
        names: Vec<String>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Inspect and update data roles of a virtual database
    Roles {
        #[command(subcommand)]
        action: RolesAction,
    },

    /// Engine availability and configuration properties
    Status,

    /// Manage saved monitoring targets
    Targets {
        #[command(subcommand)]
        action: TargetsAction,
    },

    /// Serve JSON-RPC 2.0 requests over stdio
    Serve,
}

#[derive(Subcommand)]
enum RolesAction {
    /// List the data roles of a virtual database
    Describe {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Rewrite the mappings of one data role
    Update {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Data role (policy) name
        #[arg(long)]
        role: String,

        /// Grant the role to any authenticated user
        #[arg(long)]
        any_authenticated: bool,

        /// Mapped role name (repeatable)
        #[arg(long = "mapped-role")]
        mapped_roles: Vec<String>,
    },
}

#[derive(Subcommand)]
enum TargetsAction {
    /// Save a target
    Add {
        /// Target name
        name: String,

        /// Recorded-response file
        #[arg(long)]
        responses: PathBuf,

        #[command(flatten)]
        scope: ScopeArgs,

        /// Where to save the target
        #[arg(long, value_enum, default_value_t = SaveLocation::Local)]
        save: SaveLocation,
    },

    /// List saved targets
    List,
}

#[derive(Clone, Copy, ValueEnum)]
enum SaveLocation {
    Local,
    Global,
}

impl From<SaveLocation> for ConfigLocation {
    fn from(location: SaveLocation) -> Self {
        match location {
            SaveLocation::Local => Self::Local,
            SaveLocation::Global => Self::Global,
        }
    }
}

/// Client, catalog and default scope for one invocation
struct Session {
    client: ReplayClient,
    catalog: Catalog,
    default_scope: Option<ScopeFilter>,
}

impl Session {
    fn open(cli: &Cli) -> teiid_monitor::Result<Self> {
        if let Some(path) = &cli.responses {
            return Ok(Self {
                client: ReplayClient::from_file(path)?,
                catalog: Catalog::standard(),
                default_scope: None,
            });
        }

        let (name, target) = config::resolve_target(cli.target.as_deref())?;
        tracing::debug!(
            target_name = %name,
            responses = %target.responses.display(),
            "Using target"
        );
        Ok(Self {
            client: ReplayClient::from_file(&target.responses)?,
            catalog: Catalog::with_fields(target.field_names()),
            default_scope: target.default_scope(),
        })
    }

    fn dispatcher(&self) -> Dispatcher<'_, ReplayClient> {
        Dispatcher::new(&self.client, &self.catalog)
    }

    fn scope(&self, args: &ScopeArgs) -> Option<ScopeFilter> {
        args.scope().or_else(|| self.default_scope.clone())
    }

    fn require_scope(&self, args: &ScopeArgs) -> teiid_monitor::Result<ScopeFilter> {
        self.scope(args)
            .ok_or_else(|| MonitorError::missing_parameter(keys::VDB_NAME))
    }
}

fn parse_params(assignments: &[String]) -> teiid_monitor::Result<ParameterBag> {
    assignments
        .iter()
        .map(|assignment| ParameterBag::parse_assignment(assignment))
        .collect()
}

fn to_value(value: &impl Serialize) -> teiid_monitor::Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| MonitorError::malformed_result("output", e.to_string()))
}

/// Command data plus the row count reported in the envelope metadata
type CommandResult<T> = teiid_monitor::Result<(T, Option<usize>)>;

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn print_json(value: &impl Serialize) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!(error = %e, "Failed to serialize output"),
    }
}

/// Print a success or error envelope and map it to an exit code
fn emit<T: Serialize>(
    component: &str,
    command: &str,
    start: Instant,
    result: CommandResult<T>,
) -> ExitCode {
    match result {
        Ok((data, rows)) => {
            let meta = match rows {
                Some(rows) => Metadata::with_rows(elapsed_ms(start), rows),
                None => Metadata::new(elapsed_ms(start)),
            };
            print_json(&SuccessEnvelope::new(component, command, data, meta));
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::debug!(code = err.error_code(), error = %err, "Command failed");
            print_json(&ErrorEnvelope::from_error(component, command, &err));
            ExitCode::FAILURE
        }
    }
}

async fn run_metric(
    session: &Session,
    component: &str,
    name: &str,
    scope: &ScopeArgs,
    params: &[String],
) -> CommandResult<MetricValue> {
    let params = parse_params(params)?;
    let scope = session.scope(scope);
    let value = session
        .dispatcher()
        .get_metric(component, scope.as_ref(), name, &params)
        .await?;
    Ok((value, None))
}

async fn run_operation(
    session: &Session,
    component: &str,
    name: &str,
    params: &[String],
) -> CommandResult<OperationOutcome> {
    let mut params = parse_params(params)?;
    if let Some(scope) = &session.default_scope {
        if !params.contains(keys::VDB_NAME) && !params.contains(keys::VDB_VERSION) {
            params.insert(keys::VDB_NAME, scope.vdb_name.as_str());
            params.insert(keys::VDB_VERSION, scope.vdb_version.as_str());
        }
    }
    let outcome = session
        .dispatcher()
        .execute_operation(component, name, &params)
        .await?;
    let rows = outcome.row_count();
    Ok((outcome, rows))
}

async fn run_roles(session: &Session, action: &RolesAction) -> CommandResult<serde_json::Value> {
    match action {
        RolesAction::Describe { scope } => {
            let scope = session.require_scope(scope)?.with_formatted_name();
            let vdb = session.dispatcher().vdb_map(&scope).await?;
            let data_roles = roles::describe_data_roles(&vdb, session.catalog.fields());
            let count = data_roles.len();
            Ok((to_value(&data_roles)?, Some(count)))
        }
        RolesAction::Update {
            scope,
            role,
            any_authenticated,
            mapped_roles,
        } => {
            let scope = session.require_scope(scope)?.with_formatted_name();
            let update = RoleUpdate {
                role_name: role.clone(),
                any_authenticated: *any_authenticated,
                mapped_role_names: mapped_roles.clone(),
            };
            let report =
                roles::update_data_role_mappings(&session.client, &session.catalog, &scope, &update)
                    .await?;
            Ok((to_value(&report)?, None))
        }
    }
}

async fn run_status(session: &Session) -> CommandResult<serde_json::Value> {
    let address = ManagementAddress::teiid();
    let availability = platform::availability(&session.client, &address).await;
    let properties = platform::read_properties(&session.client, &address).await?;
    let data = serde_json::json!({
        "availability": availability,
        "properties": properties
    });
    Ok((data, None))
}

fn run_targets(action: &TargetsAction) -> CommandResult<serde_json::Value> {
    match action {
        TargetsAction::Add {
            name,
            responses,
            scope,
            save,
        } => {
            let mut target = StoredTarget::new(responses.clone());
            target.vdb_name.clone_from(&scope.vdb_name);
            target.vdb_version.clone_from(&scope.vdb_version);
            let path = config::save_target(name, target, (*save).into())?;
            let data = serde_json::json!({ "target": name, "savedTo": path });
            Ok((data, None))
        }
        TargetsAction::List => {
            let registry = config::load_with_precedence()?;
            let count = registry.targets.len();
            let data = serde_json::to_value(&registry).map_err(|e| {
                MonitorError::config_error(format!("Could not serialize config: {e}"))
            })?;
            Ok((data, Some(count)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let start = Instant::now();

    if let Commands::Targets { action } = &cli.command {
        return Ok(emit("", "targets", start, run_targets(action)));
    }

    let session = match Session::open(&cli) {
        Ok(session) => session,
        Err(err) => return Ok(emit::<()>("", "", start, Err(err))),
    };

    let code = match &cli.command {
        Commands::Metric {
            component,
            name,
            scope,
            params,
        } => {
            let result = run_metric(&session, component, name, scope, params).await;
            emit(component, name, start, result)
        }
        Commands::Operation {
            component,
            name,
            params,
        } => {
            let result = run_operation(&session, component, name, params).await;
            emit(component, name, start, result)
        }
        Commands::Measure {
            component,
            names,
            scope,
        } => {
            let scope = session.scope(scope);
            let dispatcher = session.dispatcher();
            let result = platform::collect_measurements(
                &dispatcher,
                component,
                scope.as_ref(),
                names,
            )
            .await
            .map(|measurements| {
                let count = measurements.len();
                (measurements, Some(count))
            });
            emit(component, "measure", start, result)
        }
        Commands::Roles { action } => {
            emit("VDB", "roles", start, run_roles(&session, action).await)
        }
        Commands::Status => emit("Platform", "status", start, run_status(&session).await),
        Commands::Serve => {
            bridge::serve(&session.client, &session.catalog)
                .await
                .context("bridge stopped")?;
            ExitCode::SUCCESS
        }
        Commands::Targets { .. } => ExitCode::SUCCESS,
    };

    Ok(code)
}
