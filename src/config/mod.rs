//! Configuration Management
//!
//! This module handles loading and saving monitoring target configurations.
//!
//! # Configuration Locations
//! - Local: `.teiid-monitor/config.json` (team-shareable, per-project)
//! - Global: `~/.config/teiid-monitor/targets.json` (per-user)
//!
//! # Resolution Precedence
//! 1. Explicit command-line parameters (highest priority)
//! 2. Local config file (`.teiid-monitor/config.json`)
//! 3. Global config file (`~/.config/teiid-monitor/targets.json`)
//!
//! # Named Targets
//! Targets are stored as named profiles (e.g., "local", "staging"). Each
//! names the recorded-response file the replay client answers from, an
//! optional default VDB scope, and optional record field-name overrides.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::FieldNames;
use crate::error::{MonitorError, Result};
use crate::params::ScopeFilter;

/// Stored target configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTarget {
    /// Recorded-response file for the replay client
    pub responses: PathBuf,

    /// Default virtual database for scoped metrics and operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vdb_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vdb_version: Option<String>,

    /// Record field names, when the engine uses non-default ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldNames>,
}

impl StoredTarget {
    #[must_use]
    pub fn new(responses: impl Into<PathBuf>) -> Self {
        Self {
            responses: responses.into(),
            vdb_name: None,
            vdb_version: None,
            fields: None,
        }
    }

    /// Default scope, when both name and version are configured
    #[must_use]
    pub fn default_scope(&self) -> Option<ScopeFilter> {
        match (&self.vdb_name, &self.vdb_version) {
            (Some(name), Some(version)) => Some(ScopeFilter::new(name.clone(), version.clone())),
            _ => None,
        }
    }

    /// Field names to use for this target
    #[must_use]
    pub fn field_names(&self) -> FieldNames {
        self.fields.clone().unwrap_or_default()
    }
}

/// Target registry (stored in config files)
///
/// Example:
/// ```json
/// {
///   "targets": {
///     "local": { "responses": "fixtures/local.json", "vdbName": "Portfolio", "vdbVersion": "1" },
///     "staging": { "responses": "/srv/teiid/staging.json" }
///   },
///   "default": "local"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRegistry {
    /// Named targets
    #[serde(default)]
    pub targets: BTreeMap<String, StoredTarget>,

    /// Name of the default target (must exist in targets map)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl TargetRegistry {
    /// Merge `local` over `self`: local targets replace global ones of the
    /// same name, and a local default replaces the global default
    #[must_use]
    pub fn merged_with(mut self, local: Self) -> Self {
        self.targets.extend(local.targets);
        if local.default.is_some() {
            self.default = local.default;
        }
        self
    }
}

/// Configuration file location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLocation {
    /// Local config: `.teiid-monitor/config.json` (team-shareable)
    Local,
    /// Global config: `~/.config/teiid-monitor/targets.json` (per-user)
    Global,
}

/// Get path to local config file (`.teiid-monitor/config.json`)
pub fn local_config_path() -> Result<PathBuf> {
    let current_dir = std::env::current_dir().map_err(|e| {
        MonitorError::config_error(format!("Could not determine current directory: {e}"))
    })?;

    Ok(current_dir.join(".teiid-monitor").join("config.json"))
}

/// Get path to global config file (`~/.config/teiid-monitor/targets.json`)
pub fn global_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| MonitorError::config_error("Could not determine user config directory"))?;

    Ok(config_dir.join("teiid-monitor").join("targets.json"))
}

/// Load target registry from a config file
///
/// A missing file is an empty registry.
pub fn load_registry(path: &Path) -> Result<TargetRegistry> {
    if !path.exists() {
        return Ok(TargetRegistry::default());
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| MonitorError::config_error(format!("Could not read config file: {e}")))?;

    serde_json::from_str::<TargetRegistry>(&contents).map_err(|e| {
        MonitorError::config_error(format!("Invalid config file format in {}: {e}", path.display()))
    })
}

/// Save target registry to a config file
pub fn save_registry(path: &Path, registry: &TargetRegistry) -> Result<()> {
    // Create parent directory if it doesn't exist
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            MonitorError::config_error(format!("Could not create config directory: {e}"))
        })?;
    }

    let contents = serde_json::to_string_pretty(registry)
        .map_err(|e| MonitorError::config_error(format!("Could not serialize config: {e}")))?;

    fs::write(path, contents)
        .map_err(|e| MonitorError::config_error(format!("Could not write config file: {e}")))?;

    Ok(())
}

/// Load target registry with precedence (local over global)
pub fn load_with_precedence() -> Result<TargetRegistry> {
    let global = load_registry(&global_config_path()?)?;
    let local = load_registry(&local_config_path()?)?;
    Ok(global.merged_with(local))
}

/// Pick a target from a registry by name, or the registry's default
pub fn select_target(
    registry: &TargetRegistry,
    name: Option<&str>,
) -> Result<(String, StoredTarget)> {
    let target_name = match name {
        Some(n) => n.to_string(),
        None => registry.default.clone().ok_or_else(|| {
            let available: Vec<_> = registry.targets.keys().collect();
            MonitorError::config_error(format!(
                "No default target set. Available targets: {available:?}. \
                 Specify one with --target or set a default in the config."
            ))
        })?,
    };

    let target = registry.targets.get(&target_name).cloned().ok_or_else(|| {
        let available: Vec<_> = registry.targets.keys().collect();
        let default_info = match &registry.default {
            Some(d) => format!(" (default: '{d}')"),
            None => String::new(),
        };
        MonitorError::config_error(format!(
            "Target '{target_name}' not found. Available targets: {available:?}{default_info}"
        ))
    })?;

    Ok((target_name, target))
}

/// Resolve a target by name from the merged local and global configs
pub fn resolve_target(name: Option<&str>) -> Result<(String, StoredTarget)> {
    select_target(&load_with_precedence()?, name)
}

/// Save a target to a config file
///
/// The first target saved to a file becomes its default.
pub fn save_target(name: &str, target: StoredTarget, location: ConfigLocation) -> Result<PathBuf> {
    let config_path = match location {
        ConfigLocation::Local => local_config_path()?,
        ConfigLocation::Global => global_config_path()?,
    };

    let mut registry = load_registry(&config_path)?;
    if registry.targets.is_empty() {
        registry.default = Some(name.to_string());
    }
    registry.targets.insert(name.to_string(), target);

    save_registry(&config_path, &registry)?;
    tracing::debug!(
        target_name = name,
        path = %config_path.display(),
        "Saved target"
    );

    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry(targets: &[(&str, &str)]) -> TargetRegistry {
        let targets = targets
            .iter()
            .map(|(name, responses)| (name.to_string(), StoredTarget::new(*responses)))
            .collect();
        TargetRegistry {
            targets,
            default: None,
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir_name = format!("teiid-monitor-{name}-{}", std::process::id());
        let dir = std::env::temp_dir().join(dir_name);
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_empty_registry() {
        let registry = TargetRegistry::default();
        assert!(registry.targets.is_empty());
        assert!(registry.default.is_none());
    }

    #[test]
    fn test_registry_serialization() {
        let mut registry = TargetRegistry::default();
        let mut target = StoredTarget::new("fixtures/local.json");
        target.vdb_name = Some("Portfolio".to_string());
        target.vdb_version = Some("1".to_string());
        registry.targets.insert("local".to_string(), target);
        registry.default = Some("local".to_string());

        let json = serde_json::to_value(&registry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "targets": {
                    "local": {
                        "responses": "fixtures/local.json",
                        "vdbName": "Portfolio",
                        "vdbVersion": "1"
                    }
                },
                "default": "local"
            })
        );
    }

    #[test]
    fn test_default_scope_needs_name_and_version() {
        let mut target = StoredTarget::new("r.json");
        assert_eq!(target.default_scope(), None);

        target.vdb_name = Some("Portfolio".to_string());
        assert_eq!(target.default_scope(), None);

        target.vdb_version = Some("2".to_string());
        let scope = ScopeFilter::new("Portfolio", "2");
        assert_eq!(target.default_scope(), Some(scope));
    }

    #[test]
    fn test_field_overrides() {
        let raw = r#"{"responses": "r.json", "fields": {"sessionId": "SessionId"}}"#;
        let target: StoredTarget = serde_json::from_str(raw).unwrap();
        let fields = target.field_names();
        assert_eq!(fields.session_id, "SessionId");
        assert_eq!(fields.vdb_name, "vdb-name");
    }

    #[test]
    fn test_merging_local_overrides_global() {
        let mut global = registry(&[("shared", "global.json"), ("global-only", "g.json")]);
        global.default = Some("global-only".to_string());
        let local = registry(&[("shared", "local.json")]);

        let merged = global.merged_with(local);
        let shared = &merged.targets["shared"];
        assert_eq!(merged.targets.len(), 2);
        assert_eq!(shared.responses, PathBuf::from("local.json"));
        // no local default: global default survives
        assert_eq!(merged.default.as_deref(), Some("global-only"));
    }

    #[test]
    fn test_local_default_wins() {
        let mut global = registry(&[]);
        global.default = Some("a".to_string());
        let mut local = registry(&[]);
        local.default = Some("b".to_string());
        assert_eq!(global.merged_with(local).default.as_deref(), Some("b"));
    }

    #[test]
    fn test_select_target() {
        let mut registry = registry(&[("local", "l.json")]);

        let err = select_target(&registry, None).unwrap_err();
        assert!(err.message().contains("No default target"));

        let (name, target) = select_target(&registry, Some("local")).unwrap();
        assert_eq!(name, "local");
        assert_eq!(target.responses, PathBuf::from("l.json"));

        registry.default = Some("local".to_string());
        let err = select_target(&registry, Some("prod")).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert!(err.message().contains("(default: 'local')"));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = scratch_dir("missing");
        let registry = load_registry(&dir.join("targets.json")).unwrap();
        assert_eq!(registry, TargetRegistry::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = scratch_dir("save");
        let path = dir.join("nested").join("targets.json");

        let registry = registry(&[("local", "l.json")]);
        save_registry(&path, &registry).unwrap();

        assert_eq!(load_registry(&path).unwrap(), registry);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = scratch_dir("invalid");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("targets.json");
        fs::write(&path, "{ nope").unwrap();

        let err = load_registry(&path).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        let _ = fs::remove_dir_all(&dir);
    }
}
