//! Settings loading from configuration files.
//!
//! This module loads [`Settings`] from TOML or JSON files and applies
//! environment variable overrides.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `FORMFLOW_DEBUG` | `debug` |
//! | `FORMFLOW_LOG_LEVEL` | `log_level` |
//! | `FORMFLOW_ALLOW_BACK` | `allow_back_navigation` |
//! | `FORMFLOW_PERSISTENCE_ENABLED` | `persistence.enabled` |
//! | `FORMFLOW_PERSISTENCE_BACKEND` | `persistence.backend` |
//! | `FORMFLOW_PERSISTENCE_DIR` | `persistence.directory` |
//! | `FORMFLOW_DEBOUNCE_MS` | `persistence.debounce_ms` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use formflow_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("formflow.toml").unwrap();
//! ```

use std::path::Path;

use crate::error::FormflowError;
use crate::settings::Settings;

/// Loads settings from a TOML string.
///
/// Any fields not present in the TOML keep their default values.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, FormflowError> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| FormflowError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;
    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, FormflowError> {
    from_toml_str(&read_config(path.as_ref(), "TOML")?)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, FormflowError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
pub fn from_json_str(json_str: &str) -> Result<Settings, FormflowError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| FormflowError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;
    merge_over_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, FormflowError> {
    from_json_str(&read_config(path.as_ref(), "JSON")?)
}

/// Loads settings from a JSON file and then applies environment variable overrides.
pub fn from_json_file_with_env(path: impl AsRef<Path>) -> Result<Settings, FormflowError> {
    let mut settings = from_json_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `FORMFLOW_*` environment variable overrides to a settings struct.
///
/// Unparseable numeric or backend values are ignored and leave the setting
/// unchanged.
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(val) = std::env::var("FORMFLOW_DEBUG") {
        settings.debug = parse_flag(&val);
    }

    if let Ok(val) = std::env::var("FORMFLOW_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Ok(val) = std::env::var("FORMFLOW_ALLOW_BACK") {
        settings.allow_back_navigation = parse_flag(&val);
    }

    if let Ok(val) = std::env::var("FORMFLOW_PERSISTENCE_ENABLED") {
        settings.persistence.enabled = parse_flag(&val);
    }

    if let Ok(val) = std::env::var("FORMFLOW_PERSISTENCE_BACKEND") {
        match val.parse() {
            Ok(kind) => settings.persistence.backend = kind,
            Err(e) => tracing::warn!(error = %e, "ignoring FORMFLOW_PERSISTENCE_BACKEND"),
        }
    }

    if let Ok(val) = std::env::var("FORMFLOW_PERSISTENCE_DIR") {
        settings.persistence.directory = val.into();
    }

    if let Ok(val) = std::env::var("FORMFLOW_DEBOUNCE_MS") {
        if let Ok(ms) = val.parse::<u64>() {
            settings.persistence.debounce_ms = ms;
        }
    }
}

// ============================================================
// Helpers
// ============================================================

fn parse_flag(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn read_config(path: &Path, kind: &str) -> Result<String, FormflowError> {
    std::fs::read_to_string(path).map_err(|e| {
        FormflowError::ConfigurationError(format!(
            "Failed to read {kind} file '{}': {e}",
            path.display()
        ))
    })
}

fn merge_over_defaults(value: serde_json::Value, kind: &str) -> Result<Settings, FormflowError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        FormflowError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, value);
    serde_json::from_value(merged).map_err(|e| {
        FormflowError::ConfigurationError(format!("Failed to deserialize settings from {kind}: {e}"))
    })
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}
