//! Settings for formflow.
//!
//! [`Settings`] holds engine-wide configuration: logging, navigation policy,
//! and persistence. Settings are passed explicitly to each form instance;
//! there is no process-global settings object.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which storage collaborator backs the persistence adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Scoped to the running process; lost when the form is dropped.
    #[default]
    Session,
    /// Longer-lived; survives restarts (file-backed).
    Local,
    /// Persistence turned off.
    Disabled,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Session => "session",
            Self::Local => "local",
            Self::Disabled => "disabled",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "session" => Ok(Self::Session),
            "local" => Ok(Self::Local),
            "disabled" | "none" | "off" => Ok(Self::Disabled),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

/// Policy for direct jumps to a step (progress indicator clicks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JumpPolicy {
    /// Only already-completed steps, the current step, or the first
    /// incomplete step may be targeted; forward jumps validate the current
    /// step first.
    #[default]
    CompletedOrCurrent,
    /// Any in-range step may be targeted without validation.
    Any,
}

/// Persistence adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceSettings {
    /// Whether snapshots are written at all.
    pub enabled: bool,
    /// The storage collaborator to use.
    pub backend: StorageKind,
    /// Prefix for storage keys; the form id is appended.
    pub key_prefix: String,
    /// Directory used by the `local` backend.
    pub directory: PathBuf,
    /// Debounce delay for writes triggered by field changes, in milliseconds.
    pub debounce_ms: u64,
    /// Snapshots older than this are discarded on load.
    pub max_age_hours: u64,
    /// Whether a successful submission removes the snapshot.
    pub clear_on_submit: bool,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: StorageKind::Session,
            key_prefix: "formflow:".to_string(),
            directory: PathBuf::from(".formflow"),
            debounce_ms: 500,
            max_age_hours: 24,
            clear_on_submit: true,
        }
    }
}

impl PersistenceSettings {
    /// Returns the storage key for a given form id.
    pub fn key_for(&self, form_id: &str) -> String {
        format!("{}{form_id}", self.key_prefix)
    }
}

/// The complete set of engine settings.
///
/// # Examples
///
/// ```
/// use formflow_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.allow_back_navigation);
/// assert_eq!(settings.persistence.max_age_hours, 24);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // ── Core ─────────────────────────────────────────────────────────

    /// Whether debug mode is enabled (pretty logs instead of JSON).
    pub debug: bool,

    // ── Logging ──────────────────────────────────────────────────────

    /// The log filter (e.g. "info", "formflow_forms=debug").
    pub log_level: String,

    // ── Navigation ───────────────────────────────────────────────────

    /// Whether `prev()` and backward jumps are permitted.
    pub allow_back_navigation: bool,
    /// Policy applied by `go_to_step`.
    pub jump_policy: JumpPolicy,

    // ── Persistence ──────────────────────────────────────────────────

    /// Snapshot persistence.
    pub persistence: PersistenceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            allow_back_navigation: true,
            jump_policy: JumpPolicy::CompletedOrCurrent,
            persistence: PersistenceSettings::default(),
        }
    }
}
