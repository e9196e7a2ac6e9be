//! # formflow-core
//!
//! Core types, settings, and logging for formflow. This crate has no
//! dependency on the rest of the workspace and provides the foundation for
//! all other crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Engine settings (navigation policy, persistence)
//! - [`settings_loader`] - Loading settings from TOML/JSON and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{FormflowError, FormflowResult, ValidationError};
pub use settings::{JumpPolicy, PersistenceSettings, Settings, StorageKind};
