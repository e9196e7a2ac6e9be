//! # formflow
//!
//! A UI-agnostic multi-step form engine.
//!
//! This is the meta-crate that re-exports all sub-crates for convenient access.
//! You can depend on `formflow` to get the whole engine, or depend on
//! individual crates for finer-grained control.
//!
//! ## Example
//!
//! ```
//! use formflow::prelude::*;
//!
//! # tokio_test_block(async {
//! let definition = FormDefinition::new(
//!     "signup",
//!     vec![StepDefinition::new(
//!         "account",
//!         vec![FieldDefinition::new("email", FieldType::Email).required(true)],
//!     )],
//! )
//! .unwrap();
//!
//! let mut form = MultiStepForm::builder(definition).build().unwrap();
//! form.set_value("email", "not-an-email").unwrap();
//! let errors = form.validate_step().await.unwrap_err();
//! assert_eq!(errors.get("email"), Some("Invalid email address"));
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     formflow::tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

/// Errors, settings, settings loading, and logging setup.
pub use formflow_core as core;

/// Field rules, step schemas, navigation, and the `MultiStepForm` engine.
#[cfg(feature = "forms")]
pub use formflow_forms as forms;

/// Storage backends and the debounced persistence adapter.
#[cfg(feature = "storage")]
pub use formflow_storage as storage;

/// Per-form lifecycle signals.
#[cfg(feature = "signals")]
pub use formflow_signals as signals;

/// Test doubles, fixtures, and assertion helpers.
#[cfg(feature = "testing")]
pub use formflow_test as test;

// Third-party re-exports
pub use async_trait::async_trait;
pub use chrono;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;
pub use tracing_subscriber;

/// The types most applications need.
pub mod prelude {
    pub use formflow_core::logging::setup_logging;
    pub use formflow_core::{FormflowError, FormflowResult, JumpPolicy, Settings, StorageKind};

    #[cfg(feature = "forms")]
    pub use formflow_forms::{
        AsyncValidator, CrossFieldRule, CrossFieldValidator, FieldDefinition, FieldType,
        FormDefinition, FormValues, HtmlRenderer, MultiStepForm, RenderDispatcher, StepDefinition,
        SubmitHandler, SubmitOutcome, Transition, Value, VisibilityRule,
    };

    #[cfg(feature = "storage")]
    pub use formflow_storage::{LocalStorage, SessionStorage, StorageBackend};
}
