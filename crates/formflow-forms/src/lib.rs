//! # formflow-forms
//!
//! The multi-step form engine. A [`FormDefinition`] declares ordered steps
//! of typed fields; [`MultiStepForm`] runs it: per-step validation, gated
//! navigation, debounced persistence, and a single guarded submission.
//!
//! ## Modules
//!
//! - [`value`] - Dynamic field values
//! - [`fields`] - Field types, field definitions, and visibility rules
//! - [`definition`] - Step and form definitions with structural checks
//! - [`rules`] - Per-field validation rules derived from definitions
//! - [`schema`] - Step schemas: field rules, cross-field rules, async validators
//! - [`state`] - Values, touched/dirty flags, and errors of the active step
//! - [`navigation`] - The step index state machine
//! - [`engine`] - [`MultiStepForm`] and its builder
//! - [`render`] - Widget dispatch and HTML rendering

pub mod definition;
pub mod engine;
pub mod fields;
pub mod navigation;
pub mod render;
pub mod rules;
pub mod schema;
pub mod state;
pub mod value;

pub use definition::{FormDefinition, StepDefinition};
pub use engine::{MultiStepForm, MultiStepFormBuilder, SubmitHandler, SubmitOutcome, Transition};
pub use fields::{FieldDefinition, FieldOption, FieldType, VisibilityOperator, VisibilityRule};
pub use navigation::{Direction, Navigator, StepMove};
pub use render::{widget_for, FieldProps, FieldRenderer, HtmlRenderer, RenderDispatcher, WidgetKind};
pub use rules::FieldRule;
pub use schema::{AsyncValidator, CrossFieldRule, CrossFieldValidator, StepSchema, ValidationErrors};
pub use state::{StateHolder, ValidationTicket};
pub use value::{FileRef, FormValues, Value};
