//! # formflow-test
//!
//! Testing utilities for formflow. Provides storage doubles that record or
//! reject every operation, a scripted submit collaborator, fixture
//! definitions, and a harness that wires a form to all of them.
//!
//! ## Modules
//!
//! - [`storage`] - `RecordingStorage` and `FailingStorage`
//! - [`submit`] - `ScriptedSubmitHandler`
//! - [`fixtures`] - Form definitions, value maps, and a settings builder
//! - [`harness`] - `FormHarness` and assertion helpers

pub mod fixtures;
pub mod harness;
pub mod storage;
pub mod submit;

pub use harness::{assert_blocked_on, assert_no_visible_error, assert_step, assert_visible_error, FormHarness};
pub use storage::{FailingStorage, RecordingStorage, StorageOp};
pub use submit::ScriptedSubmitHandler;
