//! A form wired to test doubles, plus assertion helpers.
//!
//! [`FormHarness`] builds a [`MultiStepForm`] backed by a
//! [`RecordingStorage`] and a [`ScriptedSubmitHandler`] and keeps handles to
//! both. [`reopen`](FormHarness::reopen) builds a second instance over the
//! same storage, as after a page reload.
//!
//! ## Assertion Helpers
//!
//! - [`assert_step`] - Assert the active step index
//! - [`assert_visible_error`] - Assert the error shown for a field
//! - [`assert_no_visible_error`] - Assert no error is shown for a field
//! - [`assert_blocked_on`] - Assert a transition was blocked by a field

use std::sync::Arc;

use formflow_core::settings::Settings;
use formflow_core::FormflowResult;
use formflow_forms::{FormDefinition, FormValues, MultiStepForm, Transition, Value};
use formflow_storage::PersistedSnapshot;

use crate::storage::RecordingStorage;
use crate::submit::ScriptedSubmitHandler;

/// A form plus the doubles it talks to.
pub struct FormHarness {
    /// The form under test.
    pub form: MultiStepForm,
    /// The storage the form persists to.
    pub storage: RecordingStorage,
    /// The submit collaborator.
    pub submit: Arc<ScriptedSubmitHandler>,
    definition: FormDefinition,
    settings: Settings,
}

impl FormHarness {
    /// Builds a harness with default settings and an accepting handler.
    pub fn new(definition: FormDefinition) -> FormflowResult<Self> {
        Self::with(definition, Settings::default(), ScriptedSubmitHandler::new())
    }

    /// Builds a harness with explicit settings and handler.
    pub fn with(
        definition: FormDefinition,
        settings: Settings,
        submit: ScriptedSubmitHandler,
    ) -> FormflowResult<Self> {
        let storage = RecordingStorage::new();
        let submit = Arc::new(submit);
        let form = MultiStepForm::builder(definition.clone())
            .settings(settings.clone())
            .storage(Arc::new(storage.clone()))
            .submit_handler(submit.clone())
            .build()?;
        Ok(Self {
            form,
            storage,
            submit,
            definition,
            settings,
        })
    }

    /// Builds a fresh form over the same storage and handler.
    pub fn reopen(&self) -> FormflowResult<MultiStepForm> {
        MultiStepForm::builder(self.definition.clone())
            .settings(self.settings.clone())
            .storage(Arc::new(self.storage.clone()))
            .submit_handler(self.submit.clone())
            .build()
    }

    /// Returns the storage key used by the form.
    pub fn storage_key(&self) -> String {
        self.settings.persistence.key_for(self.definition.id())
    }

    /// Returns the snapshot currently stored for the form.
    pub fn stored_snapshot(&self) -> Option<PersistedSnapshot<FormValues>> {
        self.storage.snapshot(&self.storage_key())
    }

    /// Sets several values in order.
    pub fn fill<I, K, V>(&mut self, pairs: I) -> FormflowResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (id, value) in pairs {
            self.form.set_value(id.as_ref(), value)?;
        }
        Ok(())
    }

    /// Sets several values and then calls `next`.
    pub async fn fill_and_next<I, K, V>(&mut self, pairs: I) -> FormflowResult<Transition>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.fill(pairs)?;
        Ok(self.form.next().await)
    }
}

/// Asserts that the form is on step `expected`.
///
/// # Panics
///
/// Panics if the active step differs.
pub fn assert_step(form: &MultiStepForm, expected: usize) {
    assert_eq!(
        form.current_step(),
        expected,
        "Expected the form to be on step {expected}, but it is on step {}",
        form.current_step()
    );
}

/// Asserts that `field` shows exactly `expected`.
///
/// # Panics
///
/// Panics if no error or a different error is shown.
pub fn assert_visible_error(form: &MultiStepForm, field: &str, expected: &str) {
    assert_eq!(
        form.visible_error(field),
        Some(expected),
        "Expected field '{field}' to show '{expected}'. Step errors: {}",
        form.errors()
    );
}

/// Asserts that `field` shows no error.
///
/// # Panics
///
/// Panics if an error is shown.
pub fn assert_no_visible_error(form: &MultiStepForm, field: &str) {
    if let Some(error) = form.visible_error(field) {
        panic!("Expected field '{field}' to show no error, but it shows '{error}'");
    }
}

/// Asserts that `transition` was blocked with an error on `field`.
///
/// # Panics
///
/// Panics if the transition was not blocked or `field` had no error.
pub fn assert_blocked_on(transition: &Transition, field: &str) {
    match transition {
        Transition::Blocked(errors) => assert!(
            errors.contains(field),
            "Expected a blocking error on '{field}', got: {errors}"
        ),
        other => panic!("Expected the transition to be blocked, got {other:?}"),
    }
}
