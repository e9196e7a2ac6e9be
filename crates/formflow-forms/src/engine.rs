//! The multi-step form engine.
//!
//! [`MultiStepForm`] wires a [`FormDefinition`] to the state holder, the
//! navigator, one [`StepSchema`] per step, the persistence adapter, and the
//! form's signals. It is single-owner: every mutating operation takes
//! `&mut self` and runs to completion, awaiting only async validators and
//! the submit collaborator.
//!
//! Persistence follows two triggers:
//! - every [`set_value`](MultiStepForm::set_value) schedules a debounced save
//! - every step change saves immediately
//!
//! Only visible values are persisted and submitted.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;

use formflow_core::logging::form_span;
use formflow_core::settings::{JumpPolicy, Settings};
use formflow_core::{FormflowError, FormflowResult};
use formflow_signals::{FieldBlurred, FormSignals, StepChanged, SubmitFailed, Submitted, ValueChanged};
use formflow_storage::{storage_from_settings, PersistedSnapshot, PersistenceAdapter, StorageBackend};

use crate::definition::{FormDefinition, StepDefinition};
use crate::fields::FieldDefinition;
use crate::navigation::{Direction, Navigator, StepMove};
use crate::schema::{AsyncValidator, CrossFieldValidator, StepSchema, ValidationErrors};
use crate::state::StateHolder;
use crate::value::{FormValues, Value};

/// The external collaborator that receives the final values.
///
/// Called exactly once per submit attempt with the visible values of every
/// step. An `Err` is surfaced to the user as a retryable failure; a
/// [`FormflowError::SubmitError`] message is shown as-is.
#[async_trait]
pub trait SubmitHandler: Send + Sync {
    /// Submits the values.
    async fn submit(&self, values: &FormValues) -> FormflowResult<()>;
}

/// The result of [`MultiStepForm::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The collaborator accepted the values.
    Submitted,
    /// The active step failed validation; the collaborator was not called.
    Invalid(ValidationErrors),
    /// A submission is already in flight.
    InProgress,
    /// The active step is not the last one; nothing was validated or sent.
    NotFinalStep,
    /// The collaborator rejected the values; they are kept for a retry.
    Failed(String),
}

/// The result of a navigation request.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The active step changed.
    Moved(StepMove),
    /// The active step is invalid; its errors are now visible.
    Blocked(ValidationErrors),
    /// The jump target is beyond the first incomplete step.
    Refused,
    /// Nothing happened (boundary, disabled back navigation, same step, or
    /// a submission in flight).
    Unchanged,
    /// `next` on the last step submitted the form.
    Submit(SubmitOutcome),
}

impl Transition {
    /// Returns `true` if the active step changed.
    pub const fn is_moved(&self) -> bool {
        matches!(self, Self::Moved(_))
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds a [`MultiStepForm`].
///
/// # Examples
///
/// ```
/// use formflow_forms::definition::{FormDefinition, StepDefinition};
/// use formflow_forms::engine::MultiStepForm;
/// use formflow_forms::fields::{FieldDefinition, FieldType};
///
/// let definition = FormDefinition::new(
///     "newsletter",
///     vec![StepDefinition::new(
///         "subscribe",
///         vec![FieldDefinition::new("email", FieldType::Email).required(true)],
///     )],
/// )
/// .unwrap();
///
/// let form = MultiStepForm::builder(definition).build().unwrap();
/// assert_eq!(form.current_step(), 0);
/// assert!(form.is_step_valid());
/// ```
pub struct MultiStepFormBuilder {
    definition: FormDefinition,
    settings: Settings,
    storage: Option<Arc<dyn StorageBackend>>,
    submit_handler: Option<Arc<dyn SubmitHandler>>,
    async_validators: Vec<(String, Arc<dyn AsyncValidator>)>,
    rules: Vec<(String, Arc<dyn CrossFieldValidator>)>,
}

impl MultiStepFormBuilder {
    /// Sets the engine settings.
    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Overrides the storage backend chosen by the settings.
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn StorageBackend>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the submit collaborator.
    #[must_use]
    pub fn submit_handler(mut self, handler: Arc<dyn SubmitHandler>) -> Self {
        self.submit_handler = Some(handler);
        self
    }

    /// Attaches an async validator to the field `path`.
    #[must_use]
    pub fn async_validator(mut self, path: impl Into<String>, validator: Arc<dyn AsyncValidator>) -> Self {
        self.async_validators.push((path.into(), validator));
        self
    }

    /// Adds a custom cross-field rule to the step `step_id`.
    #[must_use]
    pub fn rule(mut self, step_id: impl Into<String>, rule: impl CrossFieldValidator + 'static) -> Self {
        let rule: Arc<dyn CrossFieldValidator> = Arc::new(rule);
        self.rules.push((step_id.into(), rule));
        self
    }

    /// Builds the form.
    ///
    /// Fails if a validator names an unknown field or a rule names an
    /// unknown step or field.
    pub fn build(self) -> FormflowResult<MultiStepForm> {
        let definition = self.definition;
        let mut schemas: Vec<StepSchema> = (0..definition.step_count())
            .map(|index| StepSchema::compose_in(&definition, index))
            .collect();

        for (path, validator) in self.async_validators {
            let step = definition
                .step_of(&path)
                .ok_or_else(|| FormflowError::UnknownField(path.clone()))?;
            schemas[step].add_async_validator(path, validator);
        }

        for (step_id, rule) in self.rules {
            let step = definition
                .steps()
                .iter()
                .position(|s| s.id == step_id)
                .ok_or_else(|| FormflowError::ConfigurationError(format!("unknown step '{step_id}'")))?;
            if let Some(unknown) = rule.fields().into_iter().find(|f| definition.field(f).is_none()) {
                return Err(FormflowError::UnknownField(unknown.to_string()));
            }
            schemas[step].add_rule(rule);
        }

        let persistence_settings = &self.settings.persistence;
        let backend = self
            .storage
            .unwrap_or_else(|| storage_from_settings(persistence_settings));
        let persistence = PersistenceAdapter::with_backend(backend, persistence_settings, definition.id());

        let initial: FormValues = definition
            .fields()
            .filter_map(|f| f.default.clone().map(|v| (f.id.clone(), v)))
            .collect();

        let nav = Navigator::new(
            definition.step_count(),
            self.settings.allow_back_navigation,
            self.settings.jump_policy,
        );

        let span = form_span(definition.id());
        tracing::debug!(
            parent: &span,
            steps = definition.step_count(),
            storage = persistence.backend().name(),
            "form built"
        );

        Ok(MultiStepForm {
            definition: Arc::new(definition),
            schemas,
            settings: self.settings,
            state: StateHolder::new(initial),
            nav,
            persistence,
            submit_handler: self.submit_handler,
            signals: FormSignals::new(),
            span,
        })
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// A running multi-step form.
pub struct MultiStepForm {
    definition: Arc<FormDefinition>,
    schemas: Vec<StepSchema>,
    settings: Settings,
    state: StateHolder,
    nav: Navigator,
    persistence: PersistenceAdapter<FormValues>,
    submit_handler: Option<Arc<dyn SubmitHandler>>,
    signals: FormSignals,
    span: tracing::Span,
}

impl fmt::Debug for MultiStepForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiStepForm")
            .field("id", &self.definition.id())
            .field("current", &self.nav.current())
            .field("step_count", &self.nav.step_count())
            .field("submitting", &self.nav.is_submitting())
            .field("storage_key", &self.persistence.key())
            .finish_non_exhaustive()
    }
}

impl MultiStepForm {
    /// Starts building a form for `definition` with default settings.
    pub fn builder(definition: FormDefinition) -> MultiStepFormBuilder {
        MultiStepFormBuilder {
            definition,
            settings: Settings::default(),
            storage: None,
            submit_handler: None,
            async_validators: Vec::new(),
            rules: Vec::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Returns the form id.
    pub fn id(&self) -> &str {
        self.definition.id()
    }

    /// Returns the definition.
    pub fn definition(&self) -> &FormDefinition {
        &self.definition
    }

    /// Returns the settings.
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the form's signals for connecting observers.
    pub const fn signals(&self) -> &FormSignals {
        &self.signals
    }

    /// Returns the navigation state.
    pub const fn navigation(&self) -> &Navigator {
        &self.nav
    }

    /// Returns the field state.
    pub const fn state(&self) -> &StateHolder {
        &self.state
    }

    /// Returns the active step index.
    pub const fn current_step(&self) -> usize {
        self.nav.current()
    }

    /// Returns the active step.
    pub fn current_step_definition(&self) -> &StepDefinition {
        &self.definition.steps()[self.nav.current()]
    }

    /// Returns the number of steps.
    pub fn step_count(&self) -> usize {
        self.definition.step_count()
    }

    /// Returns the direction of the last move.
    pub const fn direction(&self) -> Direction {
        self.nav.direction()
    }

    /// Returns `true` while a submission is in flight.
    pub const fn is_submitting(&self) -> bool {
        self.nav.is_submitting()
    }

    /// Returns every stored value, hidden fields included.
    pub const fn values(&self) -> &FormValues {
        self.state.values()
    }

    /// Returns the value of `id`.
    pub fn value(&self, id: &str) -> Option<&Value> {
        self.state.value(id)
    }

    /// Returns the values of visible fields across all steps.
    ///
    /// A field is visible when its own rule holds and the field it watches
    /// is visible too.
    pub fn visible_values(&self) -> FormValues {
        self.definition.visible_values(self.state.values())
    }

    /// Returns `true` if `id` is declared and currently visible.
    pub fn is_field_visible(&self, id: &str) -> bool {
        self.definition.is_field_visible(id, self.state.values())
    }

    /// Returns the visible fields of the active step in order.
    pub fn visible_fields(&self) -> Vec<&FieldDefinition> {
        self.current_step_definition()
            .fields
            .iter()
            .filter(|f| self.is_field_visible(&f.id))
            .collect()
    }

    /// Returns the share of progress-indicator steps completed, 0 to 100.
    pub fn progress(&self) -> u8 {
        let shown: Vec<usize> = self
            .definition
            .steps()
            .iter()
            .enumerate()
            .filter(|(_, s)| s.show_in_progress)
            .map(|(i, _)| i)
            .collect();
        if shown.is_empty() {
            return 0;
        }
        let done = shown.iter().filter(|i| self.nav.is_completed(**i)).count();
        u8::try_from(done * 100 / shown.len()).unwrap_or(100)
    }

    /// Returns whether the active step is valid (valid by default until
    /// interacted with).
    pub fn is_step_valid(&self) -> bool {
        self.state
            .is_step_valid(self.current_step_definition().fields.iter().map(|f| f.id.as_str()))
    }

    /// Returns the error for `id` if it may be shown.
    pub fn visible_error(&self, id: &str) -> Option<&str> {
        self.state.visible_error(id)
    }

    /// Returns the active step's errors, shown or not.
    pub const fn errors(&self) -> &ValidationErrors {
        self.state.errors()
    }

    // ── Field events ─────────────────────────────────────────────────

    /// Stores a value without validating and schedules a debounced save.
    pub fn set_value(&mut self, id: &str, value: impl Into<Value>) -> FormflowResult<()> {
        if self.definition.field(id).is_none() {
            return Err(FormflowError::UnknownField(id.to_string()));
        }
        let value = value.into();
        let json = value.to_json();
        self.state.set_value(id, value);

        self.signals.value_changed.send(&ValueChanged {
            field: id.to_string(),
            value: json,
        });
        let snapshot = self.snapshot();
        self.persistence.schedule_save(snapshot);
        Ok(())
    }

    /// Marks `id` touched and validates it.
    ///
    /// Fields outside the active step are only marked touched. For the
    /// active step the aggregate is recomputed too, with async validators
    /// run for `id` only. Returns the field's error.
    pub async fn blur(&mut self, id: &str) -> FormflowResult<Option<String>> {
        let step = self
            .definition
            .step_of(id)
            .ok_or_else(|| FormflowError::UnknownField(id.to_string()))?;
        self.state.touch(id);
        if step != self.nav.current() {
            return Ok(None);
        }

        let span = self.span.clone();
        let error = async move {
            let ticket = self.state.begin_step_validation();
            let schema = &self.schemas[step];
            let values = self.state.values();
            let error = schema.validate_field(id, values).await;

            let mut errors = schema.check_sync(values).err().unwrap_or_default();
            errors.remove(id);
            if let Some(message) = &error {
                errors.record(id, message.clone());
            }
            self.state.apply_step_result(&ticket, errors.into_result());

            tracing::debug!(field = id, error = ?error, "field blurred");
            self.signals.field_blurred.send(&FieldBlurred {
                field: id.to_string(),
                error: error.clone(),
            });
            error
        }
        .instrument(span)
        .await;
        Ok(error)
    }

    /// Validates the active step and records the result.
    pub async fn validate_step(&mut self) -> Result<(), ValidationErrors> {
        let ticket = self.state.begin_step_validation();
        let result = self.schemas[self.nav.current()]
            .validate(self.state.values())
            .await;
        self.state.apply_step_result(&ticket, result.clone());
        result
    }

    // ── Navigation ───────────────────────────────────────────────────

    /// Advances after validating the active step. On the last step this
    /// submits instead.
    pub async fn next(&mut self) -> Transition {
        let span = self.span.clone();
        async move {
            if self.nav.is_submitting() {
                return Transition::Unchanged;
            }
            if self.nav.is_last() {
                return Transition::Submit(self.submit().await);
            }
            if let Err(errors) = self.validate_step().await {
                self.state.mark_step_submitted();
                tracing::debug!(step = self.nav.current(), errors = errors.len(), "next blocked");
                return Transition::Blocked(errors);
            }
            match self.nav.advance() {
                Some(mv) => self.moved(mv),
                None => Transition::Unchanged,
            }
        }
        .instrument(span)
        .await
    }

    /// Goes back one step without validating.
    pub fn prev(&mut self) -> Transition {
        if self.nav.is_submitting() {
            return Transition::Unchanged;
        }
        match self.nav.retreat() {
            Some(mv) => self.moved(mv),
            None => Transition::Unchanged,
        }
    }

    /// Jumps to `index`, as from a progress indicator.
    ///
    /// Backward jumps follow the rules of [`prev`](Self::prev). Under
    /// [`JumpPolicy::CompletedOrCurrent`] a forward jump validates the active
    /// step first and may not pass the first incomplete step.
    pub async fn go_to_step(&mut self, index: usize) -> FormflowResult<Transition> {
        self.nav.check_index(index)?;
        let current = self.nav.current();
        if self.nav.is_submitting() || index == current {
            return Ok(Transition::Unchanged);
        }

        let span = self.span.clone();
        let transition = async move {
            if index > current && self.nav.jump_policy() == JumpPolicy::CompletedOrCurrent {
                if let Err(errors) = self.validate_step().await {
                    self.state.mark_step_submitted();
                    return Transition::Blocked(errors);
                }
                self.nav.complete_current();
            }
            match self.nav.jump(index) {
                Ok(Some(mv)) => self.moved(mv),
                _ if index > current => {
                    tracing::debug!(from = current, to = index, "jump refused");
                    Transition::Refused
                }
                _ => Transition::Unchanged,
            }
        }
        .instrument(span)
        .await;
        Ok(transition)
    }

    // ── Submission ───────────────────────────────────────────────────

    /// Validates the final step and hands the visible values to the
    /// submit collaborator.
    ///
    /// Only the last step may submit; earlier steps have to be passed with
    /// [`next`](Self::next) first.
    pub async fn submit(&mut self) -> SubmitOutcome {
        let span = self.span.clone();
        async move {
            if self.nav.is_submitting() {
                return SubmitOutcome::InProgress;
            }
            if !self.nav.is_last() {
                tracing::debug!(step = self.nav.current(), "submit refused before the final step");
                return SubmitOutcome::NotFinalStep;
            }
            self.state.mark_submit_attempted();
            if let Err(errors) = self.validate_step().await {
                tracing::debug!(errors = errors.len(), "submit blocked by validation");
                return SubmitOutcome::Invalid(errors);
            }

            let Some(handler) = self.submit_handler.clone() else {
                return self.submit_failed("No submit handler configured".to_string());
            };

            self.nav.begin_submit();
            let payload = self.visible_values();
            tracing::info!(fields = payload.len(), "submitting");
            let result = handler.submit(&payload).await;

            match result {
                Ok(()) => {
                    self.nav.finish_submit(true);
                    if self.settings.persistence.clear_on_submit {
                        self.persistence.clear();
                    } else {
                        let snapshot = self.snapshot();
                        self.persistence.save(&snapshot);
                    }
                    tracing::info!("submitted");
                    self.signals.submitted.send(&Submitted {
                        form_id: self.definition.id().to_string(),
                    });
                    SubmitOutcome::Submitted
                }
                Err(e) => {
                    self.nav.finish_submit(false);
                    let message = match e {
                        FormflowError::SubmitError(message) => message,
                        other => other.to_string(),
                    };
                    self.submit_failed(message)
                }
            }
        }
        .instrument(span)
        .await
    }

    fn submit_failed(&self, message: String) -> SubmitOutcome {
        tracing::warn!(error = %message, "submit failed");
        self.signals.submit_failed.send(&SubmitFailed {
            form_id: self.definition.id().to_string(),
            message: message.clone(),
        });
        SubmitOutcome::Failed(message)
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Hydrates values and the step index from a fresh snapshot.
    ///
    /// Unknown fields in the snapshot are ignored and the index is clamped
    /// into range; earlier steps count as completed. Returns `false` if
    /// there was nothing to restore.
    pub fn restore(&mut self) -> bool {
        let _entered = self.span.clone().entered();
        let Some(snapshot) = self.persistence.load() else {
            return false;
        };

        let mut values = self.state.initial_values().clone();
        values.extend(
            snapshot
                .values
                .into_iter()
                .filter(|(id, _)| self.definition.field(id).is_some()),
        );
        self.state.restore_values(values);
        let index = self.nav.restore(snapshot.step);
        self.check_current_sync();

        tracing::info!(step = index, taken_at = %snapshot.timestamp, "restored snapshot");
        true
    }

    /// Writes a pending debounced snapshot now. Returns `true` if there
    /// was one.
    pub fn flush(&mut self) -> bool {
        self.persistence.flush()
    }

    /// Returns to the initial values on step 0 and removes the snapshot.
    pub fn reset(&mut self) {
        let _entered = self.span.clone().entered();
        self.state.reset();
        self.nav.reset();
        self.persistence.clear();
        tracing::info!("form reset");
    }

    /// Seeds the aggregate of the active step without async work. Errors
    /// stay hidden until the usual touch or submit conditions hold.
    fn check_current_sync(&mut self) {
        let ticket = self.state.begin_step_validation();
        let result = self.schemas[self.nav.current()].check_sync(self.state.values());
        self.state.apply_step_result(&ticket, result);
    }

    fn snapshot(&self) -> PersistedSnapshot<FormValues> {
        PersistedSnapshot::new(self.nav.current(), self.visible_values())
    }

    fn moved(&mut self, mv: StepMove) -> Transition {
        self.state.enter_step();
        self.check_current_sync();
        let snapshot = self.snapshot();
        self.persistence.save(&snapshot);

        tracing::info!(parent: &self.span, from = mv.from, to = mv.to, "step changed");
        self.signals.step_changed.send(&StepChanged {
            from: mv.from,
            to: mv.to,
        });
        Transition::Moved(mv)
    }
}
