//! Field and step state.
//!
//! [`StateHolder`] owns the authoritative values plus per-field touched and
//! dirty flags and the validation results for the active step. It never
//! validates on its own: callers compute results with a
//! [`StepSchema`](crate::schema::StepSchema) and apply them here.
//!
//! Results that may arrive late are applied through a [`ValidationTicket`].
//! A ticket remembers the value revision it was issued for; a result whose
//! ticket is older than the current revision is discarded, so the most
//! recently issued validation always wins.

use std::collections::BTreeMap;

use crate::schema::ValidationErrors;
use crate::value::{FormValues, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FieldMeta {
    touched: bool,
    dirty: bool,
    revision: u64,
}

/// Identifies one validation run so stale results can be rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationTicket {
    field: Option<String>,
    revision: u64,
}

impl ValidationTicket {
    /// The field this ticket validates, or `None` for a whole step.
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// The value revision the ticket was issued at.
    pub const fn revision(&self) -> u64 {
        self.revision
    }
}

/// Owns form values and per-field interaction state.
#[derive(Debug, Clone, Default)]
pub struct StateHolder {
    initial: FormValues,
    values: FormValues,
    meta: BTreeMap<String, FieldMeta>,
    errors: ValidationErrors,
    step_valid: Option<bool>,
    step_submitted: bool,
    submit_attempted: bool,
    revision: u64,
}

impl StateHolder {
    /// Creates a holder whose current values start as `initial`.
    pub fn new(initial: FormValues) -> Self {
        Self {
            values: initial.clone(),
            initial,
            ..Self::default()
        }
    }

    /// Returns all current values.
    pub const fn values(&self) -> &FormValues {
        &self.values
    }

    /// Returns the current value of `id`.
    pub fn value(&self, id: &str) -> Option<&Value> {
        self.values.get(id)
    }

    /// Returns the initial values.
    pub const fn initial_values(&self) -> &FormValues {
        &self.initial
    }

    /// Stores `value` for `id` without validating.
    ///
    /// The field becomes dirty when the value differs from its initial
    /// value. Returns `true` if the stored value changed.
    pub fn set_value(&mut self, id: &str, value: Value) -> bool {
        let dirty = self.initial.get(id).unwrap_or(&Value::Null) != &value;
        let changed = self.values.get(id) != Some(&value);
        self.values.insert(id.to_string(), value);

        self.revision += 1;
        let revision = self.revision;
        let meta = self.meta.entry(id.to_string()).or_default();
        meta.dirty = dirty;
        meta.revision = revision;
        changed
    }

    /// Marks `id` as touched.
    pub fn touch(&mut self, id: &str) {
        self.meta.entry(id.to_string()).or_default().touched = true;
    }

    /// Returns `true` once the field has lost focus at least once.
    pub fn is_touched(&self, id: &str) -> bool {
        self.meta.get(id).is_some_and(|m| m.touched)
    }

    /// Returns `true` if the field's value differs from its initial value.
    pub fn is_dirty(&self, id: &str) -> bool {
        self.meta.get(id).is_some_and(|m| m.dirty)
    }

    /// Returns `true` if the active step has been through a failed or
    /// successful submit attempt (`next` or `submit`).
    pub const fn is_step_submitted(&self) -> bool {
        self.step_submitted
    }

    /// Returns `true` once the form has been submitted at least once.
    pub const fn submit_attempted(&self) -> bool {
        self.submit_attempted
    }

    /// Marks the active step as submitted, which makes all of its errors
    /// visible.
    pub fn mark_step_submitted(&mut self) {
        self.step_submitted = true;
    }

    /// Records a form-level submit attempt.
    pub fn mark_submit_attempted(&mut self) {
        self.submit_attempted = true;
        self.step_submitted = true;
    }

    /// Issues a ticket for validating one field.
    pub fn begin_field_validation(&self, id: &str) -> ValidationTicket {
        ValidationTicket {
            field: Some(id.to_string()),
            revision: self.meta.get(id).map_or(0, |m| m.revision),
        }
    }

    /// Issues a ticket for validating the whole step.
    pub const fn begin_step_validation(&self) -> ValidationTicket {
        ValidationTicket {
            field: None,
            revision: self.revision,
        }
    }

    /// Returns `true` if values changed after `ticket` was issued.
    pub fn is_stale(&self, ticket: &ValidationTicket) -> bool {
        match &ticket.field {
            Some(id) => self.meta.get(id).map_or(0, |m| m.revision) > ticket.revision,
            None => self.revision > ticket.revision,
        }
    }

    /// Applies a single-field result. Returns `false` if the ticket was
    /// stale and the result was discarded.
    pub fn apply_field_result(&mut self, ticket: &ValidationTicket, error: Option<String>) -> bool {
        let Some(id) = ticket.field() else {
            return false;
        };
        if self.is_stale(ticket) {
            tracing::debug!(field = id, revision = ticket.revision, "discarding stale field validation");
            return false;
        }
        match error {
            Some(message) => {
                self.errors.remove(id);
                self.errors.record(id, message);
            }
            None => {
                self.errors.remove(id);
            }
        }
        true
    }

    /// Applies a whole-step result, replacing the step's errors and the
    /// aggregate. Returns `false` if the ticket was stale.
    pub fn apply_step_result(
        &mut self,
        ticket: &ValidationTicket,
        result: Result<(), ValidationErrors>,
    ) -> bool {
        if ticket.field.is_some() || self.is_stale(ticket) {
            tracing::debug!(revision = ticket.revision, "discarding stale step validation");
            return false;
        }
        match result {
            Ok(()) => {
                self.errors = ValidationErrors::new();
                self.step_valid = Some(true);
            }
            Err(errors) => {
                self.errors = errors;
                self.step_valid = Some(false);
            }
        }
        true
    }

    /// Returns whether the step made of `field_ids` is valid.
    ///
    /// A step nobody has interacted with is valid by default; afterwards the
    /// last computed aggregate decides, and no aggregate yet means invalid.
    pub fn is_step_valid<'a>(&self, field_ids: impl IntoIterator<Item = &'a str>) -> bool {
        let pristine = !self.step_submitted
            && field_ids
                .into_iter()
                .all(|id| !self.is_touched(id) && !self.is_dirty(id));
        pristine || self.step_valid.unwrap_or(false)
    }

    /// Returns the stored error for `id`, shown or not.
    pub fn error(&self, id: &str) -> Option<&str> {
        self.errors.get(id)
    }

    /// Returns the error for `id` only if it may be shown: the field was
    /// touched or the step or form was submitted.
    pub fn visible_error(&self, id: &str) -> Option<&str> {
        let shown = self.is_touched(id) || self.step_submitted || self.submit_attempted;
        self.errors.get(id).filter(|_| shown)
    }

    /// Returns all stored errors for the active step.
    pub const fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Resets step-scoped state after the active step changed.
    pub fn enter_step(&mut self) {
        self.errors = ValidationErrors::new();
        self.step_valid = None;
        self.step_submitted = false;
    }

    /// Replaces the values wholesale (snapshot restore). Dirty flags are
    /// recomputed against the initial values.
    pub fn restore_values(&mut self, values: FormValues) {
        self.revision += 1;
        let revision = self.revision;
        self.meta.clear();
        for (id, value) in &values {
            let dirty = self.initial.get(id).unwrap_or(&Value::Null) != value;
            self.meta.insert(
                id.clone(),
                FieldMeta {
                    touched: false,
                    dirty,
                    revision,
                },
            );
        }
        self.values = values;
        self.enter_step();
    }

    /// Restores the initial values and clears all interaction state.
    pub fn reset(&mut self) {
        let revision = self.revision + 1;
        *self = Self::new(std::mem::take(&mut self.initial));
        self.revision = revision;
    }
}
