//! Step schemas: one validatable unit per step.
//!
//! A [`StepSchema`] combines the [`FieldRule`]s of a step's fields with
//! cross-field rules and asynchronous validators. Validation runs in three
//! stages and records only the first error per path:
//!
//! 1. Field rules, for visible fields only
//! 2. Cross-field rules, skipped when their error path is hidden
//! 3. Async validators, skipped for empty values and for paths that already
//!    failed a synchronous check
//!
//! A field is hidden when any rule in its visibility chain fails. Rules and
//! async validators only ever see the values of visible fields, so a stale
//! value left in a hidden field cannot affect the result.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use formflow_core::ValidationError;

use crate::definition::{FormDefinition, StepDefinition};
use crate::fields::{visibility_chain, FieldDefinition, VisibilityRule};
use crate::rules::FieldRule;
use crate::value::{FormValues, Value};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Validation failures keyed by field path, one message per path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message` for `path` unless the path already has an error.
    /// Returns `true` if the message was recorded.
    pub fn record(&mut self, path: impl Into<String>, message: impl Into<String>) -> bool {
        match self.0.entry(path.into()) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(message.into());
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Returns the message for `path`.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    /// Returns `true` if `path` has an error.
    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    /// Removes the error for `path`.
    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.0.remove(path)
    }

    /// Returns `true` if there are no errors.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of failing paths.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over `(path, message)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Converts into a `Result`: `Ok` when empty.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (path, message)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{path}: {message}")?;
        }
        Ok(())
    }
}

impl From<ValidationErrors> for ValidationError {
    fn from(errors: ValidationErrors) -> Self {
        Self::with_field_errors(errors.0)
    }
}

// ---------------------------------------------------------------------------
// Cross-field rules
// ---------------------------------------------------------------------------

/// A synchronous predicate over the whole value map.
///
/// The error, if any, is attached to [`path`](Self::path).
pub trait CrossFieldValidator: Send + Sync + fmt::Debug {
    /// The path an error is attached to.
    fn path(&self) -> &str;

    /// Checks the values.
    fn validate(&self, values: &FormValues) -> Result<(), String>;

    /// Every field the rule reads, including [`path`](Self::path).
    fn fields(&self) -> Vec<&str> {
        vec![self.path()]
    }
}

/// The built-in, declarative cross-field rules.
///
/// Rules skip themselves when the values they compare are missing; presence
/// is the field rule's job. Hidden fields count as missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrossFieldRule {
    /// `field` must equal `other`; the error lands on `field`. Skipped
    /// until both have a value.
    Matches {
        /// The dependent field (e.g. `confirm_password`).
        field: String,
        /// The field it must equal.
        other: String,
        /// Message override.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// The ISO date in `end` must not be before `start`; the error lands on
    /// `end`.
    DateOrder {
        /// The earlier date.
        start: String,
        /// The later date.
        end: String,
        /// Message override.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Non-empty values of `fields` must be pairwise distinct.
    Unique {
        /// The compared fields.
        fields: Vec<String>,
        /// Where the error lands.
        path: String,
        /// Message override.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// The numeric values of `fields` must add up to `target`. Absent
    /// fields count as zero.
    SumEquals {
        /// The summed fields.
        fields: Vec<String>,
        /// The required total.
        target: f64,
        /// Where the error lands.
        path: String,
        /// Message override.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl CrossFieldRule {
    /// `field` must equal `other`.
    pub fn matches(field: impl Into<String>, other: impl Into<String>) -> Self {
        Self::Matches {
            field: field.into(),
            other: other.into(),
            message: None,
        }
    }

    /// `end` must not precede `start`.
    pub fn date_order(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self::DateOrder {
            start: start.into(),
            end: end.into(),
            message: None,
        }
    }

    /// Values must be distinct.
    pub fn unique<I, S>(fields: I, path: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Unique {
            fields: fields.into_iter().map(Into::into).collect(),
            path: path.into(),
            message: None,
        }
    }

    /// Values must add up to `target`.
    pub fn sum_equals<I, S>(fields: I, target: f64, path: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::SumEquals {
            fields: fields.into_iter().map(Into::into).collect(),
            target,
            path: path.into(),
            message: None,
        }
    }

    /// Replaces the default message.
    #[must_use]
    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        let text = Some(text.into());
        match &mut self {
            Self::Matches { message, .. }
            | Self::DateOrder { message, .. }
            | Self::Unique { message, .. }
            | Self::SumEquals { message, .. } => *message = text,
        }
        self
    }

    fn message_or(&self, default: impl FnOnce() -> String) -> String {
        match self {
            Self::Matches { message, .. }
            | Self::DateOrder { message, .. }
            | Self::Unique { message, .. }
            | Self::SumEquals { message, .. } => message.clone().unwrap_or_else(default),
        }
    }
}

impl CrossFieldValidator for CrossFieldRule {
    fn path(&self) -> &str {
        match self {
            Self::Matches { field, .. } => field.as_str(),
            Self::DateOrder { end, .. } => end.as_str(),
            Self::Unique { path, .. } | Self::SumEquals { path, .. } => path.as_str(),
        }
    }

    fn validate(&self, values: &FormValues) -> Result<(), String> {
        let present = |id: &str| values.get(id).filter(|v| !v.is_empty());
        match self {
            Self::Matches { field, other, .. } => {
                let (Some(value), Some(expected)) = (present(field), present(other)) else {
                    return Ok(());
                };
                if value == expected {
                    Ok(())
                } else {
                    Err(self.message_or(|| "Values do not match".to_string()))
                }
            }
            Self::DateOrder { start, end, .. } => {
                let parse = |id: &str| {
                    present(id)
                        .and_then(Value::as_str)
                        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                };
                match (parse(start), parse(end)) {
                    (Some(s), Some(e)) if e < s => Err(self.message_or(|| {
                        "End date must be on or after start date".to_string()
                    })),
                    _ => Ok(()),
                }
            }
            Self::Unique { fields, .. } => {
                let mut seen: Vec<&Value> = Vec::new();
                let duplicate = fields.iter().filter_map(|id| present(id)).any(|v| {
                    let repeated = seen.iter().any(|s| s.loosely_equals(v));
                    seen.push(v);
                    repeated
                });
                if duplicate {
                    Err(self.message_or(|| "Values must be unique".to_string()))
                } else {
                    Ok(())
                }
            }
            Self::SumEquals { fields, target, .. } => {
                let sum: f64 = fields
                    .iter()
                    .filter_map(|id| values.get(id).and_then(Value::as_f64))
                    .sum();
                if (sum - target).abs() <= 1e-9 {
                    Ok(())
                } else {
                    Err(self.message_or(|| format!("Values must add up to {target}")))
                }
            }
        }
    }

    fn fields(&self) -> Vec<&str> {
        match self {
            Self::Matches { field, other, .. } => vec![field.as_str(), other.as_str()],
            Self::DateOrder { start, end, .. } => vec![start.as_str(), end.as_str()],
            Self::Unique { fields, path, .. } | Self::SumEquals { fields, path, .. } => {
                let mut all: Vec<&str> = fields.iter().map(String::as_str).collect();
                if !all.contains(&path.as_str()) {
                    all.push(path.as_str());
                }
                all
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Async validators
// ---------------------------------------------------------------------------

/// An asynchronous check on one field, such as a remote uniqueness lookup.
///
/// Implementations map transport failures to `Err` with a user-facing
/// message; an `Err` always counts as a rejection.
#[async_trait]
pub trait AsyncValidator: Send + Sync {
    /// Checks `value`. Never called with an empty value.
    async fn validate(&self, value: &Value, values: &FormValues) -> Result<(), String>;
}

// ---------------------------------------------------------------------------
// Step schema
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct FieldEntry {
    definition: FieldDefinition,
    rule: FieldRule,
}

#[derive(Clone)]
struct AsyncEntry {
    path: String,
    validator: Arc<dyn AsyncValidator>,
}

/// The composite rule for one step.
#[derive(Clone)]
pub struct StepSchema {
    step_id: String,
    fields: Vec<FieldEntry>,
    visibility: BTreeMap<String, Vec<VisibilityRule>>,
    rules: Vec<Arc<dyn CrossFieldValidator>>,
    async_validators: Vec<AsyncEntry>,
}

impl fmt::Debug for StepSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepSchema")
            .field("step_id", &self.step_id)
            .field("fields", &self.field_ids().collect::<Vec<_>>())
            .field("rules", &self.rules.len())
            .field("async_validators", &self.async_validators.len())
            .finish()
    }
}

impl StepSchema {
    /// Composes the schema for a step: one rule per field plus the step's
    /// declarative cross-field rules.
    ///
    /// Visibility chains are followed within the step only. Use
    /// [`compose_in`](Self::compose_in) when fields depend on other steps.
    pub fn compose(step: &StepDefinition) -> Self {
        let visibility = step
            .fields
            .iter()
            .map(|f| (f.id.clone(), visibility_chain(f, |id| step.field(id))))
            .collect();
        Self::with_visibility(step, visibility)
    }

    /// Composes the schema for step `index` of `form`, resolving the
    /// visibility of every field of the form so rules reading other steps
    /// see the same visible values the form submits.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn compose_in(form: &FormDefinition, index: usize) -> Self {
        let visibility = form
            .fields()
            .map(|f| (f.id.clone(), form.visibility_chain(&f.id)))
            .collect();
        Self::with_visibility(&form.steps()[index], visibility)
    }

    fn with_visibility(step: &StepDefinition, visibility: BTreeMap<String, Vec<VisibilityRule>>) -> Self {
        Self {
            step_id: step.id.clone(),
            fields: step
                .fields
                .iter()
                .map(|f| FieldEntry {
                    definition: f.clone(),
                    rule: FieldRule::build(f),
                })
                .collect(),
            visibility,
            rules: step
                .rules
                .iter()
                .map(|r| Arc::new(r.clone()) as Arc<dyn CrossFieldValidator>)
                .collect(),
            async_validators: Vec::new(),
        }
    }

    /// Adds a cross-field rule.
    #[must_use]
    pub fn with_rule(mut self, rule: impl CrossFieldValidator + 'static) -> Self {
        self.add_rule(Arc::new(rule));
        self
    }

    pub(crate) fn add_rule(&mut self, rule: Arc<dyn CrossFieldValidator>) {
        self.rules.push(rule);
    }

    /// Adds an async validator for `path`.
    #[must_use]
    pub fn with_async_validator(
        mut self,
        path: impl Into<String>,
        validator: Arc<dyn AsyncValidator>,
    ) -> Self {
        self.add_async_validator(path, validator);
        self
    }

    pub(crate) fn add_async_validator(
        &mut self,
        path: impl Into<String>,
        validator: Arc<dyn AsyncValidator>,
    ) {
        self.async_validators.push(AsyncEntry {
            path: path.into(),
            validator,
        });
    }

    /// Returns the id of the step.
    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    /// Iterates over the ids of the step's fields in order.
    pub fn field_ids(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|e| e.definition.id.as_str())
    }

    /// Returns `true` if the step declares `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.fields.iter().any(|e| e.definition.id == path)
    }

    /// Returns `false` for a known field with a failing rule anywhere in
    /// its visibility chain. Unknown paths count as visible.
    pub fn is_visible(&self, path: &str, values: &FormValues) -> bool {
        self.visibility
            .get(path)
            .map_or(true, |chain| chain.iter().all(|rule| rule.holds(values)))
    }

    /// Returns `values` without the entries of hidden fields.
    pub fn visible_values(&self, values: &FormValues) -> FormValues {
        values
            .iter()
            .filter(|(id, _)| self.is_visible(id, values))
            .map(|(id, v)| (id.clone(), v.clone()))
            .collect()
    }

    /// Runs field rules and cross-field rules without any async work.
    pub fn check_sync(&self, values: &FormValues) -> Result<(), ValidationErrors> {
        self.sync_errors(values, &self.visible_values(values)).into_result()
    }

    /// Validates the whole step.
    pub async fn validate(&self, values: &FormValues) -> Result<(), ValidationErrors> {
        let visible = self.visible_values(values);
        let mut errors = self.sync_errors(values, &visible);

        for entry in &self.async_validators {
            if errors.contains(&entry.path) {
                continue;
            }
            let Some(value) = visible.get(&entry.path).filter(|v| !v.is_empty()) else {
                continue;
            };
            if let Err(message) = entry.validator.validate(value, &visible).await {
                errors.record(entry.path.clone(), message);
            }
        }

        tracing::debug!(step = %self.step_id, errors = errors.len(), "step validated");
        errors.into_result()
    }

    /// Validates a single path, as on blur. Returns the first error.
    pub async fn validate_field(&self, path: &str, values: &FormValues) -> Option<String> {
        if !self.is_visible(path, values) {
            return None;
        }
        let visible = self.visible_values(values);

        if let Some(entry) = self.fields.iter().find(|e| e.definition.id == path) {
            if let Err(message) = entry.rule.check(visible.get(path)) {
                return Some(message);
            }
        }

        for rule in self.rules.iter().filter(|r| r.path() == path) {
            if let Err(message) = rule.validate(&visible) {
                return Some(message);
            }
        }

        let value = visible.get(path).filter(|v| !v.is_empty())?;
        for entry in self.async_validators.iter().filter(|e| e.path == path) {
            if let Err(message) = entry.validator.validate(value, &visible).await {
                return Some(message);
            }
        }
        None
    }

    fn sync_errors(&self, values: &FormValues, visible: &FormValues) -> ValidationErrors {
        let mut errors = ValidationErrors::new();

        for entry in &self.fields {
            let id = &entry.definition.id;
            if !self.is_visible(id, values) {
                continue;
            }
            if let Err(message) = entry.rule.check(visible.get(id)) {
                errors.record(id.clone(), message);
            }
        }

        for rule in &self.rules {
            if !self.is_visible(rule.path(), values) {
                continue;
            }
            if let Err(message) = rule.validate(visible) {
                errors.record(rule.path(), message);
            }
        }
        errors
    }
}
