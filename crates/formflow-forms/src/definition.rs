//! Step and form definitions.
//!
//! A [`FormDefinition`] is an ordered, non-empty sequence of
//! [`StepDefinition`]s. Construction validates the structure once so the
//! rest of the engine can rely on it:
//!
//! - step ids and field ids are unique across the whole form
//! - every visibility rule and cross-field rule names a declared field
//! - visibility rules do not form a cycle
//! - every `pattern` compiles and `min <= max`
//!
//! Definitions can be built in code or loaded from JSON or TOML.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use formflow_core::{FormflowError, FormflowResult};

use crate::fields::{visibility_chain, FieldDefinition, VisibilityRule};
use crate::schema::{CrossFieldRule, CrossFieldValidator};
use crate::value::FormValues;

/// One page of a multi-step form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Unique step id.
    pub id: String,
    /// Title shown above the step.
    #[serde(default)]
    pub title: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The step's fields in display order.
    pub fields: Vec<FieldDefinition>,
    /// Whether the step counts towards the progress indicator.
    #[serde(default = "default_true")]
    pub show_in_progress: bool,
    /// Declarative cross-field rules for the step.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<CrossFieldRule>,
}

const fn default_true() -> bool {
    true
}

impl StepDefinition {
    /// Creates a step whose title is its id.
    pub fn new(id: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            description: None,
            fields,
            show_in_progress: true,
            rules: Vec::new(),
        }
    }

    /// Sets the title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Excludes the step from the progress indicator.
    #[must_use]
    pub const fn hidden_from_progress(mut self) -> Self {
        self.show_in_progress = false;
        self
    }

    /// Adds a cross-field rule.
    #[must_use]
    pub fn rule(mut self, rule: CrossFieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Returns the field with the given id.
    pub fn field(&self, id: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.id == id)
    }
}

/// A complete, validated form.
///
/// # Examples
///
/// ```
/// use formflow_forms::definition::{FormDefinition, StepDefinition};
/// use formflow_forms::fields::{FieldDefinition, FieldType};
///
/// let form = FormDefinition::new(
///     "signup",
///     vec![
///         StepDefinition::new("profile", vec![FieldDefinition::new("name", FieldType::Text)]),
///         StepDefinition::new("account", vec![FieldDefinition::new("email", FieldType::Email)]),
///     ],
/// )
/// .unwrap();
/// assert_eq!(form.step_count(), 2);
/// assert_eq!(form.step_of("email"), Some(1));
///
/// let duplicate = FormDefinition::new(
///     "broken",
///     vec![StepDefinition::new(
///         "only",
///         vec![
///             FieldDefinition::new("name", FieldType::Text),
///             FieldDefinition::new("name", FieldType::Text),
///         ],
///     )],
/// );
/// assert!(duplicate.is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDefinition {
    id: String,
    steps: Vec<StepDefinition>,
}

impl FormDefinition {
    /// Validates and creates a form definition.
    ///
    /// Empty labels are filled in from field ids.
    pub fn new(id: impl Into<String>, steps: Vec<StepDefinition>) -> FormflowResult<Self> {
        let mut form = Self {
            id: id.into(),
            steps,
        };
        form.fill_labels();
        form.validate()?;
        Ok(form)
    }

    /// Parses and validates a JSON definition.
    pub fn from_json_str(json: &str) -> FormflowResult<Self> {
        let raw: Self = serde_json::from_str(json)?;
        Self::new(raw.id, raw.steps)
    }

    /// Parses and validates a TOML definition.
    pub fn from_toml_str(toml_str: &str) -> FormflowResult<Self> {
        let raw: Self = toml::from_str(toml_str)
            .map_err(|e| FormflowError::InvalidDefinition(format!("TOML parse error: {e}")))?;
        Self::new(raw.id, raw.steps)
    }

    /// Loads a definition file, choosing the format by extension
    /// (`.toml`, otherwise JSON).
    pub fn from_file(path: impl AsRef<Path>) -> FormflowResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        if path.extension().is_some_and(|ext| ext == "toml") {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }

    /// Returns the form id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the steps in order.
    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    /// Returns the step at `index`.
    pub fn step(&self, index: usize) -> Option<&StepDefinition> {
        self.steps.get(index)
    }

    /// Returns the number of steps (always at least one).
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Iterates over every field of every step in order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.steps.iter().flat_map(|s| s.fields.iter())
    }

    /// Returns the field with the given id.
    pub fn field(&self, id: &str) -> Option<&FieldDefinition> {
        self.fields().find(|f| f.id == id)
    }

    /// Returns the index of the step declaring `field_id`.
    pub fn step_of(&self, field_id: &str) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| s.fields.iter().any(|f| f.id == field_id))
    }

    /// Returns every visibility rule `field_id` depends on, following
    /// watched fields through the whole form. Empty for unconditional or
    /// unknown fields.
    pub fn visibility_chain(&self, field_id: &str) -> Vec<VisibilityRule> {
        self.field(field_id)
            .map(|field| visibility_chain(field, |id| self.field(id)))
            .unwrap_or_default()
    }

    /// Returns `true` if `field_id` is declared and visible: its own rule
    /// holds and the field it watches is itself visible.
    pub fn is_field_visible(&self, field_id: &str, values: &FormValues) -> bool {
        self.field(field_id).is_some()
            && self
                .visibility_chain(field_id)
                .iter()
                .all(|rule| rule.holds(values))
    }

    /// Returns the values of declared, visible fields.
    pub fn visible_values(&self, values: &FormValues) -> FormValues {
        self.fields()
            .filter(|f| self.is_field_visible(&f.id, values))
            .filter_map(|f| values.get(&f.id).map(|v| (f.id.clone(), v.clone())))
            .collect()
    }

    fn fill_labels(&mut self) {
        for field in self.steps.iter_mut().flat_map(|s| s.fields.iter_mut()) {
            if field.label.is_empty() {
                field.label = field.display_label();
            }
        }
    }

    fn validate(&self) -> FormflowResult<()> {
        let invalid = |msg: String| Err(FormflowError::InvalidDefinition(msg));

        if self.steps.is_empty() {
            return invalid(format!("form '{}' has no steps", self.id));
        }

        let mut step_ids = HashSet::new();
        let mut field_ids = HashSet::new();
        for step in &self.steps {
            if !step_ids.insert(step.id.as_str()) {
                return invalid(format!("duplicate step id '{}'", step.id));
            }
            for field in &step.fields {
                if !field_ids.insert(field.id.as_str()) {
                    return invalid(format!("duplicate field id '{}'", field.id));
                }
            }
        }

        for field in self.fields() {
            if let Some(pattern) = &field.pattern {
                if let Err(e) = Regex::new(pattern) {
                    return invalid(format!("field '{}' has an invalid pattern: {e}", field.id));
                }
            }
            if let (Some(min), Some(max)) = (field.min, field.max) {
                if min > max {
                    return invalid(format!("field '{}' has min {min} above max {max}", field.id));
                }
            }
            if let Some(rule) = &field.visible_when {
                if rule.field == field.id {
                    return invalid(format!("field '{}' cannot depend on itself", field.id));
                }
                if !field_ids.contains(rule.field.as_str()) {
                    return invalid(format!(
                        "field '{}' is shown depending on unknown field '{}'",
                        field.id, rule.field
                    ));
                }
            }
        }

        for field in self.fields() {
            let mut watched = field.visible_when.as_ref().map(|r| r.field.as_str());
            let mut hops = 0;
            while let Some(id) = watched {
                if id == field.id || hops > field_ids.len() {
                    return invalid(format!("visibility of field '{}' depends on itself", field.id));
                }
                hops += 1;
                watched = self
                    .field(id)
                    .and_then(|f| f.visible_when.as_ref())
                    .map(|r| r.field.as_str());
            }
        }

        for step in &self.steps {
            for rule in &step.rules {
                if let Some(unknown) = rule.fields().into_iter().find(|f| !field_ids.contains(f)) {
                    return invalid(format!(
                        "a rule in step '{}' refers to unknown field '{unknown}'",
                        step.id
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldType;
    use crate::value::Value;

    fn text(id: &str) -> FieldDefinition {
        FieldDefinition::new(id, FieldType::Text)
    }

    fn expect_invalid(result: FormflowResult<FormDefinition>, needle: &str) {
        match result {
            Err(FormflowError::InvalidDefinition(msg)) => assert!(msg.contains(needle), "{msg}"),
            other => panic!("expected InvalidDefinition, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_empty_form() {
        expect_invalid(FormDefinition::new("f", vec![]), "no steps");
    }

    #[test]
    fn test_rejects_duplicate_ids_across_steps() {
        expect_invalid(
            FormDefinition::new(
                "f",
                vec![
                    StepDefinition::new("a", vec![text("name")]),
                    StepDefinition::new("b", vec![text("name")]),
                ],
            ),
            "duplicate field id 'name'",
        );
        expect_invalid(
            FormDefinition::new(
                "f",
                vec![
                    StepDefinition::new("a", vec![text("x")]),
                    StepDefinition::new("a", vec![text("y")]),
                ],
            ),
            "duplicate step id",
        );
    }

    #[test]
    fn test_rejects_dangling_references() {
        let hidden = text("phone").visible_when(VisibilityRule::equals("method", "phone"));
        expect_invalid(
            FormDefinition::new("f", vec![StepDefinition::new("a", vec![hidden])]),
            "unknown field 'method'",
        );

        let step = StepDefinition::new("a", vec![text("password")])
            .rule(CrossFieldRule::matches("confirm", "password"));
        expect_invalid(FormDefinition::new("f", vec![step]), "unknown field 'confirm'");
    }

    #[test]
    fn test_rejects_bad_constraints() {
        let bad_pattern = text("code").pattern("([");
        expect_invalid(
            FormDefinition::new("f", vec![StepDefinition::new("a", vec![bad_pattern])]),
            "invalid pattern",
        );
        let inverted = FieldDefinition::new("n", FieldType::Number).min(5.0).max(1.0);
        expect_invalid(
            FormDefinition::new("f", vec![StepDefinition::new("a", vec![inverted])]),
            "above max",
        );
    }

    #[test]
    fn test_rejects_visibility_cycles() {
        let a = text("a").visible_when(VisibilityRule::is_not_empty("b"));
        let b = text("b").visible_when(VisibilityRule::is_not_empty("c"));
        let c = text("c").visible_when(VisibilityRule::is_not_empty("a"));
        expect_invalid(
            FormDefinition::new("f", vec![StepDefinition::new("s", vec![a, b, c])]),
            "depends on itself",
        );
    }

    #[test]
    fn test_field_hidden_when_watched_field_is_hidden() {
        let form = FormDefinition::new(
            "f",
            vec![
                StepDefinition::new(
                    "work",
                    vec![
                        FieldDefinition::new("employed", FieldType::Switch),
                        text("employer").visible_when(VisibilityRule::equals("employed", true)),
                    ],
                ),
                StepDefinition::new(
                    "contact",
                    vec![text("employer_phone").visible_when(VisibilityRule::is_not_empty("employer"))],
                ),
            ],
        )
        .unwrap();

        let mut values = FormValues::new();
        values.insert("employed".into(), Value::Bool(true));
        values.insert("employer".into(), Value::from("Acme"));
        values.insert("employer_phone".into(), Value::from("5551234567"));
        assert!(form.is_field_visible("employer_phone", &values));
        assert_eq!(form.visible_values(&values).len(), 3);

        values.insert("employed".into(), Value::Bool(false));
        assert!(!form.is_field_visible("employer", &values));
        assert!(!form.is_field_visible("employer_phone", &values));
        let visible = form.visible_values(&values);
        assert_eq!(visible.len(), 1);
        assert!(visible.contains_key("employed"));
        assert!(!form.is_field_visible("unknown", &values));
    }

    #[test]
    fn test_visibility_may_reference_other_steps() {
        let form = FormDefinition::new(
            "f",
            vec![
                StepDefinition::new("a", vec![text("method")]),
                StepDefinition::new(
                    "b",
                    vec![text("phone").visible_when(VisibilityRule::equals("method", "phone"))],
                ),
            ],
        );
        assert!(form.is_ok());
    }

    #[test]
    fn test_from_json() {
        let form = FormDefinition::from_json_str(
            r#"{
                "id": "signup",
                "steps": [
                    {
                        "id": "account",
                        "title": "Account",
                        "fields": [
                            {"id": "email", "type": "email", "required": true},
                            {"id": "password", "type": "password", "required": true},
                            {"id": "confirm_password", "type": "password", "label": "Confirmation"}
                        ],
                        "rules": [
                            {"kind": "matches", "field": "confirm_password", "other": "password"}
                        ]
                    }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(form.id(), "signup");
        let step = form.step(0).unwrap();
        assert!(step.show_in_progress);
        assert_eq!(step.rules.len(), 1);
        assert_eq!(form.field("email").unwrap().label, "email");
        assert_eq!(form.field("confirm_password").unwrap().label, "Confirmation");
    }

    #[test]
    fn test_from_toml() {
        let form = FormDefinition::from_toml_str(
            r#"
            id = "survey"

            [[steps]]
            id = "about"
            show_in_progress = false

            [[steps.fields]]
            id = "age"
            type = "number"
            required = true
            min = 18
            max = 100
            "#,
        )
        .unwrap();
        let age = form.field("age").unwrap();
        assert_eq!(age.field_type, FieldType::Number);
        assert_eq!(age.min, Some(18.0));
        assert!(!form.step(0).unwrap().show_in_progress);
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("form.json");
        std::fs::write(
            &path,
            r#"{"id":"f","steps":[{"id":"a","fields":[{"id":"x","type":"text"}]}]}"#,
        )
        .unwrap();
        assert_eq!(FormDefinition::from_file(&path).unwrap().step_count(), 1);

        let missing = FormDefinition::from_file(dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(FormflowError::IoError(_))));
    }

    #[test]
    fn test_invalid_json_is_serialization_error() {
        let err = FormDefinition::from_json_str("{").unwrap_err();
        assert_eq!(err.code(), "serialization");
    }
}
