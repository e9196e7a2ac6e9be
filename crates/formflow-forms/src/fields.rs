//! Field definitions.
//!
//! Each [`FieldDefinition`] describes one input: its id, its [`FieldType`],
//! its constraints, and an optional [`VisibilityRule`] that hides it based on
//! other values. Definitions are immutable once a form is configured; the
//! builder methods exist for constructing them in code.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::value::{FormValues, Value};

/// The closed set of field types.
///
/// Adding a type is a compile-time-checked change: the rule builder and the
/// render dispatcher both match on this enum exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Free text.
    Text,
    /// An email address.
    Email,
    /// A password.
    Password,
    /// A number with optional bounds.
    Number,
    /// A date string.
    Date,
    /// A single choice from a drop-down.
    Select,
    /// A single choice from a radio group.
    Radio,
    /// A boolean checkbox.
    Checkbox,
    /// A boolean toggle.
    Switch,
    /// A file upload.
    File,
    /// A URL.
    Url,
    /// A phone number.
    Tel,
    /// A search box.
    Search,
    /// A `#rrggbb` color.
    Color,
    /// A number picked on a slider.
    Range,
    /// Multi-line text.
    Textarea,
}

impl FieldType {
    /// Every field type, in declaration order.
    pub const ALL: [Self; 16] = [
        Self::Text,
        Self::Email,
        Self::Password,
        Self::Number,
        Self::Date,
        Self::Select,
        Self::Radio,
        Self::Checkbox,
        Self::Switch,
        Self::File,
        Self::Url,
        Self::Tel,
        Self::Search,
        Self::Color,
        Self::Range,
        Self::Textarea,
    ];

    /// Returns the lowercase name used in definitions.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Email => "email",
            Self::Password => "password",
            Self::Number => "number",
            Self::Date => "date",
            Self::Select => "select",
            Self::Radio => "radio",
            Self::Checkbox => "checkbox",
            Self::Switch => "switch",
            Self::File => "file",
            Self::Url => "url",
            Self::Tel => "tel",
            Self::Search => "search",
            Self::Color => "color",
            Self::Range => "range",
            Self::Textarea => "textarea",
        }
    }

    /// Returns `true` for types whose value is a string.
    pub const fn is_string_like(self) -> bool {
        !matches!(
            self,
            Self::Number | Self::Range | Self::Checkbox | Self::Switch | Self::File
        )
    }

    /// Returns `true` for `number` and `range`.
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Number | Self::Range)
    }

    /// Returns `true` for `checkbox` and `switch`.
    pub const fn is_boolean(self) -> bool {
        matches!(self, Self::Checkbox | Self::Switch)
    }

    /// Returns `true` for types offering a fixed set of choices.
    pub const fn has_options(self) -> bool {
        matches!(self, Self::Select | Self::Radio)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown field type '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

/// Comparison used by a [`VisibilityRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityOperator {
    /// The watched value equals the rule value.
    Equals,
    /// The watched value differs from the rule value.
    NotEquals,
    /// The watched value is one of the rule's list.
    In,
    /// The watched value is none of the rule's list.
    NotIn,
    /// The watched value is numerically greater than the rule value.
    GreaterThan,
    /// The watched value is numerically less than the rule value.
    LessThan,
    /// The watched value is absent or empty.
    IsEmpty,
    /// The watched value is present and non-empty.
    IsNotEmpty,
}

/// Shows a field only while another field's value satisfies a comparison.
///
/// # Examples
///
/// ```
/// use formflow_forms::fields::VisibilityRule;
/// use formflow_forms::value::{FormValues, Value};
///
/// let rule = VisibilityRule::equals("contact_method", "phone");
/// let mut values = FormValues::new();
/// assert!(!rule.holds(&values));
/// values.insert("contact_method".into(), Value::from("phone"));
/// assert!(rule.holds(&values));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityRule {
    /// The watched field id.
    pub field: String,
    /// The comparison.
    pub operator: VisibilityOperator,
    /// The comparison operand; a list for `in`/`not_in`, unused for the
    /// emptiness checks.
    #[serde(default)]
    pub value: Value,
}

impl VisibilityRule {
    /// Creates a rule.
    pub fn new(field: impl Into<String>, operator: VisibilityOperator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Shorthand for an `equals` rule.
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, VisibilityOperator::Equals, value)
    }

    /// Shorthand for an `is_not_empty` rule.
    pub fn is_not_empty(field: impl Into<String>) -> Self {
        Self::new(field, VisibilityOperator::IsNotEmpty, Value::Null)
    }

    /// Evaluates the rule against the current values. An absent watched
    /// field compares as `Null`.
    pub fn holds(&self, values: &FormValues) -> bool {
        let actual = values.get(&self.field).unwrap_or(&Value::Null);
        match self.operator {
            VisibilityOperator::Equals => actual.loosely_equals(&self.value),
            VisibilityOperator::NotEquals => !actual.loosely_equals(&self.value),
            VisibilityOperator::In => self.contains(actual),
            VisibilityOperator::NotIn => !self.contains(actual),
            VisibilityOperator::GreaterThan => {
                matches!((actual.as_f64(), self.value.as_f64()), (Some(a), Some(b)) if a > b)
            }
            VisibilityOperator::LessThan => {
                matches!((actual.as_f64(), self.value.as_f64()), (Some(a), Some(b)) if a < b)
            }
            VisibilityOperator::IsEmpty => actual.is_empty(),
            VisibilityOperator::IsNotEmpty => !actual.is_empty(),
        }
    }

    fn contains(&self, actual: &Value) -> bool {
        match &self.value {
            Value::List(items) => items.iter().any(|item| actual.loosely_equals(item)),
            single => actual.loosely_equals(single),
        }
    }
}

// ---------------------------------------------------------------------------
// Field definition
// ---------------------------------------------------------------------------

/// One selectable option of a `select` or `radio` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    /// The submitted value.
    pub value: String,
    /// The displayed label.
    pub label: String,
}

impl FieldOption {
    /// Creates an option.
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Complete definition of a form field.
///
/// # Examples
///
/// ```
/// use formflow_forms::fields::{FieldDefinition, FieldType};
///
/// let age = FieldDefinition::new("age", FieldType::Number)
///     .required(true)
///     .min(18.0)
///     .max(100.0);
/// assert_eq!(age.label, "age");
/// assert_eq!(age.min, Some(18.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Unique id within the form; may be a dot-path such as `address.city`.
    pub id: String,
    /// The declared type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Human-readable label used in messages. Defaults to the id with
    /// `_` and `.` replaced by spaces.
    #[serde(default)]
    pub label: String,
    /// Whether a value must be present.
    #[serde(default)]
    pub required: bool,
    /// Lower bound: a value for numeric types, a length for text types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Upper bound: a value for numeric types, a length for text types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// A regular expression string values must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Allowed choices for `select`/`radio`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    /// Placeholder text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Help text displayed alongside the field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    /// The initial value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Hides the field unless the rule holds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_when: Option<VisibilityRule>,
}

impl FieldDefinition {
    /// Creates an optional field with a label derived from the id.
    pub fn new(id: impl Into<String>, field_type: FieldType) -> Self {
        let id = id.into();
        let label = label_from_id(&id);
        Self {
            id,
            field_type,
            label,
            required: false,
            min: None,
            max: None,
            pattern: None,
            options: Vec::new(),
            placeholder: None,
            help_text: None,
            default: None,
            visible_when: None,
        }
    }

    /// Sets whether this field is required.
    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Sets the label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the lower bound.
    #[must_use]
    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Sets the upper bound.
    #[must_use]
    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Sets the pattern.
    #[must_use]
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Adds a choice.
    #[must_use]
    pub fn option(mut self, value: impl Into<String>, label: impl Into<String>) -> Self {
        self.options.push(FieldOption::new(value, label));
        self
    }

    /// Sets the placeholder.
    #[must_use]
    pub fn placeholder(mut self, text: impl Into<String>) -> Self {
        self.placeholder = Some(text.into());
        self
    }

    /// Sets the help text.
    #[must_use]
    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = Some(text.into());
        self
    }

    /// Sets the initial value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Makes the field conditional.
    #[must_use]
    pub fn visible_when(mut self, rule: VisibilityRule) -> Self {
        self.visible_when = Some(rule);
        self
    }

    /// Returns the label, deriving one from the id when none was given.
    pub fn display_label(&self) -> String {
        if self.label.is_empty() {
            label_from_id(&self.id)
        } else {
            self.label.clone()
        }
    }

    /// Returns `true` if the field has no visibility rule or its own rule
    /// holds. The watched field's visibility is not considered; see
    /// [`FormDefinition::is_field_visible`](crate::definition::FormDefinition::is_field_visible).
    pub fn is_visible(&self, values: &FormValues) -> bool {
        self.visible_when
            .as_ref()
            .map_or(true, |rule| rule.holds(values))
    }
}

/// Collects the visibility rules `field` depends on: its own rule, the
/// rule of the field it watches, and so on up the chain.
///
/// `lookup` resolves watched ids; the chain stops at an id it cannot
/// resolve or at a field already visited.
pub fn visibility_chain<'a, F>(field: &'a FieldDefinition, lookup: F) -> Vec<VisibilityRule>
where
    F: Fn(&str) -> Option<&'a FieldDefinition>,
{
    let mut chain = Vec::new();
    let mut seen = vec![field.id.as_str()];
    let mut current = field;
    while let Some(rule) = &current.visible_when {
        chain.push(rule.clone());
        match lookup(&rule.field) {
            Some(next) if !seen.contains(&next.id.as_str()) => {
                seen.push(next.id.as_str());
                current = next;
            }
            _ => break,
        }
    }
    chain
}

fn label_from_id(id: &str) -> String {
    id.replace(['_', '.'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_round_trips_through_str() {
        for t in FieldType::ALL {
            assert_eq!(t.as_str().parse::<FieldType>().unwrap(), t);
        }
        assert!("slider".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_string_like_types() {
        assert!(FieldType::Email.is_string_like());
        assert!(FieldType::Date.is_string_like());
        assert!(!FieldType::Number.is_string_like());
        assert!(!FieldType::Switch.is_string_like());
        assert!(!FieldType::File.is_string_like());
    }

    #[test]
    fn test_default_label() {
        let field = FieldDefinition::new("first_name", FieldType::Text);
        assert_eq!(field.label, "first name");
        let nested = FieldDefinition::new("address.postal_code", FieldType::Text);
        assert_eq!(nested.display_label(), "address postal code");
    }

    #[test]
    fn test_deserialize_minimal_field() {
        let field: FieldDefinition =
            serde_json::from_str(r#"{"id":"email","type":"email","required":true}"#).unwrap();
        assert_eq!(field.field_type, FieldType::Email);
        assert!(field.required);
        assert!(field.label.is_empty());
        assert_eq!(field.display_label(), "email");
    }

    fn values(pairs: &[(&str, Value)]) -> FormValues {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_visibility_operators() {
        let v = values(&[("plan", Value::from("pro")), ("seats", Value::Int(5))]);

        assert!(VisibilityRule::equals("plan", "pro").holds(&v));
        assert!(VisibilityRule::new("plan", VisibilityOperator::NotEquals, "free").holds(&v));
        assert!(
            VisibilityRule::new("plan", VisibilityOperator::In, vec!["pro", "team"]).holds(&v)
        );
        assert!(!VisibilityRule::new("plan", VisibilityOperator::NotIn, vec!["pro"]).holds(&v));
        assert!(VisibilityRule::new("seats", VisibilityOperator::GreaterThan, 3).holds(&v));
        assert!(!VisibilityRule::new("seats", VisibilityOperator::LessThan, 3).holds(&v));
        assert!(VisibilityRule::new("notes", VisibilityOperator::IsEmpty, Value::Null).holds(&v));
        assert!(VisibilityRule::is_not_empty("plan").holds(&v));
    }

    #[test]
    fn test_numeric_comparison_needs_numbers() {
        let v = values(&[("age", Value::from("abc"))]);
        assert!(!VisibilityRule::new("age", VisibilityOperator::GreaterThan, 1).holds(&v));
        assert!(!VisibilityRule::new("age", VisibilityOperator::LessThan, 1).holds(&v));
    }

    #[test]
    fn test_field_visibility() {
        let field = FieldDefinition::new("phone", FieldType::Tel)
            .visible_when(VisibilityRule::equals("contact", "phone"));
        assert!(!field.is_visible(&FormValues::new()));
        assert!(field.is_visible(&values(&[("contact", Value::from("phone"))])));
        assert!(FieldDefinition::new("x", FieldType::Text).is_visible(&FormValues::new()));
    }

    #[test]
    fn test_visibility_chain_follows_watched_fields() {
        let fields = [
            FieldDefinition::new("employed", FieldType::Switch),
            FieldDefinition::new("employer", FieldType::Text)
                .visible_when(VisibilityRule::equals("employed", true)),
            FieldDefinition::new("employer_phone", FieldType::Tel)
                .visible_when(VisibilityRule::is_not_empty("employer")),
        ];
        let lookup = |id: &str| fields.iter().find(|f| f.id == id);

        let chain = visibility_chain(&fields[2], lookup);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].field, "employer");
        assert_eq!(chain[1].field, "employed");
        assert!(visibility_chain(&fields[0], lookup).is_empty());

        let stale = values(&[("employed", Value::Bool(false)), ("employer", Value::from("Acme"))]);
        assert!(fields[2].is_visible(&stale));
        assert!(!chain.iter().all(|rule| rule.holds(&stale)));
    }

    #[test]
    fn test_visibility_chain_stops_on_cycles() {
        let fields = [
            FieldDefinition::new("a", FieldType::Text).visible_when(VisibilityRule::is_not_empty("b")),
            FieldDefinition::new("b", FieldType::Text).visible_when(VisibilityRule::is_not_empty("a")),
        ];
        let chain = visibility_chain(&fields[0], |id| fields.iter().find(|f| f.id == id));
        assert_eq!(chain.len(), 2);
    }
}
