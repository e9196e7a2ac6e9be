//! Render dispatch from field types to widgets.
//!
//! Every [`FieldType`] maps to exactly one [`WidgetKind`] through
//! [`widget_for`]. A [`FieldRenderer`] turns a widget kind plus the field's
//! [`FieldProps`] into whatever output the host needs; [`HtmlRenderer`]
//! produces escaped HTML strings.

use std::fmt;
use std::fmt::Write as _;

use formflow_core::{FormflowError, FormflowResult};

use crate::engine::MultiStepForm;
use crate::fields::{FieldDefinition, FieldType};
use crate::value::Value;

/// The closed set of widgets a field can be rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    /// `<input type="text">`.
    TextInput,
    /// `<input type="email">`.
    EmailInput,
    /// `<input type="password">`.
    PasswordInput,
    /// `<input type="number">`.
    NumberInput,
    /// `<input type="date">`.
    DateInput,
    /// `<select>`.
    Select,
    /// A group of `<input type="radio">` elements.
    RadioGroup,
    /// `<input type="checkbox">`.
    Checkbox,
    /// A checkbox styled as a toggle.
    Switch,
    /// `<input type="file">`.
    FileInput,
    /// `<input type="url">`.
    UrlInput,
    /// `<input type="tel">`.
    TelInput,
    /// `<input type="search">`.
    SearchInput,
    /// `<input type="color">`.
    ColorPicker,
    /// `<input type="range">`.
    RangeSlider,
    /// `<textarea>`.
    Textarea,
}

impl WidgetKind {
    /// Returns the widget name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TextInput => "TextInput",
            Self::EmailInput => "EmailInput",
            Self::PasswordInput => "PasswordInput",
            Self::NumberInput => "NumberInput",
            Self::DateInput => "DateInput",
            Self::Select => "Select",
            Self::RadioGroup => "RadioGroup",
            Self::Checkbox => "Checkbox",
            Self::Switch => "Switch",
            Self::FileInput => "FileInput",
            Self::UrlInput => "UrlInput",
            Self::TelInput => "TelInput",
            Self::SearchInput => "SearchInput",
            Self::ColorPicker => "ColorPicker",
            Self::RangeSlider => "RangeSlider",
            Self::Textarea => "Textarea",
        }
    }

    /// Returns the `type` attribute for widgets rendered as `<input>`.
    pub const fn input_type(self) -> Option<&'static str> {
        match self {
            Self::TextInput => Some("text"),
            Self::EmailInput => Some("email"),
            Self::PasswordInput => Some("password"),
            Self::NumberInput => Some("number"),
            Self::DateInput => Some("date"),
            Self::Checkbox | Self::Switch => Some("checkbox"),
            Self::FileInput => Some("file"),
            Self::UrlInput => Some("url"),
            Self::TelInput => Some("tel"),
            Self::SearchInput => Some("search"),
            Self::ColorPicker => Some("color"),
            Self::RangeSlider => Some("range"),
            Self::Select | Self::RadioGroup | Self::Textarea => None,
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the widget for a field type.
pub const fn widget_for(field_type: FieldType) -> WidgetKind {
    match field_type {
        FieldType::Text => WidgetKind::TextInput,
        FieldType::Email => WidgetKind::EmailInput,
        FieldType::Password => WidgetKind::PasswordInput,
        FieldType::Number => WidgetKind::NumberInput,
        FieldType::Date => WidgetKind::DateInput,
        FieldType::Select => WidgetKind::Select,
        FieldType::Radio => WidgetKind::RadioGroup,
        FieldType::Checkbox => WidgetKind::Checkbox,
        FieldType::Switch => WidgetKind::Switch,
        FieldType::File => WidgetKind::FileInput,
        FieldType::Url => WidgetKind::UrlInput,
        FieldType::Tel => WidgetKind::TelInput,
        FieldType::Search => WidgetKind::SearchInput,
        FieldType::Color => WidgetKind::ColorPicker,
        FieldType::Range => WidgetKind::RangeSlider,
        FieldType::Textarea => WidgetKind::Textarea,
    }
}

/// What a renderer receives for one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldProps<'a> {
    /// The field's definition.
    pub definition: &'a FieldDefinition,
    /// The current value, if any.
    pub value: Option<&'a Value>,
    /// The error to display, already filtered by visibility rules.
    pub error: Option<&'a str>,
    /// `true` while the form is submitting.
    pub disabled: bool,
}

/// Turns a widget and its props into output.
pub trait FieldRenderer {
    /// The rendered form of one field.
    type Output;

    /// Renders one field.
    fn render(&self, widget: WidgetKind, props: &FieldProps<'_>) -> Self::Output;
}

/// Dispatches the active step's fields to a [`FieldRenderer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderDispatcher;

impl RenderDispatcher {
    /// Renders the visible fields of the active step in order.
    pub fn render_step<R: FieldRenderer>(form: &MultiStepForm, renderer: &R) -> Vec<R::Output> {
        form.visible_fields()
            .into_iter()
            .map(|definition| renderer.render(widget_for(definition.field_type), &props(form, definition)))
            .collect()
    }

    /// Renders one field by id, visible or not.
    pub fn render_field<R: FieldRenderer>(
        form: &MultiStepForm,
        id: &str,
        renderer: &R,
    ) -> FormflowResult<R::Output> {
        let definition = form
            .definition()
            .field(id)
            .ok_or_else(|| FormflowError::UnknownField(id.to_string()))?;
        Ok(renderer.render(widget_for(definition.field_type), &props(form, definition)))
    }
}

fn props<'a>(form: &'a MultiStepForm, definition: &'a FieldDefinition) -> FieldProps<'a> {
    FieldProps {
        definition,
        value: form.value(&definition.id),
        error: form.visible_error(&definition.id),
        disabled: form.is_submitting(),
    }
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

/// Renders fields as HTML strings.
///
/// Each field is wrapped in a `<div class="field">` holding the label, the
/// widget, optional help text, and the visible error. All user-provided text
/// is escaped.
#[derive(Debug, Clone, Default)]
pub struct HtmlRenderer {
    id_prefix: String,
}

impl HtmlRenderer {
    /// Creates a renderer whose element ids are the field ids.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefixes every element id, for pages with several forms.
    #[must_use]
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    fn element_id(&self, field_id: &str) -> String {
        let id = field_id.replace('.', "_");
        if self.id_prefix.is_empty() {
            id
        } else {
            format!("{}_{id}", self.id_prefix)
        }
    }

    fn widget(&self, widget: WidgetKind, props: &FieldProps<'_>, element_id: &str) -> String {
        let def = props.definition;
        let name = escape_html(&def.id);
        let current = props.value.map(ToString::to_string).unwrap_or_default();
        let mut attrs = Vec::new();
        if def.required {
            attrs.push("required".to_string());
        }
        if props.disabled {
            attrs.push("disabled".to_string());
        }
        if props.error.is_some() {
            attrs.push(r#"aria-invalid="true""#.to_string());
        }

        match widget {
            WidgetKind::Textarea => format!(
                r#"<textarea name="{name}" id="{element_id}"{}{}>{}</textarea>"#,
                placeholder_attr(def),
                render_attrs(&attrs),
                escape_html(&current)
            ),
            WidgetKind::Select => {
                let mut options = String::from(r#"<option value=""></option>"#);
                for option in &def.options {
                    let selected = if option.value == current { " selected" } else { "" };
                    let _ = write!(
                        options,
                        r#"<option value="{}"{selected}>{}</option>"#,
                        escape_html(&option.value),
                        escape_html(&option.label)
                    );
                }
                format!(
                    r#"<select name="{name}" id="{element_id}"{}>{options}</select>"#,
                    render_attrs(&attrs)
                )
            }
            WidgetKind::RadioGroup => {
                let mut html = format!(r#"<div id="{element_id}" role="radiogroup">"#);
                for (i, option) in def.options.iter().enumerate() {
                    let checked = if option.value == current { " checked" } else { "" };
                    let option_id = format!("{element_id}_{i}");
                    let _ = write!(
                        html,
                        r#"<div><input type="radio" name="{name}" value="{}" id="{option_id}"{checked}{} /> <label for="{option_id}">{}</label></div>"#,
                        escape_html(&option.value),
                        render_attrs(&attrs),
                        escape_html(&option.label)
                    );
                }
                html.push_str("</div>");
                html
            }
            WidgetKind::Checkbox | WidgetKind::Switch => {
                let checked = if props.value.and_then(Value::as_bool) == Some(true) {
                    " checked"
                } else {
                    ""
                };
                let role = if widget == WidgetKind::Switch {
                    r#" role="switch""#
                } else {
                    ""
                };
                format!(
                    r#"<input type="checkbox" name="{name}" id="{element_id}"{role}{checked}{} />"#,
                    render_attrs(&attrs)
                )
            }
            WidgetKind::FileInput => format!(
                r#"<input type="file" name="{name}" id="{element_id}"{} />"#,
                render_attrs(&attrs)
            ),
            other => {
                let input_type = other.input_type().unwrap_or("text");
                // Passwords are never echoed back.
                let value = if other == WidgetKind::PasswordInput {
                    String::new()
                } else {
                    escape_html(&current)
                };
                if matches!(other, WidgetKind::NumberInput | WidgetKind::RangeSlider) {
                    if let Some(min) = def.min {
                        attrs.push(format!(r#"min="{min}""#));
                    }
                    if let Some(max) = def.max {
                        attrs.push(format!(r#"max="{max}""#));
                    }
                }
                format!(
                    r#"<input type="{input_type}" name="{name}" id="{element_id}" value="{value}"{}{} />"#,
                    placeholder_attr(def),
                    render_attrs(&attrs)
                )
            }
        }
    }
}

impl FieldRenderer for HtmlRenderer {
    type Output = String;

    fn render(&self, widget: WidgetKind, props: &FieldProps<'_>) -> String {
        let def = props.definition;
        let element_id = self.element_id(&def.id);
        let class = if props.error.is_some() {
            "field has-error"
        } else {
            "field"
        };

        let mut html = format!(r#"<div class="{class}" data-widget="{widget}">"#);
        let _ = write!(
            html,
            r#"<label for="{element_id}">{}</label>"#,
            escape_html(&def.display_label())
        );
        html.push_str(&self.widget(widget, props, &element_id));
        if let Some(help) = &def.help_text {
            let _ = write!(html, r#"<p class="help">{}</p>"#, escape_html(help));
        }
        if let Some(error) = props.error {
            let _ = write!(html, r#"<p class="error" role="alert">{}</p>"#, escape_html(error));
        }
        html.push_str("</div>");
        html
    }
}

fn placeholder_attr(def: &FieldDefinition) -> String {
    def.placeholder
        .as_deref()
        .map(|p| format!(r#" placeholder="{}""#, escape_html(p)))
        .unwrap_or_default()
}

fn render_attrs(attrs: &[String]) -> String {
    attrs.iter().map(|a| format!(" {a}")).collect()
}

/// Escapes HTML special characters.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
