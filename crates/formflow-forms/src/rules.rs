//! Field rules: the per-type validation table.
//!
//! [`FieldRule::build`] turns a [`FieldDefinition`] into a rule that accepts
//! or rejects a candidate value. The rule is a pure function of the
//! definition; building twice yields rules that behave identically.
//!
//! Check order, stopping at the first failure:
//! 1. Presence (`required`); absent or empty optional values always pass
//! 2. The type check from the table below
//! 3. Bounds (`min`/`max`), options, then `pattern`
//!
//! | Type | Accepts |
//! |---|---|
//! | text, textarea, search | any string; bounds are lengths |
//! | email | `local@domain.tld` |
//! | password | strings of at least 8 characters (or `min`, if larger) |
//! | url | absolute `http`/`https` URLs |
//! | tel | an optional `+`, a leading non-zero digit, 7 to 20 characters |
//! | number, range | integers, floats, numeric strings; bounds are values |
//! | date, select, radio | non-empty strings |
//! | checkbox, switch | booleans |
//! | file | anything |
//! | color | `#rrggbb` |

use once_cell::sync::Lazy;
use regex::Regex;

use crate::fields::{FieldDefinition, FieldType};
use crate::value::Value;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9\-]+(\.[a-zA-Z0-9\-]+)*\.[a-zA-Z]{2,}$")
        .expect("valid regex")
});

static TEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[1-9][0-9 ()\-]{6,19}$").expect("valid regex"));

static COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid regex"));

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// A compiled validation rule for one field.
#[derive(Debug, Clone)]
pub struct FieldRule {
    field_type: FieldType,
    label: String,
    required: bool,
    min: Option<f64>,
    max: Option<f64>,
    pattern: Option<Regex>,
    options: Vec<String>,
}

impl FieldRule {
    /// Builds the rule for `field`.
    ///
    /// A pattern that does not compile is dropped with a warning;
    /// [`FormDefinition::new`](crate::definition::FormDefinition::new)
    /// rejects such definitions up front.
    pub fn build(field: &FieldDefinition) -> Self {
        let pattern = field.pattern.as_deref().and_then(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!(field = %field.id, pattern = p, error = %e, "ignoring invalid pattern");
                None
            }
        });
        Self {
            field_type: field.field_type,
            label: field.display_label(),
            required: field.required,
            min: field.min,
            max: field.max,
            pattern,
            options: field.options.iter().map(|o| o.value.clone()).collect(),
        }
    }

    /// Returns the field type the rule was built for.
    pub const fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Returns `true` if the rule demands a value.
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Checks a candidate value, returning the first failing message.
    pub fn check(&self, value: Option<&Value>) -> Result<(), String> {
        let value = match value {
            Some(v) if !v.is_empty() => v,
            _ if self.required => return Err(format!("{} is required", self.label)),
            _ => return Ok(()),
        };

        self.check_type(value)?;

        if !self.options.is_empty() && self.field_type.has_options() {
            let chosen = value.as_str().unwrap_or_default();
            if !self.options.iter().any(|o| o == chosen) {
                return Err("Invalid selection".to_string());
            }
        }

        if let (Some(re), Some(s)) = (&self.pattern, value.as_str()) {
            if !re.is_match(s) {
                return Err(format!("{} has an invalid format", self.label));
            }
        }
        Ok(())
    }

    fn check_type(&self, value: &Value) -> Result<(), String> {
        match self.field_type {
            FieldType::Text | FieldType::Textarea | FieldType::Search => {
                let s = value
                    .as_str()
                    .ok_or_else(|| format!("{} must be text", self.label))?;
                self.check_length(s, 0)
            }
            FieldType::Email => match value.as_str() {
                Some(s) if EMAIL_RE.is_match(s) => Ok(()),
                _ => Err("Invalid email address".to_string()),
            },
            FieldType::Password => {
                let s = value
                    .as_str()
                    .ok_or_else(|| format!("{} must be text", self.label))?;
                self.check_length(s, MIN_PASSWORD_LENGTH)
            }
            FieldType::Url => match value.as_str().map(url::Url::parse) {
                Some(Ok(u)) if matches!(u.scheme(), "http" | "https") && u.has_host() => Ok(()),
                _ => Err("Invalid URL".to_string()),
            },
            FieldType::Tel => match value.as_str() {
                Some(s) if TEL_RE.is_match(s.trim()) => Ok(()),
                _ => Err("Invalid phone number".to_string()),
            },
            FieldType::Number | FieldType::Range => {
                let n = value
                    .as_f64()
                    .ok_or_else(|| format!("{} must be a number", self.label))?;
                if let Some(min) = self.min {
                    if n < min {
                        return Err(format!("{} must be at least {min}", self.label));
                    }
                }
                if let Some(max) = self.max {
                    if n > max {
                        return Err(format!("{} must be at most {max}", self.label));
                    }
                }
                Ok(())
            }
            FieldType::Date | FieldType::Select | FieldType::Radio => match value.as_str() {
                Some(s) if !s.trim().is_empty() => Ok(()),
                Some(_) if !self.required => Ok(()),
                Some(_) => Err(format!("{} is required", self.label)),
                None if self.field_type == FieldType::Date => {
                    Err(format!("{} must be a valid date", self.label))
                }
                None => Err("Invalid selection".to_string()),
            },
            FieldType::Checkbox | FieldType::Switch => value
                .as_bool()
                .map(|_| ())
                .ok_or_else(|| format!("{} must be true or false", self.label)),
            FieldType::File => Ok(()),
            FieldType::Color => match value.as_str() {
                Some(s) if COLOR_RE.is_match(s) => Ok(()),
                _ => Err("Invalid color".to_string()),
            },
        }
    }

    fn check_length(&self, s: &str, floor: usize) -> Result<(), String> {
        let len = s.chars().count();
        let min = self.min.map_or(floor, |m| floor.max(length_bound(m)));
        if len < min {
            return Err(format!("{} must be at least {min} characters", self.label));
        }
        if let Some(max) = self.max.map(length_bound) {
            if len > max {
                return Err(format!("{} must be at most {max} characters", self.label));
            }
        }
        Ok(())
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn length_bound(bound: f64) -> usize {
    if bound <= 0.0 {
        0
    } else {
        bound.ceil() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(field: FieldDefinition) -> FieldRule {
        FieldRule::build(&field)
    }

    fn check(field: FieldDefinition, value: impl Into<Value>) -> Result<(), String> {
        rule(field).check(Some(&value.into()))
    }

    #[test]
    fn test_email() {
        let email = FieldDefinition::new("email", FieldType::Email).required(true);
        assert_eq!(
            check(email.clone(), "not-an-email"),
            Err("Invalid email address".to_string())
        );
        assert!(check(email.clone(), "jane@example.com").is_ok());
        assert!(check(email, "jane.doe+tag@mail.example.co.uk").is_ok());
    }

    #[test]
    fn test_number_bounds_reference_limits() {
        let age = FieldDefinition::new("age", FieldType::Number)
            .required(true)
            .min(18.0)
            .max(100.0);
        let err = check(age.clone(), 15).unwrap_err();
        assert!(err.contains("18"), "{err}");
        assert_eq!(err, "age must be at least 18");
        assert_eq!(check(age.clone(), 101).unwrap_err(), "age must be at most 100");
        assert!(check(age.clone(), 18).is_ok());
        assert!(check(age.clone(), "42").is_ok());
        assert!(check(age.clone(), 55.5).is_ok());
        assert_eq!(check(age, "old").unwrap_err(), "age must be a number");
    }

    #[test]
    fn test_range_is_numeric() {
        let volume = FieldDefinition::new("volume", FieldType::Range).max(10.0);
        assert!(check(volume.clone(), 3).is_ok());
        assert!(check(volume, true).is_err());
    }

    #[test]
    fn test_password_minimum() {
        let password = FieldDefinition::new("password", FieldType::Password).required(true);
        assert_eq!(
            check(password.clone(), "short").unwrap_err(),
            "password must be at least 8 characters"
        );
        assert!(check(password.clone(), "Abc12345").is_ok());

        let stronger = password.min(12.0);
        assert_eq!(
            check(stronger, "Abc12345").unwrap_err(),
            "password must be at least 12 characters"
        );
    }

    #[test]
    fn test_url() {
        let site = FieldDefinition::new("website", FieldType::Url);
        assert!(check(site.clone(), "https://example.com/path").is_ok());
        assert!(check(site.clone(), "http://localhost:8080").is_ok());
        assert_eq!(check(site.clone(), "ftp://example.com").unwrap_err(), "Invalid URL");
        assert_eq!(check(site, "example").unwrap_err(), "Invalid URL");
    }

    #[test]
    fn test_tel() {
        let phone = FieldDefinition::new("phone", FieldType::Tel);
        assert!(check(phone.clone(), "+1 (555) 123-4567").is_ok());
        assert!(check(phone.clone(), "5551234567").is_ok());
        assert_eq!(check(phone.clone(), "0123").unwrap_err(), "Invalid phone number");
        assert!(check(phone, "0555123456").is_err());
    }

    #[test]
    fn test_color() {
        let color = FieldDefinition::new("accent", FieldType::Color);
        assert!(check(color.clone(), "#1a2B3c").is_ok());
        assert_eq!(check(color.clone(), "#fff").unwrap_err(), "Invalid color");
        assert!(check(color, "red").is_err());
    }

    #[test]
    fn test_checkbox_requires_boolean() {
        let terms = FieldDefinition::new("terms", FieldType::Checkbox).required(true);
        assert!(check(terms.clone(), false).is_ok());
        assert!(check(terms.clone(), true).is_ok());
        assert_eq!(check(terms.clone(), "yes").unwrap_err(), "terms must be true or false");
        assert_eq!(rule(terms).check(None).unwrap_err(), "terms is required");
    }

    #[test]
    fn test_text_length_bounds() {
        let bio = FieldDefinition::new("bio", FieldType::Textarea).min(3.0).max(5.0);
        assert_eq!(check(bio.clone(), "ab").unwrap_err(), "bio must be at least 3 characters");
        assert_eq!(check(bio.clone(), "abcdef").unwrap_err(), "bio must be at most 5 characters");
        assert!(check(bio.clone(), "héllo").is_ok());
        assert_eq!(check(bio, 5).unwrap_err(), "bio must be text");
    }

    #[test]
    fn test_select_options() {
        let plan = FieldDefinition::new("plan", FieldType::Select)
            .required(true)
            .option("free", "Free")
            .option("pro", "Pro");
        assert!(check(plan.clone(), "pro").is_ok());
        assert_eq!(check(plan.clone(), "gold").unwrap_err(), "Invalid selection");
        assert_eq!(check(plan, "").unwrap_err(), "plan is required");
    }

    #[test]
    fn test_pattern_after_type_check() {
        let code = FieldDefinition::new("postal_code", FieldType::Text)
            .pattern(r"^\d{5}$")
            .label("Postal code");
        assert!(check(code.clone(), "12345").is_ok());
        assert_eq!(
            check(code, "1234a").unwrap_err(),
            "Postal code has an invalid format"
        );
    }

    #[test]
    fn test_file_accepted_as_is() {
        let cv = FieldDefinition::new("cv", FieldType::File).required(true);
        let file = crate::value::FileRef::new("cv.pdf", 1024);
        assert!(check(cv.clone(), file).is_ok());
        assert!(rule(cv).check(None).is_err());
    }

    #[test]
    fn test_optional_fields_accept_absence_for_every_type() {
        for t in FieldType::ALL {
            let field = FieldDefinition::new("f", t).pattern("^never$").min(5.0);
            let r = rule(field);
            assert!(r.check(None).is_ok(), "{t} absent");
            assert!(r.check(Some(&Value::Null)).is_ok(), "{t} null");
            assert!(r.check(Some(&Value::from(""))).is_ok(), "{t} empty string");
            assert!(r.check(Some(&Value::List(vec![]))).is_ok(), "{t} empty list");
        }
    }

    #[test]
    fn test_required_string_like_rejects_empty_with_label() {
        for t in FieldType::ALL.into_iter().filter(|t| t.is_string_like()) {
            let field = FieldDefinition::new("x", t).label("Nickname").required(true);
            let err = rule(field).check(Some(&Value::from(""))).unwrap_err();
            assert!(err.contains("Nickname"), "{t}: {err}");
        }
    }

    #[test]
    fn test_build_is_idempotent() {
        let field = FieldDefinition::new("age", FieldType::Number).min(18.0).max(65.0);
        let a = FieldRule::build(&field);
        let b = FieldRule::build(&field);
        for input in [
            Value::Int(10),
            Value::Int(30),
            Value::Float(70.5),
            Value::from("x"),
            Value::Null,
        ] {
            assert_eq!(a.check(Some(&input)), b.check(Some(&input)));
        }
    }
}
