//! Field values.
//!
//! The [`Value`] enum is what a field holds at runtime. It is deliberately
//! small: the kinds of data an input can produce, plus [`FileRef`] for
//! uploads. [`FormValues`] maps field ids to values in a stable order so
//! snapshots and submitted payloads serialize deterministically.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A mapping from field id (possibly a dot-path) to its current value.
pub type FormValues = BTreeMap<String, Value>;

/// A reference to a user-selected file. The engine never reads file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    /// The file name as chosen by the user.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME type, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl FileRef {
    /// Creates a file reference without a MIME type.
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: None,
        }
    }
}

/// The value of a single field.
///
/// Serialized with an explicit tag so integers and floats survive a
/// snapshot round trip unchanged.
///
/// # Examples
///
/// ```
/// use formflow_forms::value::Value;
///
/// assert_eq!(Value::from(18), Value::Int(18));
/// assert_eq!(Value::from("Jane"), Value::String("Jane".to_string()));
/// assert!(Value::from("").is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// No value.
    #[default]
    Null,
    /// A boolean (checkbox, switch).
    Bool(bool),
    /// A whole number.
    Int(i64),
    /// A floating-point number.
    Float(f64),
    /// A string.
    String(String),
    /// A list of values (multi-select style inputs).
    List(Vec<Value>),
    /// A file reference.
    File(FileRef),
}

impl Value {
    /// Returns `true` for `Null`, the empty string, and the empty list.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::String(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Returns the string slice if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean if this is a `Bool`.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Interprets the value as a finite number.
    ///
    /// Integers, floats, and strings that parse as a number are accepted.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        let n = match self {
            Self::Int(i) => *i as f64,
            Self::Float(f) => *f,
            Self::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        n.is_finite().then_some(n)
    }

    /// Returns the plain JSON form of the value (no type tag).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::File(file) => serde_json::json!({
                "name": file.name,
                "size": file.size,
                "mime_type": file.mime_type,
            }),
        }
    }

    /// Loose equality used by visibility rules: numbers compare by value
    /// regardless of representation, everything else structurally.
    pub fn loosely_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s}"),
            Self::List(items) => {
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{v}")?;
                }
                Ok(())
            }
            Self::File(file) => write!(f, "{}", file.name),
        }
    }
}

// ── From implementations ───────────────────────────────────────────────

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<FileRef> for Value {
    fn from(v: FileRef) -> Self {
        Self::File(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_empty() {
        assert!(Value::Null.is_empty());
        assert!(Value::from("").is_empty());
        assert!(Value::List(vec![]).is_empty());
        assert!(!Value::from(" ").is_empty());
        assert!(!Value::Bool(false).is_empty());
        assert!(!Value::Int(0).is_empty());
    }

    #[test]
    fn test_as_f64() {
        assert_eq!(Value::Int(15).as_f64(), Some(15.0));
        assert_eq!(Value::Float(2.5).as_f64(), Some(2.5));
        assert_eq!(Value::from(" 42 ").as_f64(), Some(42.0));
        assert_eq!(Value::from("abc").as_f64(), None);
        assert_eq!(Value::from("NaN").as_f64(), None);
        assert_eq!(Value::Bool(true).as_f64(), None);
    }

    #[test]
    fn test_tagged_serde_keeps_int_and_float_apart() {
        let json = serde_json::to_string(&Value::Int(3)).unwrap();
        assert_eq!(json, r#"{"type":"int","value":3}"#);
        let back: Value = serde_json::from_str(r#"{"type":"float","value":3.0}"#).unwrap();
        assert_eq!(back, Value::Float(3.0));
        let null: Value = serde_json::from_str(r#"{"type":"null"}"#).unwrap();
        assert_eq!(null, Value::Null);
    }

    #[test]
    fn test_to_json_is_untagged() {
        let v = Value::from(vec!["a", "b"]);
        assert_eq!(v.to_json(), serde_json::json!(["a", "b"]));
        assert_eq!(Value::Null.to_json(), serde_json::Value::Null);
    }

    #[test]
    fn test_loosely_equals() {
        assert!(Value::Int(3).loosely_equals(&Value::Float(3.0)));
        assert!(!Value::Int(3).loosely_equals(&Value::from("3")));
        assert!(Value::from("x").loosely_equals(&Value::from("x")));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from(vec![1, 2]).to_string(), "1,2");
        assert_eq!(Value::File(FileRef::new("cv.pdf", 10)).to_string(), "cv.pdf");
    }
}
