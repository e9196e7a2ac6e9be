//! Core error types for formflow.
//!
//! [`FormflowError`] covers configuration problems, malformed form
//! definitions, navigation misuse, storage and serialization failures, and
//! submission failures. [`ValidationError`] carries structured, per-field
//! validation failures.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Represents a validation error with optional field-level errors.
///
/// Validation errors can be either simple (a single message) or compound
/// (containing one message per field path).
///
/// # Examples
///
/// ```
/// use formflow_core::error::ValidationError;
///
/// let err = ValidationError::new("Email is required", "required");
/// assert_eq!(err.to_string(), "Email is required");
///
/// let mut field_errors = std::collections::BTreeMap::new();
/// field_errors.insert("email".to_string(), "Invalid email address".to_string());
/// let err = ValidationError::with_field_errors(field_errors);
/// assert!(err.to_string().contains("email: Invalid email address"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The primary error message.
    pub message: String,
    /// A short code identifying the type of failure (e.g. "required", "invalid").
    pub code: String,
    /// Additional parameters providing context for the error message.
    pub params: BTreeMap<String, String>,
    /// Per-field validation errors, keyed by field path.
    pub field_errors: BTreeMap<String, String>,
}

impl ValidationError {
    /// Creates a new `ValidationError` with a message and code.
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            params: BTreeMap::new(),
            field_errors: BTreeMap::new(),
        }
    }

    /// Creates a `ValidationError` containing per-field errors.
    pub fn with_field_errors(field_errors: BTreeMap<String, String>) -> Self {
        Self {
            message: String::new(),
            code: "invalid".to_string(),
            params: BTreeMap::new(),
            field_errors,
        }
    }

    /// Adds a parameter to this validation error.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.message.is_empty() {
            return write!(f, "{}", self.message);
        }
        let mut first = true;
        for (field, message) in &self.field_errors {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// The primary error type for formflow.
#[derive(Error, Debug)]
pub enum FormflowError {
    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A form definition violates a structural rule (duplicate ids,
    /// dangling references, uncompilable patterns).
    #[error("Invalid form definition: {0}")]
    InvalidDefinition(String),

    // ── Runtime misuse ───────────────────────────────────────────────

    /// A field id that the form does not declare.
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// A step index outside `[0, count)`.
    #[error("Step {index} is out of range (form has {count} steps)")]
    InvalidStep {
        /// The requested index.
        index: usize,
        /// Number of steps in the form.
        count: usize,
    },

    // ── Validation ───────────────────────────────────────────────────

    /// One or more fields failed validation.
    #[error("Validation error: {0}")]
    ValidationError(ValidationError),

    // ── Collaborators ────────────────────────────────────────────────

    /// The storage collaborator failed (quota, disabled storage, I/O).
    #[error("Storage error: {0}")]
    StorageError(String),

    /// The external submit collaborator rejected the submission.
    #[error("Submit failed: {0}")]
    SubmitError(String),

    // ── Serialization ────────────────────────────────────────────────

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl FormflowError {
    /// Returns `true` if the user (or a retry) can recover from this error
    /// without reconfiguring the form.
    pub const fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::ConfigurationError(_) | Self::InvalidDefinition(_)
        )
    }

    /// Returns a short, stable code for this error category.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ConfigurationError(_) => "configuration",
            Self::InvalidDefinition(_) => "invalid_definition",
            Self::UnknownField(_) => "unknown_field",
            Self::InvalidStep { .. } => "invalid_step",
            Self::ValidationError(_) => "validation",
            Self::StorageError(_) => "storage",
            Self::SubmitError(_) => "submit",
            Self::SerializationError(_) => "serialization",
            Self::IoError(_) => "io",
        }
    }
}

impl From<ValidationError> for FormflowError {
    fn from(err: ValidationError) -> Self {
        Self::ValidationError(err)
    }
}

impl From<serde_json::Error> for FormflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// A convenience type alias for `Result<T, FormflowError>`.
pub type FormflowResult<T> = Result<T, FormflowError>;
