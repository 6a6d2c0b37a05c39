//! Domain error types.
//!
//! These errors describe violated preconditions on values handled by the
//! core: malformed appointment fields, empty or reversed intervals, invalid
//! business windows and non-positive durations. They never describe failures
//! of the external calendar.

use thiserror::Error;

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Errors raised while constructing or validating domain values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A field of an appointment request failed validation.
    #[error("invalid {field}: {message}")]
    Validation {
        /// Name of the offending field.
        field: &'static str,
        /// Human-readable reason.
        message: String,
    },

    /// An interval whose end is not after its start.
    #[error("invalid interval: end ({end}) must be after start ({start})")]
    InvalidInterval { start: String, end: String },

    /// A business window whose opening is not before its closing.
    #[error("invalid business window: open ({open}) must be before close ({close})")]
    InvalidWindow { open: String, close: String },

    /// A requested slot duration that is zero or negative.
    #[error("invalid duration: {minutes} minutes (must be positive)")]
    InvalidDuration { minutes: i64 },

    /// A timezone name that is not a known IANA identifier.
    #[error("unknown timezone: {0}")]
    InvalidTimezone(String),
}

impl DomainError {
    /// Creates a field validation error.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Returns the field name for validation errors.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}
