//! Appointment manager error types.

use std::time::Duration;

use calsync_core::{BusyInterval, DomainError};
use calsync_providers::ProviderError;
use thiserror::Error;

/// Result type for manager operations.
pub type AppointmentResult<T> = Result<T, AppointmentError>;

/// Errors returned by the appointment manager.
#[derive(Debug, Error)]
pub enum AppointmentError {
    /// A request field failed validation.
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("invalid interval: end ({end}) must be after start ({start})")]
    InvalidInterval { start: String, end: String },

    #[error("invalid business window: close ({close}) must be after open ({open})")]
    InvalidWindow { open: String, close: String },

    #[error("invalid duration: {minutes} minutes, must be positive")]
    InvalidDuration { minutes: i64 },

    /// The requested time overlaps existing events.
    #[error("requested time conflicts with {} existing event(s)", .conflicts.len())]
    Conflict { conflicts: Vec<BusyInterval> },

    /// The calendar provider failed.
    #[error("calendar {operation} failed: {source}")]
    ExternalService {
        operation: &'static str,
        transient: bool,
        #[source]
        source: ProviderError,
    },

    /// The calendar provider did not answer in time.
    #[error("calendar {operation} timed out after {}s", .after.as_secs_f64())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("appointment {event_id} not found")]
    NotFound { event_id: String },
}

impl AppointmentError {
    /// Wraps a provider failure.
    pub fn external(operation: &'static str, source: ProviderError) -> Self {
        Self::ExternalService {
            operation,
            transient: source.is_retryable(),
            source,
        }
    }

    /// Returns true if retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ExternalService { transient, .. } => *transient,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Returns true if the request itself was rejected before reaching the calendar.
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::InvalidInterval { .. }
                | Self::InvalidWindow { .. }
                | Self::InvalidDuration { .. }
        )
    }
}

impl From<DomainError> for AppointmentError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation { field, message } => Self::Validation { field, message },
            DomainError::InvalidInterval { start, end } => Self::InvalidInterval { start, end },
            DomainError::InvalidWindow { open, close } => Self::InvalidWindow { open, close },
            DomainError::InvalidDuration { minutes } => Self::InvalidDuration { minutes },
            DomainError::InvalidTimezone(name) => Self::Validation {
                field: "timezone",
                message: format!("unknown timezone '{}'", name),
            },
        }
    }
}
