//! Client error types.

use calsync_core::{DomainError, TracingError};
use calsync_providers::ProviderError;
use calsync_service::AppointmentError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration file or settings problem.
    #[error("configuration error: {0}")]
    Config(String),

    /// Command-line input that cannot be understood.
    #[error("invalid input: {0}")]
    Input(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The provider could not be built.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// An appointment operation failed.
    #[error(transparent)]
    Service(#[from] AppointmentError),
}

impl ClientError {
    /// Process exit code for this error.
    ///
    /// Rejected input exits with 2, every other failure with 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Input(_) => 2,
            Self::Service(e) if e.is_invalid_request() => 2,
            _ => 1,
        }
    }
}

impl From<DomainError> for ClientError {
    fn from(err: DomainError) -> Self {
        Self::Input(err.to_string())
    }
}

impl From<TracingError> for ClientError {
    fn from(err: TracingError) -> Self {
        Self::Config(err.to_string())
    }
}
