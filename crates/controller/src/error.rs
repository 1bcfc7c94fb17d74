//! Error types for the controller.

use thiserror::Error;

use civic_common::ErrorKind;

/// Errors that can occur in the scheme registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// Caller is unregistered or lacks the required capability
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The change would leave no scheme able to manage schemes
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Malformed arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Registry state could not be accessed
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ControllerError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ControllerError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            ControllerError::InvariantViolation(_) => ErrorKind::InvariantViolation,
            ControllerError::InvalidInput(_) => ErrorKind::InvalidInput,
            ControllerError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for controller operations
pub type Result<T> = std::result::Result<T, ControllerError>;
