//! Error types for the influence engine.

use thiserror::Error;

use civic_common::ErrorKind;
use civic_snapshot::SnapshotError;

/// Errors that can occur in the influence engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InfluenceError {
    /// Caller is not the engine owner
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The formula produced a negative influence
    #[error("Negative influence: {0}")]
    NegativeInfluence(String),

    /// Fixed-point arithmetic left the representable range
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    /// A burn or time update would drive a cumulative term below zero
    #[error("Insufficient stake: {0}")]
    InsufficientStake(String),

    /// Malformed arguments or configuration
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Snapshot write failed
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

impl InfluenceError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            InfluenceError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            InfluenceError::NegativeInfluence(_) => ErrorKind::NegativeInfluence,
            InfluenceError::Overflow(_) | InfluenceError::InsufficientStake(_) => ErrorKind::Arithmetic,
            InfluenceError::InvalidInput(_) => ErrorKind::InvalidInput,
            InfluenceError::Snapshot(_) => ErrorKind::Snapshot,
        }
    }
}

/// Result type for influence operations
pub type Result<T> = std::result::Result<T, InfluenceError>;
