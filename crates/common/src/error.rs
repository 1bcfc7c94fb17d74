//! Error types shared across Civic components

use serde::{Deserialize, Serialize};
use std::fmt;
use std::result;
use thiserror::Error;

/// Common result type used throughout Civic
pub type Result<T> = result::Result<T, Error>;

/// Stable classification of every failure a Civic component can report.
///
/// Component errors carry their own detail; `kind()` on each of them maps
/// onto one of these so callers can branch on a structured code instead of
/// parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Caller lacks the capability required by the operation
    PermissionDenied,
    /// The operation would leave no scheme able to manage schemes
    InvariantViolation,
    /// Proposal resolution attempted before its voting period ended
    ProposalNotReady,
    /// Proposal is no longer active
    ProposalAlreadyResolved,
    /// The influence formula produced a negative score
    NegativeInfluence,
    /// The relay reported failure for the batched call
    RelayFailure,
    /// Proposal resolution was re-entered while a batch was dispatching
    ReentrantCall,
    /// Malformed arguments
    InvalidInput,
    /// Unknown entity
    NotFound,
    /// Fixed-point overflow or an underflowing stake
    Arithmetic,
    /// Snapshot written out of order
    Snapshot,
    /// Configuration could not be loaded or validated
    Configuration,
    /// Logging could not be initialized
    Logging,
    /// Shared state could not be accessed
    Internal,
}

impl ErrorKind {
    /// Machine readable code for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::InvariantViolation => "INVARIANT_VIOLATION",
            ErrorKind::ProposalNotReady => "PROPOSAL_NOT_READY",
            ErrorKind::ProposalAlreadyResolved => "PROPOSAL_ALREADY_RESOLVED",
            ErrorKind::NegativeInfluence => "NEGATIVE_INFLUENCE",
            ErrorKind::RelayFailure => "RELAY_FAILURE",
            ErrorKind::ReentrantCall => "REENTRANT_CALL",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Arithmetic => "ARITHMETIC",
            ErrorKind::Snapshot => "SNAPSHOT",
            ErrorKind::Configuration => "CONFIGURATION",
            ErrorKind::Logging => "LOGGING",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common error type for Civic, used where no component error applies
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Logging setup failed
    #[error("Logging error: {0}")]
    Logging(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) | Error::Serialization(_) => ErrorKind::InvalidInput,
            Error::Logging(_) => ErrorKind::Logging,
        }
    }
}
