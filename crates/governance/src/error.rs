//! Error types for proposal handling.

use thiserror::Error;

use civic_common::ErrorKind;
use civic_influence::InfluenceError;

/// Errors that can occur while proposing, voting on or resolving proposals
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GovernanceError {
    /// Malformed proposal
    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    /// Vote rejected
    #[error("Invalid vote: {0}")]
    InvalidVote(String),

    /// Proposal not found
    #[error("Proposal not found: {0}")]
    ProposalNotFound(String),

    /// Voting period has not ended
    #[error("Proposal not ready: {0}")]
    ProposalNotReady(String),

    /// Proposal already reached a terminal state
    #[error("Proposal already resolved: {0}")]
    ProposalAlreadyResolved(String),

    /// The relay reported failure for the batched call
    #[error("Relay failure: {0}")]
    RelayFailure(String),

    /// Resolution re-entered while a batch was dispatching
    #[error("Reentrant call: {0}")]
    ReentrantCall(String),

    /// Batch or payload could not be decoded
    #[error("Malformed batch: {0}")]
    MalformedBatch(String),

    /// Voting power lookup failed
    #[error("Influence error: {0}")]
    Influence(#[from] InfluenceError),

    /// Proposal state could not be accessed
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GovernanceError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            GovernanceError::InvalidProposal(_)
            | GovernanceError::InvalidVote(_)
            | GovernanceError::MalformedBatch(_) => ErrorKind::InvalidInput,
            GovernanceError::ProposalNotFound(_) => ErrorKind::NotFound,
            GovernanceError::ProposalNotReady(_) => ErrorKind::ProposalNotReady,
            GovernanceError::ProposalAlreadyResolved(_) => ErrorKind::ProposalAlreadyResolved,
            GovernanceError::RelayFailure(_) => ErrorKind::RelayFailure,
            GovernanceError::ReentrantCall(_) => ErrorKind::ReentrantCall,
            GovernanceError::Influence(e) => e.kind(),
            GovernanceError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for governance operations
pub type Result<T> = std::result::Result<T, GovernanceError>;
