//! Proposal resolution for Civic governance
//!
//! A proposal carries a list of calls split evenly across its options.
//! Voting power is read from the influence engine at the snapshot frozen
//! when the proposal was created. Resolution picks the winning option and
//! executes its calls as one multisend batch, bracketed by permission
//! registry checks, through the avatar's module relay.

mod collaborators;
mod config;
mod engine;
mod error;
pub mod multisend;
pub mod permissions;
mod proposal;

pub use collaborators::{Relay, SchemeDirectory, VotingPowerSource};
pub use config::{ProposalConfig, SchemeAddresses, SchemeVariant, MAX_BPS};
pub use engine::ProposalEngine;
pub use error::{GovernanceError, Result};
pub use multisend::{MultisendCall, Operation};
pub use proposal::{CastVote, Proposal};

#[cfg(test)]
pub use collaborators::{MockRelay, MockSchemeDirectory, MockVotingPowerSource};
