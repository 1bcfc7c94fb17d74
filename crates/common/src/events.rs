//! Append-only audit log of governance events
//!
//! Ordering is significant: consumers replay the log to reconstruct the
//! registry and proposal history, so entries are never reordered or removed.

use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::types::{Address, ProposalId, ProposalState};

/// A governance event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Event {
    /// A scheme was registered or had its permissions updated
    RegisterScheme {
        /// The scheme that made the change
        sender: Address,
        /// The scheme that was registered
        scheme: Address,
    },
    /// A scheme was removed from the registry
    UnregisterScheme {
        /// The scheme that made the change
        sender: Address,
        /// The scheme that was removed
        scheme: Address,
    },
    /// A proposal was created
    NewProposal {
        /// The proposal
        proposal_id: ProposalId,
        /// Who submitted it
        proposer: Address,
    },
    /// A vote was recorded
    VoteCast {
        /// The proposal voted on
        proposal_id: ProposalId,
        /// The voter
        voter: Address,
        /// The chosen option
        option: u32,
        /// Voting weight at the proposal snapshot
        weight: Decimal,
    },
    /// A proposal changed state
    ProposalStateChanged {
        /// The proposal
        proposal_id: ProposalId,
        /// Its new state
        state: ProposalState,
    },
}

/// Shared handle to the ordered event log.
///
/// Clones append to the same log, so one log can be handed to the
/// controller and the proposal engine.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Arc<RwLock<Vec<Event>>>,
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn emit(&self, event: Event) {
        info!(?event, "governance event");
        match self.entries.write() {
            Ok(mut entries) => entries.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }

    /// Snapshot of every event so far, oldest first
    pub fn events(&self) -> Vec<Event> {
        match self.entries.read() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of events recorded
    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Export the log as a JSON array
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.events())?)
    }
}
