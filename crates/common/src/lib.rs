//! Common utilities and types for Civic governance
//!
//! Everything the governance components share lives here: account
//! addresses, function selectors, the explicit call context handed to
//! every mutating operation, the ordered audit event log, and the error
//! kinds every component error maps onto.

pub mod error;
pub mod events;
pub mod logging;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use events::{Event, EventLog};
pub use types::{Address, Context, ParamsHash, ProposalId, ProposalState, Selector, Timestamp};
