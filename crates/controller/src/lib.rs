//! Controller for Civic governance
//!
//! The controller is the permission root of the organization. Schemes
//! (governance modules) are registered with capability flags, and every
//! operation that touches the avatar or the reputation token is gated on
//! the calling scheme holding the matching flag.

mod collaborators;
mod error;
mod registry;

pub use collaborators::{Avatar, CallOutcome, ReputationToken};
pub use error::{ControllerError, Result};
pub use registry::{Controller, Scheme};

#[cfg(test)]
pub use collaborators::{MockAvatar, MockReputationToken};
