//! Influence engine for Civic governance
//!
//! Influence is the voting power derived from staked amounts and the time
//! each stake is committed for:
//!
//! ```text
//! influence = linear_multiplier * Σ amount·t + exponential_multiplier * Σ amount·t^k
//! ```
//!
//! The cumulative terms and the multipliers are both versioned on one
//! shared snapshot clock. Current reads combine the latest stake with the
//! latest formula; historical reads combine the stake *and* the formula as
//! they were at the requested snapshot.

mod engine;
mod error;
mod fixed;
mod formula;
mod hook;

pub use engine::InfluenceEngine;
pub use error::{InfluenceError, Result};
pub use fixed::Wad;
pub use formula::{calculate_influence, CumulativeStake, FormulaConfig, FormulaMultipliers, DECIMALS};
pub use hook::VotingPowerHook;

#[cfg(test)]
pub use hook::MockVotingPowerHook;
