//! Proposal engine parameters.

use serde::{Deserialize, Serialize};

use civic_common::Address;

use crate::error::{GovernanceError, Result};

/// Basis points in one whole
pub const MAX_BPS: u32 = 10_000;

/// How the engine treats the options of a proposal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemeVariant {
    /// Option 0 rejects, every other option executes its slice
    #[default]
    Standard,
    /// A synthetic "no action" option is appended to every proposal;
    /// it rejects when it wins
    EnforcedBinary,
    /// A losing outcome resolves to Failed instead of Rejected
    OptionsCanFail,
}

/// Timing and quorum of proposals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalConfig {
    /// Seconds a proposal is open for votes
    #[serde(default = "default_voting_period")]
    pub voting_period: u64,

    /// Seconds after the voting period during which a winner may still execute
    #[serde(default = "default_time_for_execution")]
    pub time_for_execution: u64,

    /// Votes an option needs to win, in basis points of the total influence
    /// at the proposal snapshot
    #[serde(default = "default_quorum_bps")]
    pub quorum_bps: u32,

    #[serde(default)]
    pub variant: SchemeVariant,
}

fn default_voting_period() -> u64 {
    3 * 24 * 60 * 60
}

fn default_time_for_execution() -> u64 {
    7 * 24 * 60 * 60
}

fn default_quorum_bps() -> u32 {
    5_000
}

impl Default for ProposalConfig {
    fn default() -> Self {
        Self {
            voting_period: default_voting_period(),
            time_for_execution: default_time_for_execution(),
            quorum_bps: default_quorum_bps(),
            variant: SchemeVariant::default(),
        }
    }
}

impl ProposalConfig {
    /// Check the parameters
    pub fn validate(&self) -> Result<()> {
        if self.voting_period == 0 {
            return Err(GovernanceError::InvalidProposal(
                "voting period must be positive".to_string(),
            ));
        }
        if self.quorum_bps > MAX_BPS {
            return Err(GovernanceError::InvalidProposal(format!(
                "quorum of {} bps exceeds {}",
                self.quorum_bps, MAX_BPS
            )));
        }
        self.voting_period
            .checked_add(self.time_for_execution)
            .ok_or_else(|| GovernanceError::InvalidProposal("execution window overflows".to_string()))?;
        Ok(())
    }
}

/// Addresses the engine builds batches against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeAddresses {
    /// The engine's own scheme in the controller
    pub scheme: Address,
    /// The treasury the batch executes on behalf of
    pub avatar: Address,
    /// Multisend contract the batch is delegate-called into
    pub multisend: Address,
    /// Permission registry bracketing every call
    pub permission_registry: Address,
}

impl SchemeAddresses {
    /// Check that every address is set
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("scheme", self.scheme),
            ("avatar", self.avatar),
            ("multisend", self.multisend),
            ("permission_registry", self.permission_registry),
        ];
        for (name, address) in named {
            if address.is_zero() {
                return Err(GovernanceError::InvalidProposal(format!(
                    "{} address is not set",
                    name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ProposalConfig::default().validate().is_ok());
    }

    #[test]
    fn test_quorum_above_whole_is_rejected() {
        let config = ProposalConfig {
            quorum_bps: MAX_BPS + 1,
            ..ProposalConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unset_address_is_rejected() {
        let addresses = SchemeAddresses {
            scheme: Address::repeat_byte(1),
            avatar: Address::repeat_byte(2),
            multisend: Address::ZERO,
            permission_registry: Address::repeat_byte(4),
        };
        let err = addresses.validate().unwrap_err();
        assert!(err.to_string().contains("multisend"));
    }
}
