//! Boundaries of the external systems the controller forwards to.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use civic_common::Address;

/// Result of a call executed by the avatar
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOutcome {
    /// Whether the call succeeded
    pub success: bool,
    /// Raw return data
    pub return_data: Vec<u8>,
}

impl CallOutcome {
    /// A successful call returning `return_data`
    pub fn succeeded(return_data: Vec<u8>) -> Self {
        Self {
            success: true,
            return_data,
        }
    }

    /// A failed call
    pub fn failed() -> Self {
        Self::default()
    }
}

/// The organization's treasury account, able to make arbitrary calls
#[cfg_attr(test, mockall::automock)]
pub trait Avatar: Send + Sync {
    /// Execute `data` against `target`, sending `value` base units
    fn execute_call(&self, target: Address, data: &[u8], value: u128) -> CallOutcome;
}

/// Reputation token bookkeeping
#[cfg_attr(test, mockall::automock)]
pub trait ReputationToken: Send + Sync {
    /// Mint `amount` to `account`
    fn mint(&self, account: Address, amount: Decimal) -> bool;

    /// Burn `amount` from `account`
    fn burn(&self, account: Address, amount: Decimal) -> bool;

    /// Hand ownership of the token to `new_owner`
    fn transfer_ownership(&self, new_owner: Address);
}
