//! Call encoding for the permission registry.
//!
//! Every executed batch is bracketed by permission-registry calls: balances
//! are captured first, each call is announced with its target, selector
//! and value before it runs, and the spending limits are checked last.

use civic_common::{Address, Selector};

use crate::multisend::u128_word;

pub const SET_ERC20_BALANCES: &str = "setERC20Balances()";
pub const CHECK_ERC20_LIMITS: &str = "checkERC20Limits(address)";
pub const SET_ETH_PERMISSION_USED: &str = "setETHPermissionUsed(address,address,bytes4,uint256)";

/// `setERC20Balances()`
pub fn set_erc20_balances() -> Vec<u8> {
    Selector::from_signature(SET_ERC20_BALANCES).as_bytes().to_vec()
}

/// `checkERC20Limits(avatar)`
pub fn check_erc20_limits(avatar: Address) -> Vec<u8> {
    let mut data = Selector::from_signature(CHECK_ERC20_LIMITS).as_bytes().to_vec();
    data.extend_from_slice(&avatar.to_word());
    data
}

/// `setETHPermissionUsed(avatar, to, selector, value)`
pub fn set_eth_permission_used(avatar: Address, to: Address, selector: Selector, value: u128) -> Vec<u8> {
    let mut data = Selector::from_signature(SET_ETH_PERMISSION_USED).as_bytes().to_vec();
    data.extend_from_slice(&avatar.to_word());
    data.extend_from_slice(&to.to_word());
    data.extend_from_slice(&selector.to_word());
    data.extend_from_slice(&u128_word(value));
    data
}
