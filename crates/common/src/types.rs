//! Common types used throughout Civic

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use sha3::Keccak256;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Seconds since the Unix epoch, as reported by the host environment
pub type Timestamp = u64;

/// Fixed-size byte identifiers that print and serialize as `0x`-prefixed hex
macro_rules! hex_newtype {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Length of the identifier in bytes
            pub const LEN: usize = $len;

            /// The all-zero value
            pub const ZERO: $name = $name([0u8; $len]);

            /// Wrap raw bytes
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Build from a slice of exactly `LEN` bytes
            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                let array: [u8; $len] = bytes.try_into().ok()?;
                Some(Self(array))
            }

            /// Raw bytes
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Whether every byte is zero
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::ZERO
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let digits = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(digits)
                    .map_err(|e| Error::invalid_input(format!("{} {}: {}", stringify!($name), s, e)))?;
                Self::from_slice(&bytes).ok_or_else(|| {
                    Error::invalid_input(format!(
                        "{} {} must be {} bytes, got {}",
                        stringify!($name),
                        s,
                        $len,
                        bytes.len()
                    ))
                })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_newtype!(
    /// A 20-byte account address (schemes, the avatar, call targets, stakers)
    Address,
    20
);

hex_newtype!(
    /// A 4-byte function selector
    Selector,
    4
);

hex_newtype!(
    /// A 32-byte hash of a scheme's parameters
    ParamsHash,
    32
);

impl Address {
    /// An address with every byte set to `byte`; handy for fixtures
    pub const fn repeat_byte(byte: u8) -> Self {
        Self([byte; 20])
    }

    /// The address as a left-padded 32-byte word
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }
}

impl Selector {
    /// Selector of a canonical function signature such as `checkERC20Limits(address)`.
    ///
    /// Derived as the first four bytes of the Keccak-256 digest of the
    /// signature, as in the EVM ABI.
    pub fn from_signature(signature: &str) -> Self {
        let digest = Keccak256::digest(signature.as_bytes());
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&digest[..4]);
        Self(bytes)
    }

    /// Selector of encoded call data; zero for plain value transfers
    pub fn of_call_data(data: &[u8]) -> Self {
        data.get(..4).and_then(Self::from_slice).unwrap_or(Self::ZERO)
    }

    /// The selector as a right-padded 32-byte word
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[..4].copy_from_slice(&self.0);
        word
    }
}

impl ParamsHash {
    /// Hash arbitrary parameter bytes
    pub fn of(params: &[u8]) -> Self {
        let digest = Sha256::digest(params);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }
}

/// Explicit permission context for a mutating call: who is calling, and
/// the host's notion of "now" for that call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Identity of the caller
    pub sender: Address,
    /// Host time of the call
    pub now: Timestamp,
}

impl Context {
    /// Create a new call context
    pub fn new(sender: Address, now: Timestamp) -> Self {
        Self { sender, now }
    }
}

/// Identifier of a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProposalId(pub u64);

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proposal-{}", self.0)
    }
}

/// State of a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalState {
    /// Open for votes or awaiting resolution
    Active,
    /// Resolved without a winning option
    Rejected,
    /// Resolved but not executed (grace window elapsed, or a losing
    /// option won where options can fail)
    Failed,
    /// Winning option's calls dispatched successfully
    Executed,
}

impl ProposalState {
    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProposalState::Active)
    }
}

impl fmt::Display for ProposalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProposalState::Active => "Active",
            ProposalState::Rejected => "Rejected",
            ProposalState::Failed => "Failed",
            ProposalState::Executed => "Executed",
        };
        f.write_str(name)
    }
}
