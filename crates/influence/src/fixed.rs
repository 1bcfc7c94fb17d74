//! Unsigned 18-decimal fixed-point amounts backed by 256-bit integers

use std::fmt;
use std::str::FromStr;

use primitive_types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{InfluenceError, Result};
use crate::formula::DECIMALS;

/// Largest mantissa a `Decimal` can hold (2^96 - 1)
const DECIMAL_MAX_MANTISSA: u128 = (1u128 << 96) - 1;

fn scale_factor() -> U256 {
    U256::exp10(DECIMALS as usize)
}

/// A non-negative amount scaled by 10^18.
///
/// Addition and subtraction are exact; multiplication truncates to 18
/// decimal places. Stake terms are accumulated in this type so account
/// stakes always sum to the aggregate exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Wad(U256);

impl Wad {
    pub const ZERO: Wad = Wad(U256([0; 4]));

    /// Wrap a raw value already scaled by 10^18
    pub fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    /// The scaled integer
    pub fn raw(&self) -> U256 {
        self.0
    }

    /// Convert a non-negative decimal, rounding to 18 places first
    pub fn from_decimal(value: Decimal) -> Result<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(InfluenceError::InvalidInput(format!(
                "fixed-point amounts are unsigned, got {}",
                value
            )));
        }
        let value = value.round_dp(DECIMALS);
        let mantissa = U256::from(value.mantissa().unsigned_abs());
        let shift = U256::exp10((DECIMALS - value.scale()) as usize);
        mantissa
            .checked_mul(shift)
            .map(Self)
            .ok_or_else(|| InfluenceError::Overflow(format!("{} as fixed point", value)))
    }

    /// Convert to a decimal, dropping low-order places when the value has
    /// more significant digits than a `Decimal` holds
    pub fn to_decimal(&self) -> Result<Decimal> {
        let ten = U256::from(10u8);
        let mut mantissa = self.0;
        let mut scale = DECIMALS;
        while mantissa > U256::from(DECIMAL_MAX_MANTISSA) {
            if scale == 0 {
                return Err(InfluenceError::Overflow(format!("{} as decimal", self)));
            }
            let (quotient, remainder) = mantissa.div_mod(ten);
            mantissa = if remainder >= U256::from(5u8) {
                quotient + U256::one()
            } else {
                quotient
            };
            scale -= 1;
        }
        Decimal::try_from_i128_with_scale(mantissa.low_u128() as i128, scale)
            .map(|d| d.normalize())
            .map_err(|e| InfluenceError::Overflow(format!("{} as decimal: {}", self, e)))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(&self, other: &Wad) -> Option<Wad> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(&self, other: &Wad) -> Option<Wad> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// `self * other`, truncated to 18 decimal places
    pub fn checked_mul(&self, other: &Wad) -> Option<Wad> {
        self.0
            .checked_mul(other.0)
            .and_then(|product| product.checked_div(scale_factor()))
            .map(Self)
    }

    /// `self * n` for an integer `n`; exact
    pub fn checked_mul_int(&self, n: u64) -> Option<Wad> {
        self.0.checked_mul(U256::from(n)).map(Self)
    }
}

impl From<u64> for Wad {
    fn from(units: u64) -> Self {
        Self(U256::from(units) * scale_factor())
    }
}

impl fmt::Display for Wad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (whole, fraction) = self.0.div_mod(scale_factor());
        if fraction.is_zero() {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:018}", fraction.low_u64());
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl FromStr for Wad {
    type Err = InfluenceError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || InfluenceError::InvalidInput(format!("invalid fixed-point amount: {}", s));
        let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
        if whole.is_empty() || fraction.len() > DECIMALS as usize || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let whole = U256::from_dec_str(whole).map_err(|_| invalid())?;
        let fraction = if fraction.is_empty() {
            U256::zero()
        } else {
            let padded = format!("{:0<width$}", fraction, width = DECIMALS as usize);
            U256::from_dec_str(&padded).map_err(|_| invalid())?
        };
        whole
            .checked_mul(scale_factor())
            .and_then(|scaled| scaled.checked_add(fraction))
            .map(Self)
            .ok_or_else(|| InfluenceError::Overflow(s.to_string()))
    }
}

impl Serialize for Wad {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Wad {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
