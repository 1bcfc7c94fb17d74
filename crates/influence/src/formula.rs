//! Formula terms and the influence calculation

use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

use crate::error::{InfluenceError, Result};
use crate::fixed::Wad;

/// Decimal places kept by every stored amount, term and influence value
pub const DECIMALS: u32 = 18;

/// Sum of formula terms over all of an account's active stakes.
///
/// Terms are exact 18-decimal fixed-point integers, so per-account stakes
/// always add up to the aggregate and a burn undoes its mint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CumulativeStake {
    /// Σ amount·t
    pub linear_term: Wad,
    /// Σ amount·t^k
    pub exponential_term: Wad,
}

impl CumulativeStake {
    /// Terms contributed by a single stake of `amount` committed for
    /// `time_commitment` units of time.
    ///
    /// `t^k` comes from the decimal power function rounded to 18 places;
    /// everything after that is integer arithmetic.
    pub fn from_stake(amount: Decimal, time_commitment: u64, exponent: Decimal) -> Result<Self> {
        let amount = Wad::from_decimal(amount)?;

        let linear_term = amount
            .checked_mul_int(time_commitment)
            .ok_or_else(|| overflow(format!("{} * {}", amount, time_commitment)))?;

        // 0^k is 0 for every k > 0; ln(0) is undefined so it is not routed
        // through the decimal power function.
        let time_pow = if time_commitment == 0 {
            Wad::ZERO
        } else {
            let time = Decimal::from(time_commitment);
            let pow = time
                .checked_powd(exponent)
                .ok_or_else(|| overflow(format!("{} ^ {}", time, exponent)))?;
            Wad::from_decimal(pow)?
        };

        let exponential_term = amount
            .checked_mul(&time_pow)
            .ok_or_else(|| overflow(format!("{} * {}", amount, time_pow)))?;

        Ok(Self {
            linear_term,
            exponential_term,
        })
    }

    /// Add another set of terms
    pub fn checked_add(&self, other: &CumulativeStake) -> Result<Self> {
        Ok(Self {
            linear_term: self
                .linear_term
                .checked_add(&other.linear_term)
                .ok_or_else(|| overflow("linear term".to_string()))?,
            exponential_term: self
                .exponential_term
                .checked_add(&other.exponential_term)
                .ok_or_else(|| overflow("exponential term".to_string()))?,
        })
    }

    /// Remove a set of terms; both terms are unsigned and may not go below zero
    pub fn checked_sub(&self, other: &CumulativeStake) -> Result<Self> {
        match (
            self.linear_term.checked_sub(&other.linear_term),
            self.exponential_term.checked_sub(&other.exponential_term),
        ) {
            (Some(linear_term), Some(exponential_term)) => Ok(Self {
                linear_term,
                exponential_term,
            }),
            _ => Err(InfluenceError::InsufficientStake(format!(
                "cannot remove {:?} from {:?}",
                other, self
            ))),
        }
    }

    /// Whether both terms are zero
    pub fn is_zero(&self) -> bool {
        self.linear_term.is_zero() && self.exponential_term.is_zero()
    }
}

/// Multipliers applied to the cumulative terms
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaMultipliers {
    /// Weight of Σ amount·t
    pub linear_multiplier: Decimal,
    /// Weight of Σ amount·t^k
    pub exponential_multiplier: Decimal,
}

impl FormulaMultipliers {
    /// Create a formula
    pub fn new(linear_multiplier: Decimal, exponential_multiplier: Decimal) -> Self {
        Self {
            linear_multiplier,
            exponential_multiplier,
        }
    }
}

/// Initial influence formula
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaConfig {
    /// Exponent `k`; fixed for the lifetime of the engine
    #[serde(default = "default_exponent")]
    pub exponent: Decimal,
    /// Initial linear multiplier
    #[serde(default = "default_linear_multiplier")]
    pub linear_multiplier: Decimal,
    /// Initial exponential multiplier
    #[serde(default)]
    pub exponential_multiplier: Decimal,
}

fn default_exponent() -> Decimal {
    Decimal::new(15, 1)
}

fn default_linear_multiplier() -> Decimal {
    Decimal::ONE
}

impl Default for FormulaConfig {
    fn default() -> Self {
        Self {
            exponent: default_exponent(),
            linear_multiplier: default_linear_multiplier(),
            exponential_multiplier: Decimal::ZERO,
        }
    }
}

impl FormulaConfig {
    /// Check the formula parameters
    pub fn validate(&self) -> Result<()> {
        if self.exponent <= Decimal::ZERO {
            return Err(InfluenceError::InvalidInput(format!(
                "exponent must be positive, got {}",
                self.exponent
            )));
        }
        Ok(())
    }

    /// The initial multipliers
    pub fn multipliers(&self) -> FormulaMultipliers {
        FormulaMultipliers::new(self.linear_multiplier, self.exponential_multiplier)
    }
}

/// Influence of `stake` under `formula`.
///
/// Refuses to answer rather than clamping when the result is negative:
/// a negative score means the formula is misconfigured.
pub fn calculate_influence(stake: &CumulativeStake, formula: &FormulaMultipliers) -> Result<Decimal> {
    let mut positive = Wad::ZERO;
    let mut negative = Wad::ZERO;

    for (multiplier, term) in [
        (formula.linear_multiplier, &stake.linear_term),
        (formula.exponential_multiplier, &stake.exponential_term),
    ] {
        let weighted = Wad::from_decimal(multiplier.abs())?
            .checked_mul(term)
            .ok_or_else(|| overflow(format!("{} * {}", multiplier, term)))?;
        let side = if multiplier.is_sign_negative() {
            &mut negative
        } else {
            &mut positive
        };
        *side = side
            .checked_add(&weighted)
            .ok_or_else(|| overflow("influence".to_string()))?;
    }

    match positive.checked_sub(&negative) {
        Some(influence) => influence.to_decimal(),
        None => Err(InfluenceError::NegativeInfluence(format!(
            "{:?} under {:?} gives -{}",
            stake, formula, negative.checked_sub(&positive).unwrap_or_default()
        ))),
    }
}

fn overflow(what: String) -> InfluenceError {
    InfluenceError::Overflow(what)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terms_with_integer_exponent() {
        let stake = CumulativeStake::from_stake(Decimal::from(100), 3, Decimal::from(2)).unwrap();
        assert_eq!(stake.linear_term, Wad::from(300));
        assert_eq!(stake.exponential_term, Wad::from(900));
    }

    #[test]
    fn test_terms_with_zero_time() {
        let stake = CumulativeStake::from_stake(Decimal::from(100), 0, Decimal::new(15, 1)).unwrap();
        assert!(stake.is_zero());
    }

    #[test]
    fn test_terms_with_fractional_exponent() {
        // 4^1.5 = 8
        let stake = CumulativeStake::from_stake(Decimal::from(10), 4, Decimal::new(15, 1)).unwrap();
        assert_eq!(stake.linear_term, Wad::from(40));
        let error = (stake.exponential_term.to_decimal().unwrap() - Decimal::from(80)).abs();
        assert!(error < Decimal::new(1, 6), "got {}", stake.exponential_term);
    }

    #[test]
    fn test_sub_below_zero_is_rejected() {
        let small = CumulativeStake::from_stake(Decimal::from(1), 1, Decimal::from(2)).unwrap();
        let large = CumulativeStake::from_stake(Decimal::from(5), 1, Decimal::from(2)).unwrap();
        let err = small.checked_sub(&large).unwrap_err();
        assert!(matches!(err, InfluenceError::InsufficientStake(_)));
    }

    #[test]
    fn test_calculate_influence() {
        let stake = CumulativeStake {
            linear_term: Wad::from(300),
            exponential_term: Wad::from(900),
        };
        let formula = FormulaMultipliers::new(Decimal::from(2), Decimal::new(1, 1));
        assert_eq!(calculate_influence(&stake, &formula).unwrap(), Decimal::from(690));
    }

    #[test]
    fn test_negative_influence_is_refused() {
        let stake = CumulativeStake {
            linear_term: Wad::from(10),
            exponential_term: Wad::from(100),
        };
        let formula = FormulaMultipliers::new(Decimal::ONE, Decimal::from(-1));
        let err = calculate_influence(&stake, &formula).unwrap_err();
        assert_eq!(err.kind(), civic_common::ErrorKind::NegativeInfluence);
    }

    #[test]
    fn test_large_stakes_keep_every_digit() {
        let exponent = Decimal::new(15, 1);
        let small = CumulativeStake::from_stake(Decimal::ONE, 604_801, exponent).unwrap();
        let large = CumulativeStake::from_stake(Decimal::from(20_000), 31_536_001, exponent).unwrap();

        let total = small.checked_add(&large).unwrap();
        assert_eq!(total.checked_sub(&large).unwrap(), small);
        assert_eq!(total.checked_sub(&small).unwrap(), large);
        assert!(total.checked_sub(&large).unwrap().checked_sub(&small).unwrap().is_zero());
    }

    #[test]
    fn test_config_validation() {
        assert!(FormulaConfig::default().validate().is_ok());
        let config = FormulaConfig {
            exponent: Decimal::ZERO,
            ..FormulaConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
