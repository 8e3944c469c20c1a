//! Fixed-point money amounts.
//!
//! Every amount in the ledger carries exactly two fractional digits. Values
//! are held as integer minor units (cents) so that counters, sums and
//! comparisons are exact; `rust_decimal` is used only at the edges for
//! parsing and display.

use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fractional digits carried by every amount.
pub const AMOUNT_SCALE: u32 = 2;

/// Largest accepted amount in minor units (13 integer digits, 2 fractional).
pub const MAX_MINOR_UNITS: i64 = 999_999_999_999_999;

/// Reasons an amount is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("not a decimal number: {0:?}")]
    Malformed(String),

    #[error("must not be negative: {0}")]
    Negative(String),

    #[error("more than {AMOUNT_SCALE} fractional digits: {0}")]
    TooPrecise(String),

    #[error("outside the supported range: {0}")]
    OutOfRange(String),
}

/// A non-negative money amount with two fractional digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Build an amount from minor units. Negative input is clamped to zero.
    pub const fn from_minor_units(minor: i64) -> Self {
        if minor < 0 {
            Amount(0)
        } else {
            Amount(minor)
        }
    }

    /// Build an amount from whole currency units.
    pub const fn from_major_units(major: i64) -> Self {
        Self::from_minor_units(major.saturating_mul(100))
    }

    /// Parse a decimal string such as `"100"`, `"49.5"` or `"0.01"`.
    pub fn parse(input: &str) -> Result<Self, AmountError> {
        let trimmed = input.trim();
        let value = Decimal::from_str_exact(trimmed)
            .map_err(|_| AmountError::Malformed(trimmed.to_string()))?;
        Self::from_decimal(value)
    }

    /// Convert a decimal, rejecting negatives and excess precision.
    pub fn from_decimal(value: Decimal) -> Result<Self, AmountError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(AmountError::Negative(value.to_string()));
        }

        let normalized = value.normalize();
        if normalized.scale() > AMOUNT_SCALE {
            return Err(AmountError::TooPrecise(value.to_string()));
        }

        let minor = normalized
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|scaled| scaled.to_i64())
            .filter(|minor| *minor <= MAX_MINOR_UNITS)
            .ok_or_else(|| AmountError::OutOfRange(value.to_string()))?;

        Ok(Amount(minor.max(0)))
    }

    pub fn minor_units(&self) -> i64 {
        self.0
    }

    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, AMOUNT_SCALE)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).filter(|v| *v >= 0).map(Amount)
    }

    /// Percentage of `self` relative to `target`, capped at 100.
    pub fn percent_of(&self, target: Amount) -> f64 {
        if target.is_zero() {
            return 100.0;
        }
        (self.0 as f64 / target.0 as f64 * 100.0).min(100.0)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse(s)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Amount::from_decimal(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Decimal {
        amount.to_decimal()
    }
}
