use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Decimal places between raw on-chain units and display units.
pub const WEI_DECIMALS: u32 = 18;

/// A raw on-chain amount in the smallest unit (wei scale).
///
/// Amounts stay integral for the whole replay so that folding millions of
/// events never accumulates rounding error. Conversion to a display-scale
/// [`Decimal`] happens once, at the snapshot boundary, via
/// [`Amount::to_display`].
///
/// All arithmetic is checked: overflow is reported, never wrapped.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(i128);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(0);

    /// The smallest representable positive amount (one raw unit).
    pub const UNIT: Amount = Amount(1);

    /// Wrap a raw integer amount.
    pub const fn from_raw(raw: i128) -> Self {
        Self(raw)
    }

    /// The raw integer value.
    pub const fn raw(self) -> i128 {
        self.0
    }

    /// Parse a base-10 integer string, with an optional leading `-`.
    ///
    /// Anything else (fractions, exponents, separators) is rejected: a
    /// magnitude that cannot be represented exactly must not be guessed.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        let trimmed = raw.trim();
        let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TypeError::InvalidAmount(raw.to_string()));
        }
        trimmed
            .parse::<i128>()
            .map(Self)
            .map_err(|_| TypeError::InvalidAmount(raw.to_string()))
    }

    pub fn checked_add(self, other: Self) -> Result<Self, TypeError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(TypeError::AmountOverflow)
    }

    pub fn checked_sub(self, other: Self) -> Result<Self, TypeError> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(TypeError::AmountOverflow)
    }

    /// Multiply by a ratio expressed in parts per million, rounding toward zero.
    pub fn checked_mul_ppm(self, ppm: u32) -> Result<Self, TypeError> {
        self.0
            .checked_mul(i128::from(ppm))
            .map(|scaled| Self(scaled / 1_000_000))
            .ok_or(TypeError::AmountOverflow)
    }

    /// Negate, used when a sign convention debits a field.
    pub fn checked_neg(self) -> Result<Self, TypeError> {
        self.0.checked_neg().map(Self).ok_or(TypeError::AmountOverflow)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Convert to display scale (raw / 10^18).
    pub fn to_display(self) -> Result<Decimal, TypeError> {
        Decimal::try_from_i128_with_scale(self.0, WEI_DECIMALS)
            .map(|d| d.normalize())
            .map_err(|_| TypeError::DisplayOverflow(self.0))
    }

    /// Convert to a plain decimal without rescaling (for unit counts).
    pub fn to_unscaled(self) -> Result<Decimal, TypeError> {
        Decimal::try_from_i128_with_scale(self.0, 0).map_err(|_| TypeError::DisplayOverflow(self.0))
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Amount {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Amount> for String {
    fn from(value: Amount) -> Self {
        value.0.to_string()
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(i128::from(value))
    }
}
