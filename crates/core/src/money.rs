//! Exact-decimal monetary amounts.
//!
//! All prices and totals flow through [`Money`]. Arithmetic is performed on
//! `rust_decimal::Decimal`, never on binary floating point, and every amount is
//! held at a fixed scale of two fraction digits. Magnitudes are capped at
//! [`Money::MAX`], the largest value a `NUMERIC(10, 2)` column holds.

use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Currency amount with two fraction digits.
///
/// Construction rejects amounts that would need rounding (e.g. `9.505`) or
/// that exceed [`Money::MAX`], so a `Money` always represents exactly what the
/// caller supplied. Arithmetic is checked and never panics.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Number of fraction digits carried by every amount.
    pub const SCALE: u32 = 2;

    /// 99,999,999.99
    pub const MAX: Money = Money(Decimal::from_parts(1_410_065_407, 2, 0, false, Self::SCALE));

    pub fn zero() -> Self {
        Self(Decimal::new(0, Self::SCALE))
    }

    /// Build an amount from a decimal value.
    ///
    /// Trailing zeros are ignored; any significant digit beyond the second
    /// fraction digit is a validation failure.
    pub fn new(amount: Decimal) -> DomainResult<Self> {
        let normalized = amount.normalize();
        if normalized.scale() > Self::SCALE {
            return Err(DomainError::validation(format!(
                "amount {amount} has more than {} fraction digits",
                Self::SCALE
            )));
        }
        Self::bounded(normalized).ok_or_else(|| {
            DomainError::validation(format!("amount {amount} exceeds {}", Self::MAX))
        })
    }

    fn bounded(mut amount: Decimal) -> Option<Self> {
        if amount.abs() > Self::MAX.0 {
            return None;
        }
        amount.rescale(Self::SCALE);
        Some(Self(amount))
    }

    /// Build an amount from an integer number of minor units (cents).
    ///
    /// Not bounded by [`Money::MAX`]; checked arithmetic still rejects
    /// results beyond it.
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, Self::SCALE))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Multiply by an integer quantity (line subtotal). `None` when the
    /// product exceeds [`Money::MAX`].
    pub fn checked_times(self, quantity: i32) -> Option<Self> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .and_then(Self::bounded)
    }

    /// `None` when the sum exceeds [`Money::MAX`].
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).and_then(Self::bounded)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Strictly less than zero.
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl ValueObject for Money {}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str(s.trim())
            .map_err(|e| DomainError::validation(format!("invalid amount '{s}': {e}")))?;
        Self::new(amount)
    }
}
