//! Fixed-point quantity type for stock arithmetic
//!
//! All stock math runs on integer milli-units (scale 3) so that thousands of
//! additive operations never accumulate binary floating-point drift. The
//! `rust_decimal` boundary exists only for persistence (NUMERIC columns) and
//! JSON payloads.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of fractional digits carried by every quantity.
pub const QUANTITY_SCALE: u32 = 3;

const MILLI: i64 = 1_000;

/// Errors converting external numeric values into a [`Quantity`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    #[error("value has more than {QUANTITY_SCALE} fractional digits: {0}")]
    PrecisionLoss(Decimal),

    #[error("value out of range: {0}")]
    OutOfRange(Decimal),

    #[error("arithmetic overflow")]
    Overflow,
}

/// Exact decimal quantity with a fixed scale of 3 fractional digits.
///
/// Internally an integer count of milli-units. Comparison, addition and
/// subtraction are exact; division is only offered with an explicit rounding
/// policy ([`Quantity::packages_ceil`]).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Quantity(i64);

impl Quantity {
    pub const ZERO: Quantity = Quantity(0);

    /// Build from an integer count of milli-units.
    pub const fn from_milli(milli: i64) -> Self {
        Quantity(milli)
    }

    /// Build from a whole number of units.
    pub const fn from_units(units: i64) -> Self {
        Quantity(units * MILLI)
    }

    /// Raw milli-unit count.
    pub const fn as_milli(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Quantity) -> Option<Quantity> {
        self.0.checked_add(other.0).map(Quantity)
    }

    pub fn checked_sub(self, other: Quantity) -> Option<Quantity> {
        self.0.checked_sub(other.0).map(Quantity)
    }

    pub fn checked_mul_int(self, factor: i64) -> Option<Quantity> {
        self.0.checked_mul(factor).map(Quantity)
    }

    pub fn min(self, other: Quantity) -> Quantity {
        Quantity(self.0.min(other.0))
    }

    /// Whole packages needed to hold this quantity at `units_per_package`
    /// units each, rounding up. Used for packaging-material requirements.
    ///
    /// Returns `None` when `units_per_package` is not positive.
    pub fn packages_ceil(&self, units_per_package: i64) -> Option<i64> {
        if units_per_package <= 0 || self.0 < 0 {
            return None;
        }
        let per_package_milli = units_per_package.checked_mul(MILLI)?;
        Some((self.0 + per_package_milli - 1) / per_package_milli)
    }

    /// Split into whole packages and the leftover quantity for a packaging
    /// multiple expressed in units. Returns `None` when `multiple <= 0`.
    pub fn split_packages(&self, multiple: i64) -> Option<(i64, Quantity)> {
        if multiple <= 0 || self.0 < 0 {
            return None;
        }
        let per_package_milli = multiple.checked_mul(MILLI)?;
        Some((
            self.0 / per_package_milli,
            Quantity(self.0 % per_package_milli),
        ))
    }

    /// Decimal view for persistence and display.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, QUANTITY_SCALE)
    }
}

impl TryFrom<Decimal> for Quantity {
    type Error = QuantityError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        let scaled = value
            .checked_mul(Decimal::from(MILLI))
            .ok_or(QuantityError::OutOfRange(value))?;
        if scaled.fract() != Decimal::ZERO {
            return Err(QuantityError::PrecisionLoss(value));
        }
        scaled
            .to_i64()
            .map(Quantity)
            .ok_or(QuantityError::OutOfRange(value))
    }
}

impl From<Quantity> for Decimal {
    fn from(q: Quantity) -> Self {
        q.to_decimal()
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_decimal().normalize())
    }
}

impl std::iter::Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Self {
        iter.fold(Quantity::ZERO, |acc, q| {
            acc.checked_add(q).unwrap_or(Quantity(i64::MAX))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn from_decimal_exact() {
        assert_eq!(Quantity::try_from(dec("1.5")).unwrap().as_milli(), 1500);
        assert_eq!(Quantity::try_from(dec("0.001")).unwrap().as_milli(), 1);
        assert_eq!(Quantity::try_from(dec("-2")).unwrap().as_milli(), -2000);
    }

    #[test]
    fn from_decimal_rejects_excess_precision() {
        assert_eq!(
            Quantity::try_from(dec("0.0005")),
            Err(QuantityError::PrecisionLoss(dec("0.0005")))
        );
    }

    #[test]
    fn addition_is_exact_over_many_operations() {
        // 0.1 + 0.1 + ... a thousand times is exactly 100
        let tenth = Quantity::try_from(dec("0.1")).unwrap();
        let mut total = Quantity::ZERO;
        for _ in 0..1000 {
            total = total.checked_add(tenth).unwrap();
        }
        assert_eq!(total, Quantity::from_units(100));
    }

    #[test]
    fn subtraction_and_ordering() {
        let a = Quantity::from_units(10);
        let b = Quantity::try_from(dec("3.25")).unwrap();
        assert_eq!(a.checked_sub(b).unwrap().to_decimal(), dec("6.750"));
        assert!(b < a);
        assert_eq!(a.min(b), b);
    }

    #[test]
    fn packages_ceil_rounds_up() {
        let q = Quantity::from_units(16);
        assert_eq!(q.packages_ceil(6), Some(3));
        assert_eq!(Quantity::from_units(18).packages_ceil(6), Some(3));
        assert_eq!(Quantity::ZERO.packages_ceil(6), Some(0));
        assert_eq!(q.packages_ceil(0), None);
    }

    #[test]
    fn split_packages_reports_remainder() {
        let q = Quantity::from_units(16);
        assert_eq!(q.split_packages(6), Some((2, Quantity::from_units(4))));
        assert_eq!(
            Quantity::from_units(18).split_packages(6),
            Some((3, Quantity::ZERO))
        );
    }

    #[test]
    fn display_normalizes_trailing_zeros() {
        assert_eq!(Quantity::from_units(3).to_string(), "3");
        assert_eq!(
            Quantity::try_from(dec("2.500")).unwrap().to_string(),
            "2.5"
        );
    }

    #[test]
    fn serde_round_trip_as_decimal() {
        let q = Quantity::try_from(dec("12.375")).unwrap();
        let json = serde_json::to_string(&q).unwrap();
        let back: Quantity = serde_json::from_str(&json).unwrap();
        assert_eq!(q, back);
    }
}
