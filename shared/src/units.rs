//! Measurement units and conversion
//!
//! Units are grouped into three categories, each with one base unit: mass
//! (gram), volume (milliliter) and count (unit). Conversion is linear within
//! a category and rejected across categories. Alias parsing covers the
//! abbreviations found on supplier paperwork ("gr", "kg", "und", ...).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quantity::Quantity;

/// Errors produced by unit parsing and conversion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    #[error("unknown unit: {0}")]
    Unknown(String),

    #[error("cannot convert {from} to {to}: incompatible categories")]
    IncompatibleCategory { from: Unit, to: Unit },

    #[error("conversion result does not fit the 3-decimal quantity scale")]
    NotRepresentable,
}

/// Category a unit belongs to; conversion never crosses categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitCategory {
    Mass,
    Volume,
    Count,
}

/// Canonical measurement units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Milligram,
    Gram,
    Kilogram,
    Milliliter,
    Liter,
    Unit,
    Dozen,
}

impl Unit {
    pub fn category(&self) -> UnitCategory {
        match self {
            Unit::Milligram | Unit::Gram | Unit::Kilogram => UnitCategory::Mass,
            Unit::Milliliter | Unit::Liter => UnitCategory::Volume,
            Unit::Unit | Unit::Dozen => UnitCategory::Count,
        }
    }

    /// Base unit of this unit's category.
    pub fn base(&self) -> Unit {
        match self.category() {
            UnitCategory::Mass => Unit::Gram,
            UnitCategory::Volume => Unit::Milliliter,
            UnitCategory::Count => Unit::Unit,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Milligram => "mg",
            Unit::Gram => "g",
            Unit::Kilogram => "kg",
            Unit::Milliliter => "ml",
            Unit::Liter => "l",
            Unit::Unit => "u",
            Unit::Dozen => "dz",
        }
    }

    /// Parse a unit string, accepting the fixed alias table. Trims and
    /// lowercases the input; anything unrecognized fails `Unknown`.
    pub fn parse(s: &str) -> Result<Unit, UnitError> {
        match s.trim().to_lowercase().as_str() {
            "mg" | "milligram" | "milligrams" => Ok(Unit::Milligram),
            "g" | "gr" | "gram" | "grams" => Ok(Unit::Gram),
            "kg" | "kilo" | "kilos" | "kilogram" | "kilograms" => Ok(Unit::Kilogram),
            "ml" | "milliliter" | "milliliters" => Ok(Unit::Milliliter),
            "l" | "lt" | "liter" | "liters" => Ok(Unit::Liter),
            "u" | "un" | "und" | "unit" | "units" | "count" => Ok(Unit::Unit),
            "dz" | "doz" | "dozen" => Ok(Unit::Dozen),
            other => Err(UnitError::Unknown(other.to_string())),
        }
    }

    /// Linear scale to the category base unit, as a (numerator, denominator)
    /// ratio of base units per one of this unit.
    fn base_ratio(&self) -> (i64, i64) {
        match self {
            Unit::Milligram => (1, 1_000),
            Unit::Gram => (1, 1),
            Unit::Kilogram => (1_000, 1),
            Unit::Milliliter => (1, 1),
            Unit::Liter => (1_000, 1),
            Unit::Unit => (1, 1),
            Unit::Dozen => (12, 1),
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convert a quantity between two units of the same category.
///
/// The result must be exactly representable at the 3-decimal quantity scale;
/// a lossy conversion (e.g. 0.5 mg to grams) fails `NotRepresentable`.
pub fn convert(qty: Quantity, from: Unit, to: Unit) -> Result<Quantity, UnitError> {
    if from.category() != to.category() {
        return Err(UnitError::IncompatibleCategory { from, to });
    }
    if from == to {
        return Ok(qty);
    }
    let (from_num, from_den) = from.base_ratio();
    let (to_num, to_den) = to.base_ratio();

    let numerator = qty.as_milli() as i128 * from_num as i128 * to_den as i128;
    let denominator = from_den as i128 * to_num as i128;
    if numerator % denominator != 0 {
        return Err(UnitError::NotRepresentable);
    }
    let milli = numerator / denominator;
    i64::try_from(milli)
        .map(Quantity::from_milli)
        .map_err(|_| UnitError::NotRepresentable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn qty(s: &str) -> Quantity {
        Quantity::try_from(Decimal::from_str(s).unwrap()).unwrap()
    }

    #[test]
    fn parse_canonical_codes_and_aliases() {
        assert_eq!(Unit::parse("kg").unwrap(), Unit::Kilogram);
        assert_eq!(Unit::parse("gr").unwrap(), Unit::Gram);
        assert_eq!(Unit::parse(" G ").unwrap(), Unit::Gram);
        assert_eq!(Unit::parse("und").unwrap(), Unit::Unit);
        assert_eq!(Unit::parse("lt").unwrap(), Unit::Liter);
        assert_eq!(Unit::parse("dozen").unwrap(), Unit::Dozen);
    }

    #[test]
    fn parse_unknown_fails() {
        assert_eq!(
            Unit::parse("bag"),
            Err(UnitError::Unknown("bag".to_string()))
        );
    }

    #[test]
    fn category_base_units() {
        assert_eq!(Unit::Kilogram.base(), Unit::Gram);
        assert_eq!(Unit::Liter.base(), Unit::Milliliter);
        assert_eq!(Unit::Dozen.base(), Unit::Unit);
    }

    #[test]
    fn convert_within_category() {
        assert_eq!(
            convert(qty("2.5"), Unit::Kilogram, Unit::Gram).unwrap(),
            qty("2500")
        );
        assert_eq!(
            convert(qty("1500"), Unit::Gram, Unit::Kilogram).unwrap(),
            qty("1.5")
        );
        assert_eq!(
            convert(qty("3"), Unit::Liter, Unit::Milliliter).unwrap(),
            qty("3000")
        );
        assert_eq!(convert(qty("2"), Unit::Dozen, Unit::Unit).unwrap(), qty("24"));
    }

    #[test]
    fn convert_same_unit_is_identity() {
        assert_eq!(convert(qty("7.125"), Unit::Gram, Unit::Gram).unwrap(), qty("7.125"));
    }

    #[test]
    fn convert_across_categories_fails() {
        assert_eq!(
            convert(qty("1"), Unit::Gram, Unit::Milliliter),
            Err(UnitError::IncompatibleCategory {
                from: Unit::Gram,
                to: Unit::Milliliter,
            })
        );
    }

    #[test]
    fn convert_rejects_unrepresentable_results() {
        // 0.5 mg = 0.0005 g, below the 3-decimal scale
        assert_eq!(
            convert(qty("0.5"), Unit::Milligram, Unit::Gram),
            Err(UnitError::NotRepresentable)
        );
    }
}
