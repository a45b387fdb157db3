//! Stage transition rule tests
//!
//! Covers the pure transition rules: which moves are legal, packaging
//! multiple enforcement, packaging material requirements, destination lot
//! codes and expiration derivation.

use chrono::NaiveDate;
use proptest::prelude::*;

use bakery_backend::error::AppError;
use bakery_backend::services::stage::{
    check_packaging_multiple, destination_code, packaging_units_required, resolve_expiration,
    validate_stage_move,
};
use shared::{Quantity, Stage};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ============================================================================
// Stage move validation
// ============================================================================

#[test]
fn frozen_moves_to_sellable_stages() {
    assert!(validate_stage_move(Stage::Frozen, Stage::Packaged).is_ok());
    assert!(validate_stage_move(Stage::Frozen, Stage::Baked).is_ok());
}

#[test]
fn only_frozen_stock_may_move() {
    for from in [Stage::Packaged, Stage::Baked] {
        for to in [Stage::Frozen, Stage::Packaged, Stage::Baked] {
            let err = validate_stage_move(from, to).unwrap_err();
            assert!(matches!(err, AppError::InvalidTransition { .. }));
        }
    }
}

#[test]
fn frozen_to_frozen_is_rejected() {
    assert!(matches!(
        validate_stage_move(Stage::Frozen, Stage::Frozen),
        Err(AppError::InvalidTransition { .. })
    ));
}

// ============================================================================
// Packaging multiples
// ============================================================================

#[test]
fn exact_multiple_yields_package_count() {
    let packages = check_packaging_multiple(Quantity::from_units(18), Some(6)).unwrap();
    assert_eq!(packages, Some(3));
}

#[test]
fn non_multiple_reports_packages_and_remainder() {
    let err = check_packaging_multiple(Quantity::from_units(16), Some(6)).unwrap_err();
    match err {
        AppError::PackagingMultipleViolation {
            packages,
            remainder,
        } => {
            assert_eq!(packages, 2);
            assert_eq!(remainder, Quantity::from_units(4));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn missing_multiple_skips_the_check() {
    assert_eq!(
        check_packaging_multiple(Quantity::from_units(7), None).unwrap(),
        None
    );
    assert_eq!(
        check_packaging_multiple(Quantity::from_units(7), Some(0)).unwrap(),
        None
    );
}

#[test]
fn packaging_units_for_configured_multiple() {
    let units = packaging_units_required(Quantity::from_units(18), Some(6)).unwrap();
    assert_eq!(units, Quantity::from_units(18));
}

#[test]
fn packaging_units_without_multiple_round_up() {
    let units = packaging_units_required(Quantity::from_milli(2_500), None).unwrap();
    assert_eq!(units, Quantity::from_units(3));
}

proptest! {
    /// Any quantity that passes the multiple check converts back exactly.
    #[test]
    fn passing_quantities_are_whole_packages(packages in 1i64..500, multiple in 1i32..48) {
        let qty = Quantity::from_units(packages * multiple as i64);
        let counted = check_packaging_multiple(qty, Some(multiple)).unwrap();
        prop_assert_eq!(counted, Some(packages));
    }
}

// ============================================================================
// Destination lots
// ============================================================================

#[test]
fn destination_codes_carry_the_stage_suffix() {
    assert_eq!(destination_code("CRX-0142", Stage::Packaged), "CRX-0142-P");
    assert_eq!(destination_code("CRX-0142", Stage::Baked), "CRX-0142-B");
}

#[test]
fn shelf_life_rule_overrides_source_expiration() {
    let derived = resolve_expiration(
        Some(date(2026, 9, 1)),
        Some(14),
        date(2026, 8, 20),
    );
    assert_eq!(derived, Some(date(2026, 9, 3)));
}

#[test]
fn source_expiration_is_inherited_without_a_rule() {
    let derived = resolve_expiration(Some(date(2026, 9, 1)), None, date(2026, 8, 20));
    assert_eq!(derived, Some(date(2026, 9, 1)));

    let none = resolve_expiration(None, None, date(2026, 8, 20));
    assert_eq!(none, None);
}
