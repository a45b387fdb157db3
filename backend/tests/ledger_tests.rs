//! Lot ledger planning tests
//!
//! Covers the FIFO-with-earliest-expiry planner shared by consumption and
//! simulation: ordering, exact shortfalls, lot depletion flags, and
//! conservation of planned quantity.

use chrono::NaiveDate;
use proptest::prelude::*;
use uuid::Uuid;

use bakery_backend::services::ledger::{plan_consumption, LotView};
use shared::Quantity;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn qty(milli: i64) -> Quantity {
    Quantity::from_milli(milli)
}

fn lot(id: u128, quantity: Quantity, intake: NaiveDate, expires: Option<NaiveDate>) -> LotView {
    LotView {
        id: Uuid::from_u128(id),
        quantity,
        intake_date: intake,
        expires_on: expires,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[test]
fn earliest_expiry_is_consumed_first() {
    let lots = vec![
        lot(1, qty(5_000), date(2026, 1, 1), Some(date(2026, 3, 1))),
        lot(2, qty(5_000), date(2026, 1, 2), Some(date(2026, 2, 1))),
    ];

    let plan = plan_consumption(&lots, qty(3_000));

    assert!(plan.is_sufficient());
    assert_eq!(plan.debits.len(), 1);
    assert_eq!(plan.debits[0].lot_id, Uuid::from_u128(2));
    assert_eq!(plan.debits[0].amount, qty(3_000));
    assert!(!plan.debits[0].depletes_lot);
}

#[test]
fn lots_without_expiry_come_last() {
    let lots = vec![
        lot(1, qty(2_000), date(2026, 1, 1), None),
        lot(2, qty(2_000), date(2026, 1, 5), Some(date(2026, 6, 1))),
    ];

    let plan = plan_consumption(&lots, qty(3_000));

    assert!(plan.is_sufficient());
    assert_eq!(plan.debits[0].lot_id, Uuid::from_u128(2));
    assert!(plan.debits[0].depletes_lot);
    assert_eq!(plan.debits[1].lot_id, Uuid::from_u128(1));
    assert_eq!(plan.debits[1].amount, qty(1_000));
}

#[test]
fn intake_date_breaks_expiry_ties() {
    let expiry = Some(date(2026, 4, 1));
    let lots = vec![
        lot(1, qty(1_000), date(2026, 1, 10), expiry),
        lot(2, qty(1_000), date(2026, 1, 2), expiry),
    ];

    let plan = plan_consumption(&lots, qty(1_500));

    assert_eq!(plan.debits[0].lot_id, Uuid::from_u128(2));
    assert_eq!(plan.debits[1].lot_id, Uuid::from_u128(1));
}

#[test]
fn id_breaks_full_ties() {
    let expiry = Some(date(2026, 4, 1));
    let intake = date(2026, 1, 1);
    let lots = vec![
        lot(9, qty(1_000), intake, expiry),
        lot(3, qty(1_000), intake, expiry),
    ];

    let plan = plan_consumption(&lots, qty(500));

    assert_eq!(plan.debits[0].lot_id, Uuid::from_u128(3));
}

#[test]
fn shortfall_is_exact() {
    let lots = vec![
        lot(1, qty(2_500), date(2026, 1, 1), None),
        lot(2, qty(1_000), date(2026, 1, 2), None),
    ];

    let plan = plan_consumption(&lots, qty(5_000));

    assert!(!plan.is_sufficient());
    assert_eq!(plan.shortfall, qty(1_500));
    assert_eq!(plan.total_planned(), qty(3_500));
}

#[test]
fn empty_candidates_short_by_full_amount() {
    let plan = plan_consumption(&[], qty(4_000));

    assert!(plan.debits.is_empty());
    assert_eq!(plan.shortfall, qty(4_000));
}

#[test]
fn zero_quantity_lots_are_skipped() {
    let lots = vec![
        lot(1, Quantity::ZERO, date(2026, 1, 1), Some(date(2026, 1, 15))),
        lot(2, qty(2_000), date(2026, 1, 2), Some(date(2026, 2, 1))),
    ];

    let plan = plan_consumption(&lots, qty(1_000));

    assert_eq!(plan.debits.len(), 1);
    assert_eq!(plan.debits[0].lot_id, Uuid::from_u128(2));
}

#[test]
fn exact_depletion_flags_every_lot() {
    let lots = vec![
        lot(1, qty(1_000), date(2026, 1, 1), Some(date(2026, 2, 1))),
        lot(2, qty(2_000), date(2026, 1, 1), Some(date(2026, 3, 1))),
    ];

    let plan = plan_consumption(&lots, qty(3_000));

    assert!(plan.is_sufficient());
    assert!(plan.debits.iter().all(|d| d.depletes_lot));
}

/// Two-lot walkthrough: 1.2 kg of flour across a 0.8 kg lot expiring first
/// and a 2 kg lot expiring later drains the first and dips into the second.
#[test]
fn two_lot_consumption_walkthrough() {
    let lots = vec![
        lot(1, qty(800), date(2026, 1, 3), Some(date(2026, 1, 20))),
        lot(2, qty(2_000), date(2026, 1, 1), Some(date(2026, 2, 10))),
    ];

    let plan = plan_consumption(&lots, qty(1_200));

    assert!(plan.is_sufficient());
    assert_eq!(plan.debits.len(), 2);
    assert_eq!(plan.debits[0].lot_id, Uuid::from_u128(1));
    assert_eq!(plan.debits[0].amount, qty(800));
    assert!(plan.debits[0].depletes_lot);
    assert_eq!(plan.debits[1].lot_id, Uuid::from_u128(2));
    assert_eq!(plan.debits[1].amount, qty(400));
    assert!(!plan.debits[1].depletes_lot);
}

/// Mixed expirations: the expiring lot drains fully before the open-dated
/// one, which is left partially consumed.
#[test]
fn expiring_lot_drains_before_open_dated_lot() {
    let lots = vec![
        lot(1, Quantity::from_units(10), date(2026, 1, 1), None),
        lot(2, Quantity::from_units(5), date(2026, 1, 2), Some(date(2026, 1, 10))),
    ];

    let plan = plan_consumption(&lots, Quantity::from_units(12));

    assert!(plan.is_sufficient());
    assert_eq!(plan.debits.len(), 2);
    assert_eq!(plan.debits[0].lot_id, Uuid::from_u128(2));
    assert_eq!(plan.debits[0].amount, Quantity::from_units(5));
    assert!(plan.debits[0].depletes_lot);
    assert_eq!(plan.debits[1].lot_id, Uuid::from_u128(1));
    assert_eq!(plan.debits[1].amount, Quantity::from_units(7));
    assert!(!plan.debits[1].depletes_lot);
}

// ============================================================================
// Property Tests
// ============================================================================

prop_compose! {
    fn arb_lot()(
        id in 1u128..10_000,
        quantity in 0i64..50_000,
        intake_day in 0u32..300,
        expires in proptest::option::of(0u32..300),
    ) -> LotView {
        let base = date(2026, 1, 1);
        lot(
            id,
            qty(quantity),
            base + chrono::Duration::days(intake_day as i64),
            expires.map(|d| base + chrono::Duration::days(d as i64)),
        )
    }
}

proptest! {
    /// Planned total plus shortfall always equals the requirement.
    #[test]
    fn planned_plus_shortfall_is_required(
        lots in proptest::collection::vec(arb_lot(), 0..12),
        required in 1i64..100_000,
    ) {
        let required = qty(required);
        let plan = plan_consumption(&lots, required);
        let covered = plan.total_planned().checked_add(plan.shortfall).unwrap();
        prop_assert_eq!(covered, required);
    }

    /// No debit exceeds its lot, and no lot is debited twice.
    #[test]
    fn debits_respect_lot_quantities(
        lots in proptest::collection::vec(arb_lot(), 0..12),
        required in 1i64..100_000,
    ) {
        let plan = plan_consumption(&lots, qty(required));
        let mut seen = std::collections::HashSet::new();
        for debit in &plan.debits {
            prop_assert!(seen.insert(debit.lot_id));
            let source = lots.iter().find(|l| l.id == debit.lot_id).unwrap();
            prop_assert!(debit.amount <= source.quantity);
            prop_assert!(debit.amount.is_positive());
            prop_assert_eq!(debit.depletes_lot, debit.amount == source.quantity);
        }
    }

    /// Every lot drawn from after the first is no earlier in consumption
    /// order, and all debits except the last fully deplete their lot.
    #[test]
    fn debits_follow_consumption_order(
        lots in proptest::collection::vec(arb_lot(), 0..12),
        required in 1i64..100_000,
    ) {
        let plan = plan_consumption(&lots, qty(required));
        for pair in plan.debits.windows(2) {
            prop_assert!(pair[0].depletes_lot);
            let a = lots.iter().find(|l| l.id == pair[0].lot_id).unwrap();
            let b = lots.iter().find(|l| l.id == pair[1].lot_id).unwrap();
            let ordered = match (a.expires_on, b.expires_on) {
                (Some(x), Some(y)) => x < y
                    || (x == y
                        && (a.intake_date, a.id) <= (b.intake_date, b.id)),
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => (a.intake_date, a.id) <= (b.intake_date, b.id),
            };
            prop_assert!(ordered);
        }
    }
}
