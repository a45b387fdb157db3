//! Stock aggregation tests
//!
//! Covers which lots count toward a material's available stock.

use proptest::prelude::*;

use bakery_backend::services::stock::{aggregate_stock, StockLotView};
use shared::{LotState, MaterialKind, Quantity, Stage};

fn view(state: LotState, stage: Option<Stage>, milli: i64) -> StockLotView {
    StockLotView {
        state,
        stage,
        quantity: Quantity::from_milli(milli),
    }
}

#[test]
fn raw_materials_count_available_and_reserved() {
    let lots = vec![
        view(LotState::Available, None, 1_000),
        view(LotState::Reserved, None, 2_000),
        view(LotState::Depleted, None, 0),
        view(LotState::Expired, None, 5_000),
        view(LotState::Inactive, None, 7_000),
    ];

    assert_eq!(
        aggregate_stock(MaterialKind::Raw, &lots),
        Quantity::from_milli(3_000)
    );
}

#[test]
fn finished_goods_count_only_sellable_stages() {
    let lots = vec![
        view(LotState::Available, Some(Stage::Frozen), 10_000),
        view(LotState::Available, Some(Stage::Packaged), 4_000),
        view(LotState::Available, Some(Stage::Baked), 2_000),
        view(LotState::Available, None, 8_000),
    ];

    assert_eq!(
        aggregate_stock(MaterialKind::Finished, &lots),
        Quantity::from_milli(6_000)
    );
}

#[test]
fn empty_lot_set_aggregates_to_zero() {
    assert_eq!(aggregate_stock(MaterialKind::Packaging, &[]), Quantity::ZERO);
}

proptest! {
    /// The aggregate never exceeds the plain sum of all lot quantities.
    #[test]
    fn aggregate_is_bounded_by_total(
        quantities in proptest::collection::vec(0i64..100_000, 0..10),
    ) {
        let lots: Vec<StockLotView> = quantities
            .iter()
            .map(|q| view(LotState::Available, Some(Stage::Packaged), *q))
            .collect();
        let total: Quantity = quantities.iter().map(|q| Quantity::from_milli(*q)).sum();
        for kind in [MaterialKind::Raw, MaterialKind::Packaging, MaterialKind::Finished] {
            prop_assert!(aggregate_stock(kind, &lots) <= total);
        }
    }
}
