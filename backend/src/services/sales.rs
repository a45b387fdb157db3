//! Sales recording
//!
//! A sale is a ledger consumption of a finished good restricted to sellable,
//! unexpired lots, followed by an aggregate recalculation. Nothing else:
//! pricing, customers and fulfilment live outside this system.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::ledger::{ConsumePolicy, ConsumeRequest, LedgerService, Movement, MovementMeta};
use crate::services::stock::StockService;
use shared::Quantity;

/// Reference type stamped on sale movements.
pub const SALE_REF: &str = "sale";

/// Sales service
#[derive(Clone)]
pub struct SalesService {
    db: PgPool,
    ledger: LedgerService,
    stock: StockService,
}

/// Input for recording a sale
#[derive(Debug, Deserialize)]
pub struct RecordSaleInput {
    pub product_id: Uuid,
    pub quantity: Quantity,
    /// Sale date; today when omitted. Lots expiring before this date are
    /// never drawn from.
    pub sold_on: Option<NaiveDate>,
    /// External order identifier, carried onto the movements.
    pub order_ref: Option<String>,
}

/// Result of a recorded sale
#[derive(Debug, Serialize)]
pub struct SaleOutcome {
    pub product_id: Uuid,
    pub quantity: Quantity,
    pub sold_on: NaiveDate,
    pub movements: Vec<Movement>,
    pub available_stock: Quantity,
}

impl SalesService {
    /// Create a new SalesService instance
    pub fn new(db: PgPool) -> Self {
        let ledger = LedgerService::new(db.clone());
        let stock = StockService::new(db.clone());
        Self { db, ledger, stock }
    }

    /// Record a sale, debiting sellable lots in FIFO-with-earliest-expiry
    /// order. Fails without writing anything when stock cannot cover it.
    pub async fn record_sale(&self, input: RecordSaleInput) -> AppResult<SaleOutcome> {
        let sold_on = input
            .sold_on
            .unwrap_or_else(|| chrono::Utc::now().date_naive());

        let mut tx = self.db.begin().await?;

        let outcome = self
            .ledger
            .consume(
                &mut tx,
                input.product_id,
                &ConsumePolicy::sale(sold_on),
                &ConsumeRequest {
                    quantity: input.quantity,
                    unit: None,
                    meta: MovementMeta {
                        reason: "sale".to_string(),
                        reference_type: Some(SALE_REF.to_string()),
                        reference_id: input.order_ref.clone(),
                    },
                },
            )
            .await?;

        let available_stock = self.stock.recalculate(&mut tx, input.product_id).await?;

        tx.commit().await?;

        tracing::info!(
            product = %input.product_id,
            quantity = %outcome.consumed,
            %sold_on,
            "sale recorded"
        );

        Ok(SaleOutcome {
            product_id: input.product_id,
            quantity: outcome.consumed,
            sold_on,
            movements: outcome.movements,
            available_stock,
        })
    }
}
