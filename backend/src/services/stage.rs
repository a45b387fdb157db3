//! Stage transition engine for finished-goods lots
//!
//! Finished goods leave production frozen and move into a sellable stage
//! (packaged or baked). A transition debits the frozen source lot, credits a
//! destination lot derived from the source code, consumes packaging
//! materials through the ledger, and, when the product is mapped to the
//! external marketplace, enqueues an intake notification on the same
//! transaction.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::ledger::{
    self, ConsumePolicy, ConsumeRequest, LedgerService, Lot, MovementMeta,
};
use crate::services::material::{fetch_material, Material};
use crate::services::outbox::{NewOutboxJob, OutboxService};
use crate::services::stock::StockService;
use shared::{IntakePayload, MovementType, Quantity, Stage};

/// Reference type stamped on the movements of a stage transition.
pub const STAGE_CHANGE_REF: &str = "stage_change";

/// Outbox job type for finished-goods intake notifications.
pub const INGRESS_JOB_TYPE: &str = "ingress";

/// Stage transition service
#[derive(Clone)]
pub struct StageService {
    db: PgPool,
    ledger: LedgerService,
    stock: StockService,
    outbox: OutboxService,
}

/// Input for moving quantity between stages
#[derive(Debug, Deserialize)]
pub struct TransitionInput {
    pub destination: Stage,
    pub quantity: Quantity,
    /// Effective timestamp; now when omitted.
    pub effective_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

/// Result of a stage transition
#[derive(Debug, Serialize)]
pub struct TransitionOutcome {
    pub source_lot: Lot,
    pub destination_lot: Lot,
    pub packages: Option<i64>,
    pub marketplace_notified: bool,
}

/// Only frozen stock may move, and only into a sellable stage.
pub fn validate_stage_move(from: Stage, to: Stage) -> AppResult<()> {
    if from != Stage::Frozen || !to.is_sellable() {
        return Err(AppError::InvalidTransition { from, to });
    }
    Ok(())
}

/// Check a quantity against the product's packaging multiple and return the
/// whole-package count. A non-exact quantity fails with the computed
/// packages and remainder so the caller can render an actionable message.
pub fn check_packaging_multiple(qty: Quantity, multiple: Option<i32>) -> AppResult<Option<i64>> {
    let Some(multiple) = multiple.filter(|m| *m > 0) else {
        return Ok(None);
    };
    let (packages, remainder) = qty
        .split_packages(multiple as i64)
        .ok_or_else(|| AppError::InvalidQuantity(format!("cannot package {qty}")))?;
    if !remainder.is_zero() {
        return Err(AppError::PackagingMultipleViolation {
            packages,
            remainder,
        });
    }
    Ok(Some(packages))
}

/// Packaging-material units a packaged transition consumes: whole packages
/// times units per package, or one packaging unit per product unit (rounded
/// up) when the product defines no multiple.
pub fn packaging_units_required(qty: Quantity, multiple: Option<i32>) -> AppResult<Quantity> {
    match multiple.filter(|m| *m > 0) {
        Some(m) => {
            let packages = check_packaging_multiple(qty, Some(m))?.unwrap_or(0);
            Ok(Quantity::from_units(packages * m as i64))
        }
        None => {
            let units = qty
                .packages_ceil(1)
                .ok_or_else(|| AppError::InvalidQuantity(format!("cannot package {qty}")))?;
            Ok(Quantity::from_units(units))
        }
    }
}

/// Destination lot code: source code plus the stage suffix. Deterministic;
/// true duplicates are rejected by the (material, code, stage) uniqueness
/// constraint instead of being disambiguated with timestamps.
pub fn destination_code(source_code: &str, destination: Stage) -> String {
    format!("{}-{}", source_code, destination.code_suffix())
}

/// Expiration for a newly created destination lot: a stage-keyed shelf-life
/// rule wins over inheriting the source expiration.
pub fn resolve_expiration(
    source_expires_on: Option<NaiveDate>,
    shelf_life_days: Option<i32>,
    transition_date: NaiveDate,
) -> Option<NaiveDate> {
    match shelf_life_days {
        Some(days) => Some(transition_date + chrono::Duration::days(days as i64)),
        None => source_expires_on,
    }
}

impl StageService {
    /// Create a new StageService instance
    pub fn new(db: PgPool, outbox: OutboxService) -> Self {
        let ledger = LedgerService::new(db.clone());
        let stock = StockService::new(db.clone());
        Self {
            db,
            ledger,
            stock,
            outbox,
        }
    }

    /// Move `input.quantity` of a frozen lot into a sellable stage.
    /// All steps run in one transaction; any failure aborts every write.
    pub async fn transition(
        &self,
        lot_id: Uuid,
        input: TransitionInput,
    ) -> AppResult<TransitionOutcome> {
        if !input.quantity.is_positive() {
            return Err(AppError::InvalidQuantity(format!(
                "transition quantity must be positive, got {}",
                input.quantity
            )));
        }

        let effective_at = input.effective_at.unwrap_or_else(Utc::now);
        let effective_date = effective_at.date_naive();

        let mut tx = self.db.begin().await?;

        let source = ledger::fetch_lot_for_update(&mut tx, lot_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Lot".to_string()))?;
        let source_stage = source
            .stage
            .ok_or_else(|| AppError::NotFound("Finished-goods lot".to_string()))?;
        validate_stage_move(source_stage, input.destination)?;

        if input.quantity > source.quantity {
            return Err(AppError::InsufficientLotStock {
                available: source.quantity,
                requested: input.quantity,
            });
        }

        let product = fetch_material(&mut *tx, source.material_id).await?;

        // Packaging rules apply only when moving into the packaged stage.
        let (packages, packaging_consumed) = if input.destination == Stage::Packaged {
            let packages = check_packaging_multiple(input.quantity, product.packaging_multiple)?;
            let consumed = self
                .consume_packaging(&mut tx, &product, &source, input.quantity)
                .await?;
            (packages, consumed)
        } else {
            (None, None)
        };

        let destination = self
            .find_or_create_destination(
                &mut tx,
                &product,
                &source,
                input.destination,
                effective_date,
            )
            .await?;

        // Debit source, credit destination; the movements reference each
        // other through the counterpart lot id.
        let source = ledger::apply_debit(&mut tx, &source, input.quantity).await?;
        ledger::record_movement(
            &mut tx,
            ledger::NewMovement {
                material_id: product.id,
                lot_id: Some(source.id),
                movement_type: MovementType::Out,
                quantity: input.quantity,
                reason: input
                    .reason
                    .clone()
                    .unwrap_or_else(|| format!("stage change to {}", input.destination.as_str())),
                reference_type: Some(STAGE_CHANGE_REF.to_string()),
                reference_id: Some(destination.id.to_string()),
                occurred_at: effective_at,
            },
        )
        .await?;

        let destination = ledger::apply_credit(&mut tx, &destination, input.quantity).await?;
        ledger::record_movement(
            &mut tx,
            ledger::NewMovement {
                material_id: product.id,
                lot_id: Some(destination.id),
                movement_type: MovementType::In,
                quantity: input.quantity,
                reason: input
                    .reason
                    .unwrap_or_else(|| format!("stage change from {}", source_stage.as_str())),
                reference_type: Some(STAGE_CHANGE_REF.to_string()),
                reference_id: Some(source.id.to_string()),
                occurred_at: effective_at,
            },
        )
        .await?;

        self.stock.recalculate(&mut tx, product.id).await?;
        if let Some(packaging_id) = packaging_consumed {
            self.stock.recalculate(&mut tx, packaging_id).await?;
        }

        let marketplace_notified = match &product.marketplace_ref {
            Some(marketplace_ref) if input.destination.is_sellable() => {
                let payload = IntakePayload {
                    marketplace_ref: marketplace_ref.clone(),
                    lot_code: destination.code.clone(),
                    stage: input.destination,
                    quantity: input.quantity,
                    expires_on: destination.expires_on,
                };
                self.outbox
                    .enqueue(
                        &mut tx,
                        NewOutboxJob {
                            job_type: INGRESS_JOB_TYPE.to_string(),
                            reference_id: destination.id.to_string(),
                            payload: serde_json::to_value(&payload)
                                .map_err(|e| AppError::Internal(e.into()))?,
                        },
                    )
                    .await?;
                true
            }
            _ => false,
        };

        tx.commit().await?;

        tracing::info!(
            product = %product.name,
            from = source_stage.as_str(),
            to = input.destination.as_str(),
            quantity = %input.quantity,
            "stage transition committed"
        );

        Ok(TransitionOutcome {
            source_lot: source,
            destination_lot: destination,
            packages,
            marketplace_notified,
        })
    }

    /// Consume packaging material for a packaged transition. Returns the
    /// packaging material id when something was consumed.
    async fn consume_packaging(
        &self,
        tx: &mut PgConnection,
        product: &Material,
        source: &Lot,
        quantity: Quantity,
    ) -> AppResult<Option<Uuid>> {
        let Some(packaging_id) = product.packaging_material_id else {
            return Ok(None);
        };
        let required = packaging_units_required(quantity, product.packaging_multiple)?;
        if !required.is_positive() {
            return Ok(None);
        }

        self.ledger
            .consume(
                tx,
                packaging_id,
                &ConsumePolicy::packaging(),
                &ConsumeRequest {
                    quantity: required,
                    unit: None,
                    meta: MovementMeta {
                        reason: "packaging for stage change".to_string(),
                        reference_type: Some(STAGE_CHANGE_REF.to_string()),
                        reference_id: Some(source.id.to_string()),
                    },
                },
            )
            .await?;

        Ok(Some(packaging_id))
    }

    /// Locate the destination lot by (product, derived code, stage); create
    /// it empty when absent, deriving its expiration.
    async fn find_or_create_destination(
        &self,
        tx: &mut PgConnection,
        product: &Material,
        source: &Lot,
        destination: Stage,
        effective_date: NaiveDate,
    ) -> AppResult<Lot> {
        let code = destination_code(&source.code, destination);

        if let Some(lot) =
            ledger::fetch_lot_by_key_for_update(tx, product.id, &code, Some(destination)).await?
        {
            return Ok(lot);
        }

        let shelf_life_days = self
            .shelf_life_for_stage(&mut *tx, product.id, destination)
            .await?;
        let expires_on = resolve_expiration(source.expires_on, shelf_life_days, effective_date);

        ledger::insert_lot(
            tx,
            product.id,
            &code,
            Some(destination),
            Quantity::ZERO,
            effective_date,
            expires_on,
        )
        .await
    }

    /// Stage-keyed shelf-life rule from the product's recipe mapping.
    async fn shelf_life_for_stage(
        &self,
        tx: &mut PgConnection,
        product_id: Uuid,
        stage: Stage,
    ) -> AppResult<Option<i32>> {
        let days = sqlx::query_scalar::<_, i32>(
            "SELECT shelf_life_days FROM product_shelf_life WHERE product_id = $1 AND stage = $2",
        )
        .bind(product_id)
        .bind(stage.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        Ok(days)
    }
}
