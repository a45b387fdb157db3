//! Lot ledger engine: FIFO-with-earliest-expiry consumption and lot credits
//!
//! One parameterized engine serves every call site that debits stock: raw
//! materials for production, packaging for stage transitions and finished
//! goods for sales. Each call site supplies only its candidate-selection
//! policy and movement metadata. Every mutation runs on the caller's open
//! transaction; candidate lots are locked with `FOR UPDATE` so concurrent
//! consumers serialize per lot and can never debit past zero.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::material::{fetch_material, Material};
use shared::{convert, LotState, MovementType, Quantity, Stage, Unit};

/// Lot ledger service
#[derive(Clone)]
pub struct LedgerService {
    db: PgPool,
}

/// A countable batch of a material or product.
#[derive(Debug, Clone, Serialize)]
pub struct Lot {
    pub id: Uuid,
    pub material_id: Uuid,
    pub code: String,
    pub stage: Option<Stage>,
    pub quantity: Quantity,
    pub intake_date: NaiveDate,
    pub expires_on: Option<NaiveDate>,
    pub state: LotState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct LotRow {
    id: Uuid,
    material_id: Uuid,
    code: String,
    stage: Option<String>,
    quantity: Decimal,
    intake_date: NaiveDate,
    expires_on: Option<NaiveDate>,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LotRow> for Lot {
    type Error = AppError;

    fn try_from(row: LotRow) -> Result<Self, Self::Error> {
        let stage = match row.stage.as_deref() {
            Some(s) => Some(
                Stage::from_str(s)
                    .ok_or_else(|| AppError::Internal(anyhow::anyhow!("bad lot stage: {s}")))?,
            ),
            None => None,
        };
        let state = LotState::from_str(&row.state)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("bad lot state: {}", row.state)))?;
        Ok(Lot {
            id: row.id,
            material_id: row.material_id,
            code: row.code,
            stage,
            quantity: Quantity::try_from(row.quantity)?,
            intake_date: row.intake_date,
            expires_on: row.expires_on,
            state,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// An immutable audit record, one per lot touched by any ledger operation.
#[derive(Debug, Clone, Serialize)]
pub struct Movement {
    pub id: Uuid,
    pub material_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub movement_type: MovementType,
    pub quantity: Quantity,
    pub reason: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Metadata stamped on the movements a ledger operation produces.
#[derive(Debug, Clone, Deserialize)]
pub struct MovementMeta {
    pub reason: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
}

/// Which lots a consumption may draw from. Each call site supplies its own
/// policy; the walk itself is identical everywhere.
#[derive(Debug, Clone)]
pub struct ConsumePolicy {
    pub states: Vec<LotState>,
    /// When set, lots expiring strictly before this date are excluded.
    pub not_expired_as_of: Option<NaiveDate>,
    /// When set, only lots in one of these stages are candidates.
    pub stages: Option<Vec<Stage>>,
}

impl ConsumePolicy {
    /// Raw-material consumption: available and reserved lots.
    pub fn raw() -> Self {
        Self {
            states: vec![LotState::Available, LotState::Reserved],
            not_expired_as_of: None,
            stages: None,
        }
    }

    /// Packaging-material consumption: available lots only.
    pub fn packaging() -> Self {
        Self {
            states: vec![LotState::Available],
            not_expired_as_of: None,
            stages: None,
        }
    }

    /// Finished-goods sale: available lots in sellable stages, not expired
    /// as of the sale date.
    pub fn sale(on: NaiveDate) -> Self {
        Self {
            states: vec![LotState::Available],
            not_expired_as_of: Some(on),
            stages: Some(vec![Stage::Packaged, Stage::Baked]),
        }
    }
}

/// A consumption request before unit normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumeRequest {
    pub quantity: Quantity,
    /// Unit the quantity is expressed in; the material's base unit when
    /// omitted. An explicit default, not a hidden fallback.
    pub unit: Option<String>,
    #[serde(flatten)]
    pub meta: MovementMeta,
}

/// Slim lot view the pure planner works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotView {
    pub id: Uuid,
    pub quantity: Quantity,
    pub intake_date: NaiveDate,
    pub expires_on: Option<NaiveDate>,
}

/// One planned debit against one lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedDebit {
    pub lot_id: Uuid,
    pub amount: Quantity,
    pub depletes_lot: bool,
}

/// Outcome of planning a consumption over a set of candidate lots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumePlan {
    pub debits: Vec<PlannedDebit>,
    pub shortfall: Quantity,
}

impl ConsumePlan {
    pub fn is_sufficient(&self) -> bool {
        self.shortfall.is_zero()
    }

    pub fn total_planned(&self) -> Quantity {
        self.debits.iter().map(|d| d.amount).sum()
    }
}

/// Result of a read-only consumption preview.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub material_id: Uuid,
    pub required: Quantity,
    pub unit: Unit,
    pub sufficient: bool,
    pub shortfall: Quantity,
    pub plan: Vec<PlannedDebit>,
}

/// Result of an executed consumption.
#[derive(Debug, Clone, Serialize)]
pub struct ConsumeOutcome {
    pub material_id: Uuid,
    pub consumed: Quantity,
    pub unit: Unit,
    pub movements: Vec<Movement>,
}

/// Input for crediting stock into a (possibly new) lot.
#[derive(Debug, Clone)]
pub struct CreditInput {
    pub code: String,
    pub stage: Option<Stage>,
    /// Quantity in the material's base unit.
    pub quantity: Quantity,
    pub intake_date: NaiveDate,
    pub expires_on: Option<NaiveDate>,
    pub meta: MovementMeta,
}

/// FIFO-with-earliest-expiry comparison: earliest expiration first (no
/// expiration last), then earliest intake, then id as the final tie-break.
fn fifo_order(a: &LotView, b: &LotView) -> std::cmp::Ordering {
    match (a.expires_on, b.expires_on) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
    .then(a.intake_date.cmp(&b.intake_date))
    .then(a.id.cmp(&b.id))
}

/// Plan a consumption over candidate lots without touching storage.
///
/// `consume` and `simulate` both go through this function, so previews can
/// never diverge from execution. The ordering mirrors the SQL fetch order.
pub fn plan_consumption(lots: &[LotView], required: Quantity) -> ConsumePlan {
    let mut candidates: Vec<&LotView> =
        lots.iter().filter(|l| l.quantity.is_positive()).collect();
    candidates.sort_by(|a, b| fifo_order(a, b));

    let mut remaining = required;
    let mut debits = Vec::new();
    for lot in candidates {
        if !remaining.is_positive() {
            break;
        }
        let amount = lot.quantity.min(remaining);
        if amount.is_positive() {
            debits.push(PlannedDebit {
                lot_id: lot.id,
                amount,
                depletes_lot: amount == lot.quantity,
            });
            remaining = remaining
                .checked_sub(amount)
                .unwrap_or(Quantity::ZERO);
        }
    }

    ConsumePlan {
        debits,
        shortfall: if remaining.is_positive() {
            remaining
        } else {
            Quantity::ZERO
        },
    }
}

impl LedgerService {
    /// Create a new LedgerService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Consume `request.quantity` of a material, debiting lots in
    /// FIFO-with-earliest-expiry order on the caller's transaction.
    ///
    /// Fails `InsufficientStock` with the exact shortfall when the candidate
    /// lots cannot cover the request; the caller must roll back so no
    /// partial debit survives.
    pub async fn consume(
        &self,
        conn: &mut PgConnection,
        material_id: Uuid,
        policy: &ConsumePolicy,
        request: &ConsumeRequest,
    ) -> AppResult<ConsumeOutcome> {
        let material = fetch_material(&mut *conn, material_id).await?;
        let required = self.normalize_request(&material, request)?;

        let candidates = fetch_candidate_lots(&mut *conn, material_id, policy, true).await?;
        let views: Vec<LotView> = candidates
            .iter()
            .map(|l| LotView {
                id: l.id,
                quantity: l.quantity,
                intake_date: l.intake_date,
                expires_on: l.expires_on,
            })
            .collect();

        let plan = plan_consumption(&views, required);
        if !plan.is_sufficient() {
            return Err(AppError::InsufficientStock {
                shortfall: plan.shortfall,
                unit: material.unit,
            });
        }

        let now = Utc::now();
        let mut movements = Vec::with_capacity(plan.debits.len());
        for debit in &plan.debits {
            let lot = candidates
                .iter()
                .find(|l| l.id == debit.lot_id)
                .ok_or_else(|| AppError::Internal(anyhow::anyhow!("planned lot vanished")))?;
            apply_debit(&mut *conn, lot, debit.amount).await?;
            let movement = record_movement(
                &mut *conn,
                NewMovement {
                    material_id,
                    lot_id: Some(lot.id),
                    movement_type: MovementType::Out,
                    quantity: debit.amount,
                    reason: request.meta.reason.clone(),
                    reference_type: request.meta.reference_type.clone(),
                    reference_id: request.meta.reference_id.clone(),
                    occurred_at: now,
                },
            )
            .await?;
            movements.push(movement);
        }

        tracing::debug!(
            material = %material.name,
            required = %required,
            lots = movements.len(),
            "consumed stock"
        );

        Ok(ConsumeOutcome {
            material_id,
            consumed: required,
            unit: material.unit,
            movements,
        })
    }

    /// Read-only twin of `consume`: identical selection predicate and
    /// ordering, returns the per-lot plan without writing anything.
    pub async fn simulate(
        &self,
        material_id: Uuid,
        policy: &ConsumePolicy,
        request: &ConsumeRequest,
    ) -> AppResult<SimulationResult> {
        let material = fetch_material(&self.db, material_id).await?;
        let required = self.normalize_request(&material, request)?;

        let mut conn = self.db.acquire().await?;
        let candidates = fetch_candidate_lots(&mut *conn, material_id, policy, false).await?;
        let views: Vec<LotView> = candidates
            .iter()
            .map(|l| LotView {
                id: l.id,
                quantity: l.quantity,
                intake_date: l.intake_date,
                expires_on: l.expires_on,
            })
            .collect();

        let plan = plan_consumption(&views, required);
        Ok(SimulationResult {
            material_id,
            required,
            unit: material.unit,
            sufficient: plan.is_sufficient(),
            shortfall: plan.shortfall,
            plan: plan.debits,
        })
    }

    /// Credit stock into a lot identified by (material, code, stage),
    /// creating it when absent, and record one IN movement.
    pub async fn credit(
        &self,
        conn: &mut PgConnection,
        material_id: Uuid,
        input: CreditInput,
    ) -> AppResult<(Lot, Movement)> {
        if !input.quantity.is_positive() {
            return Err(AppError::InvalidQuantity(format!(
                "credit quantity must be positive, got {}",
                input.quantity
            )));
        }

        let existing =
            fetch_lot_by_key_for_update(&mut *conn, material_id, &input.code, input.stage).await?;
        let lot = match existing {
            Some(lot) => apply_credit(&mut *conn, &lot, input.quantity).await?,
            None => {
                insert_lot(
                    &mut *conn,
                    material_id,
                    &input.code,
                    input.stage,
                    input.quantity,
                    input.intake_date,
                    input.expires_on,
                )
                .await?
            }
        };

        let movement = record_movement(
            &mut *conn,
            NewMovement {
                material_id,
                lot_id: Some(lot.id),
                movement_type: MovementType::In,
                quantity: input.quantity,
                reason: input.meta.reason,
                reference_type: input.meta.reference_type,
                reference_id: input.meta.reference_id,
                occurred_at: Utc::now(),
            },
        )
        .await?;

        Ok((lot, movement))
    }

    /// Validate the requested quantity and express it in the material's base
    /// unit. A missing unit string means the material's own unit.
    fn normalize_request(
        &self,
        material: &Material,
        request: &ConsumeRequest,
    ) -> AppResult<Quantity> {
        if !request.quantity.is_positive() {
            return Err(AppError::InvalidQuantity(format!(
                "requested quantity must be positive, got {}",
                request.quantity
            )));
        }
        let unit = match request.unit.as_deref() {
            Some(s) => Unit::parse(s)?,
            None => material.unit,
        };
        Ok(convert(request.quantity, unit, material.unit)?)
    }
}

/// Fetch candidate lots for a policy, ordered earliest-expiry first, then
/// intake date, then id. `lock` adds `FOR UPDATE` for the mutating path.
async fn fetch_candidate_lots(
    conn: &mut PgConnection,
    material_id: Uuid,
    policy: &ConsumePolicy,
    lock: bool,
) -> AppResult<Vec<Lot>> {
    let states: Vec<String> = policy.states.iter().map(|s| s.as_str().to_string()).collect();
    let stages: Option<Vec<String>> = policy
        .stages
        .as_ref()
        .map(|ss| ss.iter().map(|s| s.as_str().to_string()).collect());

    let base = r#"
        SELECT id, material_id, code, stage, quantity, intake_date, expires_on, state,
               created_at, updated_at
        FROM lots
        WHERE material_id = $1
          AND state = ANY($2)
          AND quantity > 0
          AND ($3::text[] IS NULL OR stage = ANY($3))
          AND ($4::date IS NULL OR expires_on IS NULL OR expires_on >= $4)
        ORDER BY expires_on ASC NULLS LAST, intake_date ASC, id ASC
        "#;
    let sql = if lock {
        format!("{base} FOR UPDATE")
    } else {
        base.to_string()
    };

    let rows = sqlx::query_as::<_, LotRow>(&sql)
        .bind(material_id)
        .bind(&states)
        .bind(&stages)
        .bind(policy.not_expired_as_of)
        .fetch_all(conn)
        .await?;

    rows.into_iter().map(Lot::try_from).collect()
}

/// Fetch and lock a lot by id.
pub(crate) async fn fetch_lot_for_update(
    conn: &mut PgConnection,
    lot_id: Uuid,
) -> AppResult<Option<Lot>> {
    let row = sqlx::query_as::<_, LotRow>(
        r#"
        SELECT id, material_id, code, stage, quantity, intake_date, expires_on, state,
               created_at, updated_at
        FROM lots
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(lot_id)
    .fetch_optional(conn)
    .await?;

    row.map(Lot::try_from).transpose()
}

/// Fetch and lock a lot by its (material, code, stage) identity.
pub(crate) async fn fetch_lot_by_key_for_update(
    conn: &mut PgConnection,
    material_id: Uuid,
    code: &str,
    stage: Option<Stage>,
) -> AppResult<Option<Lot>> {
    let row = sqlx::query_as::<_, LotRow>(
        r#"
        SELECT id, material_id, code, stage, quantity, intake_date, expires_on, state,
               created_at, updated_at
        FROM lots
        WHERE material_id = $1 AND code = $2 AND stage IS NOT DISTINCT FROM $3
        FOR UPDATE
        "#,
    )
    .bind(material_id)
    .bind(code)
    .bind(stage.map(|s| s.as_str()))
    .fetch_optional(conn)
    .await?;

    row.map(Lot::try_from).transpose()
}

/// Insert a fresh lot in state available.
pub(crate) async fn insert_lot(
    conn: &mut PgConnection,
    material_id: Uuid,
    code: &str,
    stage: Option<Stage>,
    quantity: Quantity,
    intake_date: NaiveDate,
    expires_on: Option<NaiveDate>,
) -> AppResult<Lot> {
    let row = sqlx::query_as::<_, LotRow>(
        r#"
        INSERT INTO lots (material_id, code, stage, quantity, intake_date, expires_on, state)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, material_id, code, stage, quantity, intake_date, expires_on, state,
                  created_at, updated_at
        "#,
    )
    .bind(material_id)
    .bind(code)
    .bind(stage.map(|s| s.as_str()))
    .bind(quantity.to_decimal())
    .bind(intake_date)
    .bind(expires_on)
    .bind(if quantity.is_zero() {
        LotState::Depleted.as_str()
    } else {
        LotState::Available.as_str()
    })
    .fetch_one(conn)
    .await?;

    row.try_into()
}

/// Debit a locked lot, flipping its state to depleted at exactly zero.
pub(crate) async fn apply_debit(
    conn: &mut PgConnection,
    lot: &Lot,
    amount: Quantity,
) -> AppResult<Lot> {
    let new_quantity = lot
        .quantity
        .checked_sub(amount)
        .filter(|q| !q.is_negative())
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("debit below zero on lot {}", lot.id)))?;
    let new_state = if new_quantity.is_zero() {
        LotState::Depleted
    } else {
        lot.state
    };

    let row = sqlx::query_as::<_, LotRow>(
        r#"
        UPDATE lots
        SET quantity = $1, state = $2, updated_at = NOW()
        WHERE id = $3
        RETURNING id, material_id, code, stage, quantity, intake_date, expires_on, state,
                  created_at, updated_at
        "#,
    )
    .bind(new_quantity.to_decimal())
    .bind(new_state.as_str())
    .bind(lot.id)
    .fetch_one(conn)
    .await?;

    row.try_into()
}

/// Credit a locked lot; a depleted lot receiving stock becomes available.
pub(crate) async fn apply_credit(
    conn: &mut PgConnection,
    lot: &Lot,
    amount: Quantity,
) -> AppResult<Lot> {
    let new_quantity = lot
        .quantity
        .checked_add(amount)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("credit overflow on lot {}", lot.id)))?;
    let new_state = if lot.state == LotState::Depleted && new_quantity.is_positive() {
        LotState::Available
    } else {
        lot.state
    };

    let row = sqlx::query_as::<_, LotRow>(
        r#"
        UPDATE lots
        SET quantity = $1, state = $2, updated_at = NOW()
        WHERE id = $3
        RETURNING id, material_id, code, stage, quantity, intake_date, expires_on, state,
                  created_at, updated_at
        "#,
    )
    .bind(new_quantity.to_decimal())
    .bind(new_state.as_str())
    .bind(lot.id)
    .fetch_one(conn)
    .await?;

    row.try_into()
}

/// Input for one audit movement.
pub(crate) struct NewMovement {
    pub material_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub movement_type: MovementType,
    pub quantity: Quantity,
    pub reason: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct MovementRow {
    id: Uuid,
    material_id: Uuid,
    lot_id: Option<Uuid>,
    movement_type: String,
    quantity: Decimal,
    reason: String,
    reference_type: Option<String>,
    reference_id: Option<String>,
    occurred_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for Movement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let movement_type = MovementType::from_str(&row.movement_type).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("bad movement type: {}", row.movement_type))
        })?;
        Ok(Movement {
            id: row.id,
            material_id: row.material_id,
            lot_id: row.lot_id,
            movement_type,
            quantity: Quantity::try_from(row.quantity)?,
            reason: row.reason,
            reference_type: row.reference_type,
            reference_id: row.reference_id,
            occurred_at: row.occurred_at,
        })
    }
}

/// Append one immutable movement row.
pub(crate) async fn record_movement(
    conn: &mut PgConnection,
    movement: NewMovement,
) -> AppResult<Movement> {
    let row = sqlx::query_as::<_, MovementRow>(
        r#"
        INSERT INTO movements (material_id, lot_id, movement_type, quantity, reason,
                               reference_type, reference_id, occurred_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, material_id, lot_id, movement_type, quantity, reason,
                  reference_type, reference_id, occurred_at
        "#,
    )
    .bind(movement.material_id)
    .bind(movement.lot_id)
    .bind(movement.movement_type.as_str())
    .bind(movement.quantity.to_decimal())
    .bind(&movement.reason)
    .bind(&movement.reference_type)
    .bind(&movement.reference_id)
    .bind(movement.occurred_at)
    .fetch_one(conn)
    .await?;

    row.try_into()
}
