//! Stock aggregate recalculator
//!
//! `materials.available_stock` is derived state. It is always recomputed in
//! full from the lots it summarizes, never patched incrementally. The
//! recalculation must run inside the same transaction as, and after, any lot
//! mutation for the material.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::material::fetch_material;
use shared::{LotState, MaterialKind, Quantity, Stage};

/// Stock aggregate service
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
}

/// The per-lot fields the aggregate depends on.
#[derive(Debug, Clone)]
pub struct StockLotView {
    pub state: LotState,
    pub stage: Option<Stage>,
    pub quantity: Quantity,
}

/// Sum the lots that count toward available stock: states available and
/// reserved, and for finished goods only lots in a sellable stage.
pub fn aggregate_stock(kind: MaterialKind, lots: &[StockLotView]) -> Quantity {
    lots.iter()
        .filter(|l| l.state.is_countable())
        .filter(|l| match kind {
            MaterialKind::Finished => l.stage.map(|s| s.is_sellable()).unwrap_or(false),
            _ => true,
        })
        .map(|l| l.quantity)
        .sum()
}

impl StockService {
    /// Create a new StockService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Recompute the aggregate on a fresh connection, outside any caller
    /// transaction. For repair jobs and ad-hoc fixes.
    pub async fn recalculate_standalone(&self, material_id: Uuid) -> AppResult<Quantity> {
        let mut conn = self.db.acquire().await?;
        self.recalculate(&mut conn, material_id).await
    }

    /// Recompute and persist the available-stock aggregate for a material.
    /// Idempotent; safe to call redundantly.
    pub async fn recalculate(
        &self,
        conn: &mut PgConnection,
        material_id: Uuid,
    ) -> AppResult<Quantity> {
        let material = fetch_material(&mut *conn, material_id).await?;

        let rows = sqlx::query_as::<_, (String, Option<String>, Decimal)>(
            "SELECT state, stage, quantity FROM lots WHERE material_id = $1",
        )
        .bind(material_id)
        .fetch_all(&mut *conn)
        .await?;

        let lots: Vec<StockLotView> = rows
            .into_iter()
            .map(|(state, stage, quantity)| {
                let state = LotState::from_str(&state).ok_or_else(|| {
                    AppError::Internal(anyhow::anyhow!("bad lot state: {state}"))
                })?;
                let stage = stage
                    .as_deref()
                    .map(|s| {
                        Stage::from_str(s).ok_or_else(|| {
                            AppError::Internal(anyhow::anyhow!("bad lot stage: {s}"))
                        })
                    })
                    .transpose()?;
                Ok(StockLotView {
                    state,
                    stage,
                    quantity: Quantity::try_from(quantity)?,
                })
            })
            .collect::<AppResult<_>>()?;

        let total = aggregate_stock(material.kind, &lots);

        sqlx::query("UPDATE materials SET available_stock = $1, updated_at = NOW() WHERE id = $2")
            .bind(total.to_decimal())
            .bind(material_id)
            .execute(&mut *conn)
            .await?;

        tracing::debug!(material = %material.name, total = %total, "recalculated available stock");

        Ok(total)
    }
}
