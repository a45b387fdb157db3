//! Production run orchestrator
//!
//! Thin sequencing layer over the ledger: one run debits every recipe
//! ingredient and credits a frozen finished-goods lot per output product,
//! all inside one transaction. Long runs touch many lots; callers should
//! allow a transaction timeout proportional to the lot count.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::ledger::{
    ConsumePolicy, ConsumeRequest, LedgerService, CreditInput, MovementMeta,
};
use crate::services::material::fetch_material;
use crate::services::stock::StockService;
use shared::{Quantity, Stage};

/// Reference type stamped on production movements.
pub const PRODUCTION_RUN_REF: &str = "production_run";

/// Production orchestration service
#[derive(Clone)]
pub struct ProductionService {
    db: PgPool,
    ledger: LedgerService,
    stock: StockService,
}

/// One recipe ingredient line.
#[derive(Debug, sqlx::FromRow)]
struct IngredientRow {
    material_id: Uuid,
    quantity: Decimal,
    unit: Option<String>,
}

/// One recipe output line.
#[derive(Debug, sqlx::FromRow)]
struct OutputRow {
    product_id: Uuid,
    quantity: Decimal,
}

/// Input for recording a production run
#[derive(Debug, Deserialize)]
pub struct RecordRunInput {
    pub recipe_id: Uuid,
    pub batches: i64,
    /// Lot code assigned to every output lot of this run.
    pub lot_code: String,
    /// Production date; today when omitted.
    pub run_date: Option<NaiveDate>,
}

/// Result of a recorded production run
#[derive(Debug, Serialize)]
pub struct ProductionRunOutcome {
    pub run_id: Uuid,
    pub recipe_id: Uuid,
    pub batches: i64,
    pub ingredients_consumed: usize,
    pub starters_skipped: usize,
    pub output_lots: Vec<Uuid>,
}

/// Feasibility of one ingredient for a planned run.
#[derive(Debug, Serialize)]
pub struct IngredientFeasibility {
    pub material_id: Uuid,
    pub material_name: String,
    pub required: Quantity,
    pub sufficient: bool,
    pub shortfall: Quantity,
}

impl ProductionService {
    /// Create a new ProductionService instance
    pub fn new(db: PgPool) -> Self {
        let ledger = LedgerService::new(db.clone());
        let stock = StockService::new(db.clone());
        Self { db, ledger, stock }
    }

    /// Record a production run: consume ingredients, credit output lots,
    /// recalculate every touched aggregate. All-or-nothing.
    pub async fn record_run(&self, input: RecordRunInput) -> AppResult<ProductionRunOutcome> {
        if input.batches <= 0 {
            return Err(AppError::InvalidQuantity(format!(
                "batches must be positive, got {}",
                input.batches
            )));
        }
        if input.lot_code.trim().is_empty() {
            return Err(AppError::InvalidQuantity("lot code is required".to_string()));
        }

        let run_id = Uuid::new_v4();
        let run_date = input
            .run_date
            .unwrap_or_else(|| chrono::Utc::now().date_naive());

        let mut tx = self.db.begin().await?;

        self.ensure_recipe_exists(&mut tx, input.recipe_id).await?;
        let ingredients = self.load_ingredients(&mut tx, input.recipe_id).await?;
        let outputs = self.load_outputs(&mut tx, input.recipe_id).await?;
        if outputs.is_empty() {
            return Err(AppError::NotFound("Recipe output".to_string()));
        }

        let mut touched = Vec::new();
        let mut consumed = 0usize;
        let mut starters_skipped = 0usize;

        for ingredient in &ingredients {
            let material = fetch_material(&mut *tx, ingredient.material_id).await?;
            // Cultured/starter materials are fed, never depleted; the
            // decision to skip them lives here, not in the ledger.
            if material.is_starter {
                starters_skipped += 1;
                tracing::debug!(material = %material.name, "skipping starter ingredient");
                continue;
            }

            let per_batch = Quantity::try_from(ingredient.quantity)?;
            let required = per_batch
                .checked_mul_int(input.batches)
                .ok_or_else(|| AppError::InvalidQuantity("ingredient quantity overflow".into()))?;

            self.ledger
                .consume(
                    &mut tx,
                    ingredient.material_id,
                    &ConsumePolicy::raw(),
                    &ConsumeRequest {
                        quantity: required,
                        unit: ingredient.unit.clone(),
                        meta: MovementMeta {
                            reason: "production run ingredient".to_string(),
                            reference_type: Some(PRODUCTION_RUN_REF.to_string()),
                            reference_id: Some(run_id.to_string()),
                        },
                    },
                )
                .await?;
            consumed += 1;
            touched.push(ingredient.material_id);
        }

        let mut output_lots = Vec::with_capacity(outputs.len());
        for output in &outputs {
            let per_batch = Quantity::try_from(output.quantity)?;
            let produced = per_batch
                .checked_mul_int(input.batches)
                .ok_or_else(|| AppError::InvalidQuantity("output quantity overflow".into()))?;

            let shelf_life_days = self
                .frozen_shelf_life(&mut tx, output.product_id)
                .await?;
            let expires_on =
                shelf_life_days.map(|days| run_date + chrono::Duration::days(days as i64));

            let (lot, _) = self
                .ledger
                .credit(
                    &mut tx,
                    output.product_id,
                    CreditInput {
                        code: input.lot_code.clone(),
                        stage: Some(Stage::Frozen),
                        quantity: produced,
                        intake_date: run_date,
                        expires_on,
                        meta: MovementMeta {
                            reason: "production run output".to_string(),
                            reference_type: Some(PRODUCTION_RUN_REF.to_string()),
                            reference_id: Some(run_id.to_string()),
                        },
                    },
                )
                .await?;
            output_lots.push(lot.id);
            touched.push(output.product_id);
        }

        for material_id in &touched {
            self.stock.recalculate(&mut tx, *material_id).await?;
        }

        tx.commit().await?;

        tracing::info!(
            %run_id,
            recipe = %input.recipe_id,
            batches = input.batches,
            ingredients = consumed,
            outputs = output_lots.len(),
            "production run recorded"
        );

        Ok(ProductionRunOutcome {
            run_id,
            recipe_id: input.recipe_id,
            batches: input.batches,
            ingredients_consumed: consumed,
            starters_skipped,
            output_lots,
        })
    }

    /// Read-only feasibility check for a planned run, using the same lot
    /// selection and ordering as execution.
    pub async fn preflight(
        &self,
        recipe_id: Uuid,
        batches: i64,
    ) -> AppResult<Vec<IngredientFeasibility>> {
        if batches <= 0 {
            return Err(AppError::InvalidQuantity(format!(
                "batches must be positive, got {batches}"
            )));
        }

        let mut conn = self.db.acquire().await?;
        self.ensure_recipe_exists(&mut conn, recipe_id).await?;
        let ingredients = self.load_ingredients(&mut conn, recipe_id).await?;
        drop(conn);

        let mut report = Vec::with_capacity(ingredients.len());
        for ingredient in &ingredients {
            let material = fetch_material(&self.db, ingredient.material_id).await?;
            if material.is_starter {
                continue;
            }

            let per_batch = Quantity::try_from(ingredient.quantity)?;
            let required = per_batch
                .checked_mul_int(batches)
                .ok_or_else(|| AppError::InvalidQuantity("ingredient quantity overflow".into()))?;

            let simulation = self
                .ledger
                .simulate(
                    ingredient.material_id,
                    &ConsumePolicy::raw(),
                    &ConsumeRequest {
                        quantity: required,
                        unit: ingredient.unit.clone(),
                        meta: MovementMeta {
                            reason: "preflight".to_string(),
                            reference_type: None,
                            reference_id: None,
                        },
                    },
                )
                .await?;

            report.push(IngredientFeasibility {
                material_id: ingredient.material_id,
                material_name: material.name,
                required: simulation.required,
                sufficient: simulation.sufficient,
                shortfall: simulation.shortfall,
            });
        }

        Ok(report)
    }

    async fn ensure_recipe_exists(
        &self,
        conn: &mut PgConnection,
        recipe_id: Uuid,
    ) -> AppResult<()> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM recipes WHERE id = $1)",
        )
        .bind(recipe_id)
        .fetch_one(conn)
        .await?;
        if !exists {
            return Err(AppError::NotFound("Recipe".to_string()));
        }
        Ok(())
    }

    async fn load_ingredients(
        &self,
        conn: &mut PgConnection,
        recipe_id: Uuid,
    ) -> AppResult<Vec<IngredientRow>> {
        let rows = sqlx::query_as::<_, IngredientRow>(
            "SELECT material_id, quantity, unit FROM recipe_ingredients WHERE recipe_id = $1 ORDER BY material_id",
        )
        .bind(recipe_id)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    async fn load_outputs(
        &self,
        conn: &mut PgConnection,
        recipe_id: Uuid,
    ) -> AppResult<Vec<OutputRow>> {
        let rows = sqlx::query_as::<_, OutputRow>(
            "SELECT product_id, quantity FROM recipe_products WHERE recipe_id = $1 ORDER BY product_id",
        )
        .bind(recipe_id)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    /// Shelf life for freshly produced frozen lots.
    async fn frozen_shelf_life(
        &self,
        conn: &mut PgConnection,
        product_id: Uuid,
    ) -> AppResult<Option<i32>> {
        let days = sqlx::query_scalar::<_, i32>(
            "SELECT shelf_life_days FROM product_shelf_life WHERE product_id = $1 AND stage = $2",
        )
        .bind(product_id)
        .bind(Stage::Frozen.as_str())
        .fetch_optional(conn)
        .await?;
        Ok(days)
    }
}
