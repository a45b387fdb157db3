//! Material and product lookup shared by the ledger, stage and stock services

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::{MaterialKind, Quantity, Unit};

/// A raw material, packaging material or finished product.
///
/// `available_stock` is derived state: it is written exclusively by the
/// stock recalculator and never mutated directly by business code.
#[derive(Debug, Clone, Serialize)]
pub struct Material {
    pub id: Uuid,
    pub name: String,
    pub kind: MaterialKind,
    pub unit: Unit,
    /// Cultured/starter materials are fed, never depleted by production.
    pub is_starter: bool,
    pub available_stock: Quantity,
    pub packaging_material_id: Option<Uuid>,
    pub packaging_multiple: Option<i32>,
    pub marketplace_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct MaterialRow {
    id: Uuid,
    name: String,
    kind: String,
    unit: String,
    is_starter: bool,
    available_stock: Decimal,
    packaging_material_id: Option<Uuid>,
    packaging_multiple: Option<i32>,
    marketplace_ref: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MaterialRow> for Material {
    type Error = AppError;

    fn try_from(row: MaterialRow) -> Result<Self, Self::Error> {
        let kind = MaterialKind::from_str(&row.kind)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("bad material kind: {}", row.kind)))?;
        let unit = Unit::parse(&row.unit)?;
        let available_stock = Quantity::try_from(row.available_stock)?;
        Ok(Material {
            id: row.id,
            name: row.name,
            kind,
            unit,
            is_starter: row.is_starter,
            available_stock,
            packaging_material_id: row.packaging_material_id,
            packaging_multiple: row.packaging_multiple,
            marketplace_ref: row.marketplace_ref,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Fetch a material by id; fails `NotFound` when absent.
pub(crate) async fn fetch_material<'e, E>(executor: E, id: Uuid) -> AppResult<Material>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, MaterialRow>(
        r#"
        SELECT id, name, kind, unit, is_starter, available_stock,
               packaging_material_id, packaging_multiple, marketplace_ref,
               created_at, updated_at
        FROM materials
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| AppError::NotFound("Material".to_string()))?;

    row.try_into()
}
