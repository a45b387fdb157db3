//! Inventory consumption HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::ledger::{ConsumePolicy, ConsumeRequest, ConsumeOutcome, LedgerService};
use crate::services::stock::StockService;
use crate::AppState;

/// Consume stock of a material in FIFO-with-earliest-expiry order
pub async fn consume_stock(
    State(state): State<AppState>,
    Path(material_id): Path<Uuid>,
    Json(request): Json<ConsumeRequest>,
) -> impl IntoResponse {
    let ledger = LedgerService::new(state.db.clone());
    let stock = StockService::new(state.db.clone());

    let result: AppResult<ConsumeOutcome> = async {
        let mut tx = state.db.begin().await?;
        let outcome = ledger
            .consume(&mut tx, material_id, &ConsumePolicy::raw(), &request)
            .await?;
        stock.recalculate(&mut tx, material_id).await?;
        tx.commit().await?;
        Ok(outcome)
    }
    .await;

    match result {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Preview a consumption without writing anything
pub async fn simulate_consumption(
    State(state): State<AppState>,
    Path(material_id): Path<Uuid>,
    Json(request): Json<ConsumeRequest>,
) -> impl IntoResponse {
    let ledger = LedgerService::new(state.db.clone());

    match ledger
        .simulate(material_id, &ConsumePolicy::raw(), &request)
        .await
    {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => e.into_response(),
    }
}
