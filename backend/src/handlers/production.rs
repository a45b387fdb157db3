//! Production run HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::services::production::{ProductionService, RecordRunInput};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PreflightQuery {
    pub batches: i64,
}

/// Record a production run
pub async fn record_run(
    State(state): State<AppState>,
    Json(input): Json<RecordRunInput>,
) -> impl IntoResponse {
    let service = ProductionService::new(state.db.clone());

    match service.record_run(input).await {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Check ingredient feasibility for a planned run
pub async fn preflight_run(
    State(state): State<AppState>,
    Path(recipe_id): Path<Uuid>,
    Query(query): Query<PreflightQuery>,
) -> impl IntoResponse {
    let service = ProductionService::new(state.db.clone());

    match service.preflight(recipe_id, query.batches).await {
        Ok(report) => (
            StatusCode::OK,
            Json(serde_json::json!({ "ingredients": report })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
