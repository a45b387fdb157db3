//! Outbox inspection and manual dispatch HTTP handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

/// List outbox jobs, newest first
pub async fn list_outbox_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);

    match state.outbox.list_jobs(limit).await {
        Ok(jobs) => (StatusCode::OK, Json(serde_json::json!({ "jobs": jobs }))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Trigger one dispatch run outside the poll schedule
pub async fn run_outbox(State(state): State<AppState>) -> impl IntoResponse {
    let limit = state.config.outbox.batch_limit;

    match state.outbox.run_once(limit).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => e.into_response(),
    }
}
