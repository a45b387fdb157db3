//! Lot stage transition HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::services::stage::{StageService, TransitionInput};
use crate::AppState;

/// Move quantity of a frozen lot into a sellable stage
pub async fn transition_lot(
    State(state): State<AppState>,
    Path(lot_id): Path<Uuid>,
    Json(input): Json<TransitionInput>,
) -> impl IntoResponse {
    let service = StageService::new(state.db.clone(), state.outbox.clone());

    match service.transition(lot_id, input).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}
