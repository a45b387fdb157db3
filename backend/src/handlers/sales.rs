//! Sales HTTP handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::services::sales::{RecordSaleInput, SalesService};
use crate::AppState;

/// Record a sale of a finished good
pub async fn record_sale(
    State(state): State<AppState>,
    Json(input): Json<RecordSaleInput>,
) -> impl IntoResponse {
    let service = SalesService::new(state.db.clone());

    match service.record_sale(input).await {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}
