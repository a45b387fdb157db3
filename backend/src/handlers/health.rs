//! Service health reporting
//!
//! The backend is healthy when Postgres is reachable and marketplace
//! notifications are not silently piling up, so the payload reports the
//! undelivered outbox backlog next to database connectivity.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
    /// Outbox jobs still awaiting delivery (pending or errored). Absent when
    /// the database could not be reached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbox_backlog: Option<i64>,
}

impl HealthResponse {
    fn report(backlog: Result<i64, crate::error::AppError>) -> Self {
        match backlog {
            Ok(backlog) => HealthResponse {
                status: "healthy".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                database: "connected".to_string(),
                outbox_backlog: Some(backlog),
            },
            Err(_) => HealthResponse {
                status: "degraded".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                database: "disconnected".to_string(),
                outbox_backlog: None,
            },
        }
    }
}

/// Health check endpoint handler
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    // The backlog count doubles as the connectivity probe.
    Json(HealthResponse::report(state.outbox.undelivered_count().await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn reachable_database_reports_backlog() {
        let response = HealthResponse::report(Ok(3));
        assert_eq!(response.status, "healthy");
        assert_eq!(response.database, "connected");
        assert_eq!(response.outbox_backlog, Some(3));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["outbox_backlog"], 3);
    }

    #[test]
    fn unreachable_database_degrades_and_omits_backlog() {
        let response = HealthResponse::report(Err(AppError::Configuration("db".into())));
        assert_eq!(response.status, "degraded");
        assert_eq!(response.database, "disconnected");

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("outbox_backlog").is_none());
    }
}
