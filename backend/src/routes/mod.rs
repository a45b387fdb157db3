//! Route definitions for the bakery production backend

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{handlers, AppState};

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Inventory consumption
        .nest("/inventory", inventory_routes())
        // Lot stage transitions
        .nest("/lots", lot_routes())
        // Production runs
        .nest("/production", production_routes())
        // Sales
        .route("/sales", post(handlers::record_sale))
        // Outbox inspection and manual dispatch
        .nest("/outbox", outbox_routes())
}

fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/:material_id/consume", post(handlers::consume_stock))
        .route("/:material_id/simulate", post(handlers::simulate_consumption))
}

fn lot_routes() -> Router<AppState> {
    Router::new().route("/:lot_id/transition", post(handlers::transition_lot))
}

fn production_routes() -> Router<AppState> {
    Router::new()
        .route("/runs", post(handlers::record_run))
        .route("/recipes/:recipe_id/preflight", get(handlers::preflight_run))
}

fn outbox_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(handlers::list_outbox_jobs))
        .route("/run", post(handlers::run_outbox))
}

/// Root endpoint
async fn root() -> &'static str {
    "Bakery Production Backend API v1.0"
}
