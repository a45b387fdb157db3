//! Bakery inventory and production tracking backend
//!
//! Tracks raw materials, packaging and finished goods as expiring lots,
//! records production runs and sales against a FIFO lot ledger, moves
//! finished goods through stages and notifies an external marketplace
//! through a transactional outbox.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod external;
pub mod handlers;
pub mod routes;
pub mod services;

pub use config::Config;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
    pub outbox: services::OutboxService,
}
