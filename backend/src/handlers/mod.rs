//! HTTP handlers for the bakery production backend

pub mod health;
pub mod inventory;
pub mod lot;
pub mod outbox;
pub mod production;
pub mod sales;

pub use health::health_check;
pub use inventory::{consume_stock, simulate_consumption};
pub use lot::transition_lot;
pub use outbox::{list_outbox_jobs, run_outbox};
pub use production::{preflight_run, record_run};
pub use sales::record_sale;
