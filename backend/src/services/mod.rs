//! Business logic services for the bakery production backend

pub mod ledger;
pub mod material;
pub mod outbox;
pub mod production;
pub mod sales;
pub mod stage;
pub mod stock;

pub use ledger::LedgerService;
pub use outbox::{OutboxPoller, OutboxService};
pub use production::ProductionService;
pub use sales::SalesService;
pub use stage::StageService;
pub use stock::StockService;
