//! External service clients

pub mod marketplace;

pub use marketplace::MarketplaceClient;
