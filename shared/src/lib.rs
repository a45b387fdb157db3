//! Shared domain types for the Bakery Production Backend
//!
//! This crate contains the pure, side-effect-free building blocks used by
//! every component of the system: measurement units and conversion, the
//! fixed-point quantity type used for all stock math, and the lifecycle
//! enums for lots, movements and outbox jobs.

pub mod quantity;
pub mod types;
pub mod units;

pub use quantity::*;
pub use types::*;
pub use units::*;
