//! Inventory ledger domain module.
//!
//! This crate contains the ledger records (purchase batches, stock movements),
//! the materialized per-variant summary, and the costing rules that tie them
//! together. Everything here is deterministic domain logic (no IO, no HTTP,
//! no storage).

pub mod batch;
pub mod costing;
pub mod movement;
pub mod summary;

pub use batch::PurchaseBatch;
pub use costing::{COST_SCALE, Costing, CostingError, QUANTITY_SCALE, compute_costing};
pub use movement::{MovementKind, StockMovement};
pub use summary::InventorySummary;
