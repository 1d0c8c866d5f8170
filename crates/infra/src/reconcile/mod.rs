//! Reconcile engine: rebuilds `InventorySummary` rows from the ledger,
//! collects orphaned movements, and verifies the two sides agree.
//!
//! - `Reconciler`: full recompute-and-overwrite of every summary row
//! - `OrphanCollector`: removes eligible movements whose batch is gone
//! - `Verifier`: read-only comparison of stored vs ledger quantities
//! - `ReconcileEngine`: the facade the API and binary talk to
//!
//! A costing failure for one variant is an `Anomaly` on the report, never an
//! error; only store failures abort an operation.

pub mod engine;
pub mod orphans;
pub mod reconciler;
pub mod report;
pub mod verify;

pub use engine::{ReconcileEngine, VariantInspection};
pub use orphans::OrphanCollector;
pub use reconciler::{Derivation, Reconciler, derive_summaries};
pub use report::{
    Anomaly, AnomalyKind, Discrepancy, ReconcileError, ReconcileOptions, RepairReport,
};
pub use verify::{Discrepancies, Verifier};
