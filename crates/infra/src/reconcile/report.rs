use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockrecon_core::VariantId;
use stockrecon_inventory::CostingError;

use crate::store::StoreError;

/// Failure of a whole reconcile / verify / orphan operation.
///
/// Per-variant data problems are never errors; they are `Anomaly` entries on
/// the `RepairReport`.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReconcileError {
    /// Whether the caller may simply run the operation again.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcileError::Store(e) => e.is_retryable(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    NegativeRemaining,
    ArithmeticOverflow,
    MixedVariants,
}

/// A variant that could not be reconciled; its summary row was left as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anomaly {
    pub variant_id: VariantId,
    pub kind: AnomalyKind,
    pub detail: String,
}

impl Anomaly {
    pub fn from_costing(variant_id: VariantId, err: &CostingError) -> Self {
        let kind = match err {
            CostingError::NegativeRemaining { .. } => AnomalyKind::NegativeRemaining,
            CostingError::Overflow { .. } => AnomalyKind::ArithmeticOverflow,
            CostingError::MixedVariants { .. } => AnomalyKind::MixedVariants,
        };
        Self {
            variant_id,
            kind,
            detail: err.to_string(),
        }
    }
}

/// Knobs for a single reconcile pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileOptions {
    /// Also remove orphaned movements after the summaries are written.
    pub collect_orphans: bool,
    /// Compute everything, write nothing.
    pub dry_run: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            collect_orphans: true,
            dry_run: false,
        }
    }
}

impl ReconcileOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    pub fn without_orphans(mut self) -> Self {
        self.collect_orphans = false;
        self
    }
}

/// Outcome of one reconcile pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    /// Variants in the union of ledger and aggregate.
    pub variants_examined: usize,
    /// Summary rows written (0 on a dry run).
    pub variants_updated: usize,
    /// Rows whose figures differed from the prior row, or had no prior row.
    pub variants_changed: usize,
    pub orphans_found: u64,
    pub movements_removed: u64,
    /// Σ quantity × average cost over the rows derived this pass.
    pub total_inventory_value: Decimal,
    pub anomalies: Vec<Anomaly>,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }
}

/// One variant whose aggregate quantity disagrees with the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub variant_id: VariantId,
    pub aggregate_quantity: Decimal,
    pub ledger_quantity: Decimal,
    /// `aggregate_quantity - ledger_quantity`.
    pub difference: Decimal,
}
