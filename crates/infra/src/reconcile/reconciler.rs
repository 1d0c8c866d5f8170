use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use stockrecon_core::VariantId;
use stockrecon_inventory::{CostingError, InventorySummary, PurchaseBatch, compute_costing};

use crate::store::{AggregateStore, LedgerStore};

use super::orphans::OrphanCollector;
use super::report::{Anomaly, ReconcileError, ReconcileOptions, RepairReport};

/// Rows derived from one batch snapshot, before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivation {
    /// One row per variant that costed cleanly, in variant order.
    pub summaries: Vec<InventorySummary>,
    /// Variants in the union of ledger and aggregate.
    pub examined: usize,
    pub changed: usize,
    pub total_inventory_value: Decimal,
    pub anomalies: Vec<Anomaly>,
}

/// Recompute every variant's summary from the ledger.
///
/// Variants that exist only in `existing` (all batches gone) get the neutral
/// state. A variant whose costing fails is reported and omitted from
/// `summaries`, so its current row stays as it is.
pub fn derive_summaries(
    batches: Vec<PurchaseBatch>,
    existing: &[InventorySummary],
    at: DateTime<Utc>,
) -> Derivation {
    let mut by_variant: BTreeMap<VariantId, Vec<PurchaseBatch>> = BTreeMap::new();
    for batch in batches {
        by_variant.entry(batch.variant_id).or_default().push(batch);
    }
    for summary in existing {
        by_variant.entry(summary.variant_id).or_default();
    }

    let prior: BTreeMap<VariantId, &InventorySummary> =
        existing.iter().map(|s| (s.variant_id, s)).collect();

    let mut derivation = Derivation {
        summaries: Vec::with_capacity(by_variant.len()),
        examined: by_variant.len(),
        changed: 0,
        total_inventory_value: Decimal::ZERO,
        anomalies: Vec::new(),
    };

    for (variant_id, batches) in by_variant {
        let costed = compute_costing(&batches).and_then(|costing| {
            costing
                .inventory_value()
                .map(|value| (costing, value))
                .ok_or(CostingError::Overflow { variant_id })
        });

        let (costing, value) = match costed {
            Ok(costed) => costed,
            Err(err) => {
                warn!(%variant_id, error = %err, "variant skipped: ledger anomaly");
                derivation.anomalies.push(Anomaly::from_costing(variant_id, &err));
                continue;
            }
        };

        let summary = InventorySummary::from_costing(variant_id, costing, at);
        let changed = prior
            .get(&variant_id)
            .is_none_or(|old| !old.same_figures(&summary));
        if changed {
            derivation.changed += 1;
        }
        debug!(
            %variant_id,
            batches = batches.len(),
            total_quantity = %summary.total_quantity,
            average_cost = %summary.average_cost,
            changed,
            "variant costed"
        );

        derivation.total_inventory_value = derivation.total_inventory_value.saturating_add(value);
        derivation.summaries.push(summary);
    }

    derivation
}

/// Rebuilds the aggregate from the ledger and, optionally, collects orphans.
#[derive(Clone)]
pub struct Reconciler {
    ledger: Arc<dyn LedgerStore>,
    aggregate: Arc<dyn AggregateStore>,
    orphans: OrphanCollector,
}

impl Reconciler {
    pub fn new(ledger: Arc<dyn LedgerStore>, aggregate: Arc<dyn AggregateStore>) -> Self {
        let orphans = OrphanCollector::new(ledger.clone());
        Self {
            ledger,
            aggregate,
            orphans,
        }
    }

    /// One full pass with default options.
    pub async fn reconcile(&self) -> Result<RepairReport, ReconcileError> {
        self.run(ReconcileOptions::default()).await
    }

    /// One full pass.
    ///
    /// All summary rows are written in a single `replace_summaries` call, so a
    /// store failure before that point leaves the aggregate untouched. Orphans
    /// are collected only after the summaries commit.
    #[instrument(skip(self), err)]
    pub async fn run(&self, options: ReconcileOptions) -> Result<RepairReport, ReconcileError> {
        let started_at = Utc::now();

        let batches = self.ledger.batch_snapshot().await?;
        let existing = self.aggregate.list().await?;
        let derivation = derive_summaries(batches, &existing, Utc::now());

        let variants_updated = if options.dry_run || derivation.summaries.is_empty() {
            0
        } else {
            self.aggregate
                .replace_summaries(derivation.summaries.clone())
                .await?
        };

        let (orphans_found, movements_removed) = if options.collect_orphans {
            let orphans = self.orphans.scan().await?;
            let removed = if options.dry_run {
                0
            } else {
                self.orphans.remove(&orphans).await?
            };
            (orphans.len() as u64, removed)
        } else {
            (0, 0)
        };

        let report = RepairReport {
            started_at,
            finished_at: Utc::now(),
            dry_run: options.dry_run,
            variants_examined: derivation.examined,
            variants_updated,
            variants_changed: derivation.changed,
            orphans_found,
            movements_removed,
            total_inventory_value: derivation.total_inventory_value,
            anomalies: derivation.anomalies,
        };

        info!(
            dry_run = report.dry_run,
            examined = report.variants_examined,
            updated = report.variants_updated,
            changed = report.variants_changed,
            orphans_found = report.orphans_found,
            movements_removed = report.movements_removed,
            anomalies = report.anomalies.len(),
            "reconcile pass finished"
        );
        Ok(report)
    }
}
