use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{Instrument, error, info_span};

use stockrecon_core::VariantId;
use stockrecon_inventory::{Costing, InventorySummary, StockMovement, compute_costing};

use crate::store::{AggregateStore, LedgerStore};

use super::orphans::OrphanCollector;
use super::reconciler::Reconciler;
use super::report::{Anomaly, ReconcileError, ReconcileOptions, RepairReport};
use super::verify::{Discrepancies, Verifier};

/// Ledger-side view of one variant next to its stored summary row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantInspection {
    pub variant_id: VariantId,
    pub summary: Option<InventorySummary>,
    pub batch_count: usize,
    /// What a reconcile pass would write; `None` when costing fails.
    pub ledger_costing: Option<Costing>,
    pub anomaly: Option<Anomaly>,
    /// Stored figures equal the ledger's (a missing row counts as neutral).
    pub in_sync: bool,
}

/// Administrative entry points over one pair of stores.
#[derive(Clone)]
pub struct ReconcileEngine {
    ledger: Arc<dyn LedgerStore>,
    aggregate: Arc<dyn AggregateStore>,
    reconciler: Reconciler,
    orphans: OrphanCollector,
    verifier: Verifier,
}

impl ReconcileEngine {
    pub fn new(ledger: Arc<dyn LedgerStore>, aggregate: Arc<dyn AggregateStore>) -> Self {
        Self {
            reconciler: Reconciler::new(ledger.clone(), aggregate.clone()),
            orphans: OrphanCollector::new(ledger.clone()),
            verifier: Verifier::new(ledger.clone(), aggregate.clone()),
            ledger,
            aggregate,
        }
    }

    pub async fn reconcile(&self, options: ReconcileOptions) -> Result<RepairReport, ReconcileError> {
        let span = info_span!("reconcile", dry_run = options.dry_run, collect_orphans = options.collect_orphans);
        self.reconciler
            .run(options)
            .instrument(span)
            .await
            .inspect_err(|e| error!(error = %e, retryable = e.is_retryable(), "reconcile failed"))
    }

    pub async fn verify(&self) -> Result<Discrepancies, ReconcileError> {
        self.verifier
            .verify()
            .instrument(info_span!("verify"))
            .await
            .inspect_err(|e| error!(error = %e, retryable = e.is_retryable(), "verify failed"))
    }

    /// Orphaned movements, without deleting them.
    pub async fn scan_orphans(&self) -> Result<Vec<StockMovement>, ReconcileError> {
        self.orphans
            .scan()
            .instrument(info_span!("scan_orphans"))
            .await
            .inspect_err(|e| error!(error = %e, retryable = e.is_retryable(), "orphan scan failed"))
    }

    /// Delete orphaned movements on their own, without touching summaries.
    pub async fn collect_orphans(&self) -> Result<u64, ReconcileError> {
        self.orphans
            .collect_orphans()
            .instrument(info_span!("collect_orphans"))
            .await
            .inspect_err(|e| error!(error = %e, retryable = e.is_retryable(), "orphan collection failed"))
    }

    /// Stored summary row for one variant.
    pub async fn summary(&self, variant_id: VariantId) -> Result<Option<InventorySummary>, ReconcileError> {
        Ok(self.aggregate.get(variant_id).await?)
    }

    /// Compare one variant's stored row with a fresh costing of its batches.
    pub async fn inspect_variant(&self, variant_id: VariantId) -> Result<VariantInspection, ReconcileError> {
        let span = info_span!("inspect_variant", %variant_id);
        async {
            let summary = self.aggregate.get(variant_id).await?;
            let batches = self.ledger.batches_for_variant(variant_id).await?;

            let (ledger_costing, anomaly) = match compute_costing(&batches) {
                Ok(costing) => (Some(costing), None),
                Err(err) => (None, Some(Anomaly::from_costing(variant_id, &err))),
            };
            let stored = summary
                .as_ref()
                .map(InventorySummary::costing)
                .unwrap_or_else(Costing::neutral);
            let in_sync = ledger_costing.is_some_and(|c| c == stored);

            Ok::<_, ReconcileError>(VariantInspection {
                variant_id,
                summary,
                batch_count: batches.len(),
                ledger_costing,
                anomaly,
                in_sync,
            })
        }
        .instrument(span)
        .await
        .inspect_err(|e| error!(error = %e, "variant inspection failed"))
    }
}
