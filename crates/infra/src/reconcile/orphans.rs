use std::sync::Arc;

use tracing::{debug, info, instrument};

use stockrecon_core::MovementId;
use stockrecon_inventory::StockMovement;

use crate::store::{LedgerStore, MovementFilter};

use super::ReconcileError;

/// Removes orphan-eligible movements whose batch no longer exists.
///
/// Only kinds with `MovementKind::is_orphan_eligible()` are ever touched; a
/// sale pointing at a deleted batch is history and stays.
#[derive(Clone)]
pub struct OrphanCollector {
    ledger: Arc<dyn LedgerStore>,
}

impl OrphanCollector {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    /// Orphaned movements as of now, without deleting anything.
    #[instrument(skip(self), err)]
    pub async fn scan(&self) -> Result<Vec<StockMovement>, ReconcileError> {
        // Candidates first, live batches second: a batch deleted in between is
        // picked up by the next pass, a batch created in between counts as live.
        let candidates = self.ledger.movements(MovementFilter::orphan_candidates()).await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let live_batches = self.ledger.live_batch_ids().await?;

        let orphans: Vec<StockMovement> = candidates
            .into_iter()
            .filter(|m| m.is_orphaned(&live_batches))
            .collect();

        debug!(orphans = orphans.len(), live_batches = live_batches.len(), "orphan scan complete");
        Ok(orphans)
    }

    /// Delete every orphaned movement in one atomic call; returns the count removed.
    #[instrument(skip(self), err)]
    pub async fn collect_orphans(&self) -> Result<u64, ReconcileError> {
        let orphans = self.scan().await?;
        self.remove(&orphans).await
    }

    pub(crate) async fn remove(&self, orphans: &[StockMovement]) -> Result<u64, ReconcileError> {
        if orphans.is_empty() {
            return Ok(0);
        }

        let ids: Vec<MovementId> = orphans.iter().map(|m| m.id).collect();
        let removed = self.ledger.delete_movements(&ids).await?;

        info!(found = ids.len(), removed, "orphaned movements removed");
        Ok(removed)
    }
}
