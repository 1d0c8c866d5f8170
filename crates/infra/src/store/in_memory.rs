use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use rust_decimal::Decimal;

use stockrecon_core::{BatchId, MovementId, VariantId};
use stockrecon_inventory::{InventorySummary, PurchaseBatch, StockMovement};

use super::{AggregateStore, LedgerStore, MovementFilter, StoreError};

#[derive(Debug, Default)]
struct LedgerState {
    batches: BTreeMap<BatchId, PurchaseBatch>,
    movements: BTreeMap<MovementId, StockMovement>,
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

/// In-memory ledger store.
///
/// Intended for tests/dev. A single lock guards batches and movements, so
/// every read is a consistent snapshot.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
    unavailable: AtomicBool,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every store call fails with `Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory ledger store offline".to_string()));
        }
        Ok(())
    }

    /// Insert or replace a batch (purchasing / consumption workflows).
    pub fn insert_batch(&self, batch: PurchaseBatch) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.batches.insert(batch.id, batch);
        Ok(())
    }

    /// Delete a batch (administrative correction). Movements are left alone.
    pub fn remove_batch(&self, batch_id: BatchId) -> Result<Option<PurchaseBatch>, StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        Ok(state.batches.remove(&batch_id))
    }

    pub fn insert_movement(&self, movement: StockMovement) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.movements.insert(movement.id, movement);
        Ok(())
    }

    pub fn contains_movement(&self, movement_id: MovementId) -> Result<bool, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.movements.contains_key(&movement_id))
    }

    pub fn movement_count(&self) -> Result<usize, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.movements.len())
    }
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn batch_snapshot(&self) -> Result<Vec<PurchaseBatch>, StoreError> {
        self.ensure_available()?;
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.batches.values().cloned().collect())
    }

    async fn batches_for_variant(&self, variant_id: VariantId) -> Result<Vec<PurchaseBatch>, StoreError> {
        self.ensure_available()?;
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .batches
            .values()
            .filter(|b| b.variant_id == variant_id)
            .cloned()
            .collect())
    }

    async fn live_batch_ids(&self) -> Result<BTreeSet<BatchId>, StoreError> {
        self.ensure_available()?;
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.batches.keys().copied().collect())
    }

    async fn ledger_totals(&self) -> Result<BTreeMap<VariantId, Decimal>, StoreError> {
        self.ensure_available()?;
        let state = self.state.read().map_err(|_| poisoned())?;
        let mut totals = BTreeMap::new();
        for batch in state.batches.values() {
            let total: &mut Decimal = totals.entry(batch.variant_id).or_default();
            *total = total
                .checked_add(batch.remaining_quantity)
                .ok_or_else(|| StoreError::Backend(format!("quantity overflow for variant {}", batch.variant_id)))?;
        }
        Ok(totals)
    }

    async fn movements(&self, filter: MovementFilter) -> Result<Vec<StockMovement>, StoreError> {
        self.ensure_available()?;
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .movements
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect())
    }

    async fn delete_movements(&self, ids: &[MovementId]) -> Result<u64, StoreError> {
        self.ensure_available()?;
        let mut state = self.state.write().map_err(|_| poisoned())?;
        let removed = ids
            .iter()
            .filter(|id| state.movements.remove(*id).is_some())
            .count();
        Ok(removed as u64)
    }
}

/// In-memory aggregate store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAggregateStore {
    rows: RwLock<BTreeMap<VariantId, InventorySummary>>,
    unavailable: AtomicBool,
}

impl InMemoryAggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory aggregate store offline".to_string()));
        }
        Ok(())
    }

    /// Write a row directly, bypassing the engine (provisioning / seeding drift).
    pub fn seed(&self, summary: InventorySummary) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        rows.insert(summary.variant_id, summary);
        Ok(())
    }
}

#[async_trait::async_trait]
impl AggregateStore for InMemoryAggregateStore {
    async fn get(&self, variant_id: VariantId) -> Result<Option<InventorySummary>, StoreError> {
        self.ensure_available()?;
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.get(&variant_id).cloned())
    }

    async fn list(&self) -> Result<Vec<InventorySummary>, StoreError> {
        self.ensure_available()?;
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.values().cloned().collect())
    }

    async fn replace_summaries(&self, summaries: Vec<InventorySummary>) -> Result<usize, StoreError> {
        self.ensure_available()?;
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        let written = summaries.len();
        for summary in summaries {
            rows.insert(summary.variant_id, summary);
        }
        Ok(written)
    }
}
