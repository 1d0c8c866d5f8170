//! Store boundaries consumed by the reconcile engine.
//!
//! Two stores, matching the two sides being reconciled:
//! - `LedgerStore`: source of truth (purchase batches + stock movements)
//! - `AggregateStore`: the materialized `InventorySummary` rows
//!
//! Both are async traits so that SQL backends can run their own transactions.
//! In-memory implementations are provided for tests/dev.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use thiserror::Error;

use stockrecon_core::{BatchId, MovementId, VariantId};
use stockrecon_inventory::{InventorySummary, MovementKind, PurchaseBatch, StockMovement};

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryAggregateStore, InMemoryLedgerStore};
pub use postgres::{PostgresAggregateStore, PostgresLedgerStore};

/// Store operation error.
///
/// These are **infrastructure errors** (connectivity, transaction conflicts,
/// undecodable rows) as opposed to domain errors or costing anomalies.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached (pool closed, IO, timeout).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The transaction lost a race (serialization failure, deadlock).
    #[error("transaction conflict: {0}")]
    Conflict(String),

    /// A stored row could not be decoded into a domain record.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether re-running the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Conflict(_))
    }
}

/// Batch-reference predicate for movement reads.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum BatchRef {
    #[default]
    Any,
    Present,
    Absent,
}

impl BatchRef {
    pub fn matches(self, batch_id: Option<BatchId>) -> bool {
        match self {
            BatchRef::Any => true,
            BatchRef::Present => batch_id.is_some(),
            BatchRef::Absent => batch_id.is_none(),
        }
    }
}

/// Filter for `LedgerStore::movements`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MovementFilter {
    pub variant_id: Option<VariantId>,
    /// `None` means every kind.
    pub kinds: Option<Vec<MovementKind>>,
    pub batch_ref: BatchRef,
}

impl MovementFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Movements the orphan collector has to inspect.
    pub fn orphan_candidates() -> Self {
        Self {
            variant_id: None,
            kinds: Some(MovementKind::orphan_eligible()),
            batch_ref: BatchRef::Any,
        }
    }

    pub fn with_variant(mut self, variant_id: VariantId) -> Self {
        self.variant_id = Some(variant_id);
        self
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = MovementKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn with_batch_ref(mut self, batch_ref: BatchRef) -> Self {
        self.batch_ref = batch_ref;
        self
    }

    pub fn matches(&self, movement: &StockMovement) -> bool {
        self.variant_id.is_none_or(|v| v == movement.variant_id)
            && self
                .kinds
                .as_ref()
                .is_none_or(|kinds| kinds.contains(&movement.kind))
            && self.batch_ref.matches(movement.batch_id)
    }
}

/// Authoritative ledger: purchase batches and stock movements.
///
/// Batches are read-only from the engine's point of view. Movements are only
/// ever deleted (by the orphan collector), never updated.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Every batch, read from one point-in-time consistent snapshot.
    async fn batch_snapshot(&self) -> Result<Vec<PurchaseBatch>, StoreError>;

    async fn batches_for_variant(&self, variant_id: VariantId) -> Result<Vec<PurchaseBatch>, StoreError>;

    /// Ids of every batch that currently exists.
    async fn live_batch_ids(&self) -> Result<BTreeSet<BatchId>, StoreError>;

    /// Sum of remaining quantity per variant, over variants that have batches.
    async fn ledger_totals(&self) -> Result<BTreeMap<VariantId, Decimal>, StoreError>;

    async fn movements(&self, filter: MovementFilter) -> Result<Vec<StockMovement>, StoreError>;

    /// Delete the given movements atomically; returns the number removed.
    async fn delete_movements(&self, ids: &[MovementId]) -> Result<u64, StoreError>;
}

/// Materialized per-variant summaries.
#[async_trait::async_trait]
pub trait AggregateStore: Send + Sync {
    async fn get(&self, variant_id: VariantId) -> Result<Option<InventorySummary>, StoreError>;

    /// All rows, ordered by variant id.
    async fn list(&self) -> Result<Vec<InventorySummary>, StoreError>;

    /// Overwrite the given rows in one atomic write; returns rows written.
    ///
    /// Each row is a full replace (insert when missing). Rows not named are
    /// left untouched.
    async fn replace_summaries(&self, summaries: Vec<InventorySummary>) -> Result<usize, StoreError>;
}
