use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument};

use stockrecon_core::VariantId;

use crate::store::{AggregateStore, LedgerStore};

use super::report::{Discrepancy, ReconcileError};

/// Read-only check of the aggregate against the ledger.
#[derive(Clone)]
pub struct Verifier {
    ledger: Arc<dyn LedgerStore>,
    aggregate: Arc<dyn AggregateStore>,
}

impl Verifier {
    pub fn new(ledger: Arc<dyn LedgerStore>, aggregate: Arc<dyn AggregateStore>) -> Self {
        Self { ledger, aggregate }
    }

    /// Load both sides and return the variants whose quantities disagree.
    ///
    /// Each call re-reads the stores. Iterating the result does no IO.
    #[instrument(skip(self), err)]
    pub async fn verify(&self) -> Result<Discrepancies, ReconcileError> {
        let aggregate: BTreeMap<VariantId, Decimal> = self
            .aggregate
            .list()
            .await?
            .into_iter()
            .map(|s| (s.variant_id, s.total_quantity))
            .collect();
        let ledger = self.ledger.ledger_totals().await?;

        let discrepancies = Discrepancies::new(aggregate, ledger);
        info!(
            variants = discrepancies.variant_count(),
            discrepancies = discrepancies.clone().count(),
            "verification finished"
        );
        Ok(discrepancies)
    }
}

/// Lazy iterator over mismatched variants, in variant order.
///
/// Left-outer on both sides: a variant missing from either map compares
/// against zero. Cloning is cheap and restarts from the current position.
#[derive(Debug, Clone)]
pub struct Discrepancies {
    aggregate: Arc<BTreeMap<VariantId, Decimal>>,
    ledger: Arc<BTreeMap<VariantId, Decimal>>,
    variants: Arc<[VariantId]>,
    next: usize,
}

impl Discrepancies {
    pub fn new(aggregate: BTreeMap<VariantId, Decimal>, ledger: BTreeMap<VariantId, Decimal>) -> Self {
        let variants: BTreeSet<VariantId> = aggregate.keys().chain(ledger.keys()).copied().collect();
        Self {
            aggregate: Arc::new(aggregate),
            ledger: Arc::new(ledger),
            variants: variants.into_iter().collect(),
            next: 0,
        }
    }

    /// Number of variants compared (the union of both sides).
    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    /// True when no variant disagrees.
    pub fn is_clean(&self) -> bool {
        self.clone().next().is_none()
    }

    fn compare(&self, variant_id: VariantId) -> Option<Discrepancy> {
        let aggregate_quantity = self.aggregate.get(&variant_id).copied().unwrap_or_default();
        let ledger_quantity = self.ledger.get(&variant_id).copied().unwrap_or_default();
        if aggregate_quantity == ledger_quantity {
            return None;
        }
        Some(Discrepancy {
            variant_id,
            aggregate_quantity,
            ledger_quantity,
            difference: aggregate_quantity.saturating_sub(ledger_quantity),
        })
    }
}

impl Iterator for Discrepancies {
    type Item = Discrepancy;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(variant_id) = self.variants.get(self.next).copied() {
            self.next += 1;
            if let Some(discrepancy) = self.compare(variant_id) {
                return Some(discrepancy);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.variants.len() - self.next))
    }
}
