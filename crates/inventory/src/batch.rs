use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockrecon_core::{BatchId, DomainError, DomainResult, Entity, VariantId};

use crate::costing::{COST_SCALE, QUANTITY_SCALE};

/// One discrete purchase lot of a variant.
///
/// Batches are owned by the ledger. The reconcile engine only ever reads them;
/// `remaining_quantity` is decremented by consumption workflows elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseBatch {
    pub id: BatchId,
    pub variant_id: VariantId,
    /// Unit cost at acquisition.
    pub unit_cost: Decimal,
    /// Quantity still on hand from this lot. Expected to be `>= 0`; a negative
    /// value loaded from a store is kept as-is and reported during costing.
    pub remaining_quantity: Decimal,
    pub received_at: DateTime<Utc>,
}

impl PurchaseBatch {
    /// Build a validated batch (write-path / test helper).
    ///
    /// Rows loaded from a store are constructed directly so that upstream
    /// integrity violations survive long enough to be reported.
    pub fn new(
        id: BatchId,
        variant_id: VariantId,
        unit_cost: Decimal,
        remaining_quantity: Decimal,
        received_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if unit_cost < Decimal::ZERO {
            return Err(DomainError::validation("unit_cost cannot be negative"));
        }
        if remaining_quantity < Decimal::ZERO {
            return Err(DomainError::validation("remaining_quantity cannot be negative"));
        }
        if unit_cost.scale() > COST_SCALE {
            return Err(DomainError::validation(format!(
                "unit_cost supports at most {COST_SCALE} decimal places"
            )));
        }
        if remaining_quantity.scale() > QUANTITY_SCALE {
            return Err(DomainError::validation(format!(
                "remaining_quantity supports at most {QUANTITY_SCALE} decimal places"
            )));
        }

        Ok(Self {
            id,
            variant_id,
            unit_cost,
            remaining_quantity,
            received_at,
        })
    }

    /// True when the lot still carries stock (and therefore cost weight).
    pub fn has_stock(&self) -> bool {
        self.remaining_quantity > Decimal::ZERO
    }
}

impl Entity for PurchaseBatch {
    type Id = BatchId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
