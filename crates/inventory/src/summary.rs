use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockrecon_core::{Entity, VariantId};

use crate::costing::Costing;

/// Materialized per-variant aggregate.
///
/// Expected to always equal what `compute_costing` derives from the
/// variant's batches; the reconcile engine is its only writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub variant_id: VariantId,
    pub total_quantity: Decimal,
    pub average_cost: Decimal,
    pub last_updated: DateTime<Utc>,
}

impl InventorySummary {
    pub fn from_costing(variant_id: VariantId, costing: Costing, last_updated: DateTime<Utc>) -> Self {
        Self {
            variant_id,
            total_quantity: costing.total_quantity,
            average_cost: costing.average_cost,
            last_updated,
        }
    }

    pub fn costing(&self) -> Costing {
        Costing {
            total_quantity: self.total_quantity,
            average_cost: self.average_cost,
        }
    }

    /// Compare quantity and cost, ignoring `last_updated`.
    pub fn same_figures(&self, other: &InventorySummary) -> bool {
        self.variant_id == other.variant_id
            && self.total_quantity == other.total_quantity
            && self.average_cost == other.average_cost
    }
}

impl Entity for InventorySummary {
    type Id = VariantId;

    fn id(&self) -> &Self::Id {
        &self.variant_id
    }
}
