use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockrecon_core::{BatchId, DomainError, Entity, MovementId, VariantId};

/// Kind of quantity change recorded by a stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Purchase,
    Sale,
    AdjustmentIn,
    AdjustmentOut,
    /// Customer return put back on the shelf.
    Return,
    /// Stock moved between locations.
    Transfer,
}

impl MovementKind {
    pub const ALL: [MovementKind; 6] = [
        MovementKind::Purchase,
        MovementKind::Sale,
        MovementKind::AdjustmentIn,
        MovementKind::AdjustmentOut,
        MovementKind::Return,
        MovementKind::Transfer,
    ];

    /// Stable wire/column name.
    pub fn as_str(self) -> &'static str {
        match self {
            MovementKind::Purchase => "purchase",
            MovementKind::Sale => "sale",
            MovementKind::AdjustmentIn => "adjustment_in",
            MovementKind::AdjustmentOut => "adjustment_out",
            MovementKind::Return => "return",
            MovementKind::Transfer => "transfer",
        }
    }

    /// Whether a movement of this kind is erased when its batch is gone.
    ///
    /// Only stock additions tied to a lot are eligible. Consumption records
    /// stay even when their batch reference dangles.
    ///
    /// Keep this match exhaustive so a new kind needs an explicit decision.
    pub fn is_orphan_eligible(self) -> bool {
        match self {
            MovementKind::Purchase => true,
            MovementKind::AdjustmentIn => true,
            MovementKind::Sale => false,
            MovementKind::AdjustmentOut => false,
            MovementKind::Return => false,
            MovementKind::Transfer => false,
        }
    }

    /// Kinds the orphan collector has to look at.
    pub fn orphan_eligible() -> Vec<MovementKind> {
        Self::ALL
            .into_iter()
            .filter(|k| k.is_orphan_eligible())
            .collect()
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MovementKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown movement kind: {s}")))
    }
}

/// Immutable audit record of a quantity change for a variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub variant_id: VariantId,
    /// Absent for movements not tied to a lot (e.g. manual adjustments).
    pub batch_id: Option<BatchId>,
    pub kind: MovementKind,
    pub quantity_delta: Decimal,
    pub occurred_at: DateTime<Utc>,
}

impl StockMovement {
    /// True when the movement names a batch that is present in `live_batches`.
    pub fn references_live_batch(&self, live_batches: &BTreeSet<BatchId>) -> bool {
        self.batch_id
            .is_some_and(|batch_id| live_batches.contains(&batch_id))
    }

    /// An orphan is an orphan-eligible movement without a live batch behind it.
    pub fn is_orphaned(&self, live_batches: &BTreeSet<BatchId>) -> bool {
        self.kind.is_orphan_eligible() && !self.references_live_batch(live_batches)
    }
}

impl Entity for StockMovement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
