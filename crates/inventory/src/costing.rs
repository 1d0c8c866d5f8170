//! Weighted-average costing over a variant's purchase batches.
//!
//! All arithmetic is decimal and checked. Results are rounded to the ledger's
//! column scale so that repeated passes over the same batches always produce
//! byte-identical figures.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockrecon_core::{BatchId, VariantId};

use crate::batch::PurchaseBatch;

/// Decimal places stored for quantities (`NUMERIC(20,4)`).
pub const QUANTITY_SCALE: u32 = 4;

/// Decimal places stored for unit costs (`NUMERIC(20,4)`).
pub const COST_SCALE: u32 = 4;

/// Derived figures for one variant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Costing {
    pub total_quantity: Decimal,
    pub average_cost: Decimal,
}

impl Costing {
    /// State of a variant with no stock-bearing batches.
    pub fn neutral() -> Self {
        Self {
            total_quantity: Decimal::ZERO,
            average_cost: Decimal::ZERO,
        }
    }

    /// Value of the stock on hand (`total_quantity * average_cost`).
    ///
    /// `None` on overflow.
    pub fn inventory_value(&self) -> Option<Decimal> {
        self.total_quantity
            .checked_mul(self.average_cost)
            .map(|v| v.round_dp_with_strategy(COST_SCALE, RoundingStrategy::MidpointAwayFromZero))
    }
}

/// Data-integrity problems found while costing a variant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CostingError {
    #[error("batch {batch_id} has negative remaining quantity {remaining}")]
    NegativeRemaining { batch_id: BatchId, remaining: Decimal },

    #[error("arithmetic overflow while costing variant {variant_id}")]
    Overflow { variant_id: VariantId },

    #[error("batch {batch_id} belongs to variant {found}, expected {expected}")]
    MixedVariants {
        batch_id: BatchId,
        expected: VariantId,
        found: VariantId,
    },
}

/// Compute `(total_quantity, average_cost)` for the batches of one variant.
///
/// - `total_quantity` sums every batch, exhausted ones included.
/// - `average_cost` weights unit cost by remaining quantity over batches with
///   positive remaining only, and is `0` when there are none.
/// - Negative remaining quantities are reported, never clamped.
pub fn compute_costing(batches: &[PurchaseBatch]) -> Result<Costing, CostingError> {
    let Some(first) = batches.first() else {
        return Ok(Costing::neutral());
    };
    let variant_id = first.variant_id;
    let overflow = || CostingError::Overflow { variant_id };

    let mut total_quantity = Decimal::ZERO;
    let mut weighted_quantity = Decimal::ZERO;
    let mut weighted_cost = Decimal::ZERO;

    for batch in batches {
        if batch.variant_id != variant_id {
            return Err(CostingError::MixedVariants {
                batch_id: batch.id,
                expected: variant_id,
                found: batch.variant_id,
            });
        }
        if batch.remaining_quantity < Decimal::ZERO {
            return Err(CostingError::NegativeRemaining {
                batch_id: batch.id,
                remaining: batch.remaining_quantity,
            });
        }

        total_quantity = total_quantity
            .checked_add(batch.remaining_quantity)
            .ok_or_else(overflow)?;

        if batch.has_stock() {
            let line_cost = batch
                .remaining_quantity
                .checked_mul(batch.unit_cost)
                .ok_or_else(overflow)?;
            weighted_cost = weighted_cost.checked_add(line_cost).ok_or_else(overflow)?;
            weighted_quantity = weighted_quantity
                .checked_add(batch.remaining_quantity)
                .ok_or_else(overflow)?;
        }
    }

    let average_cost = if weighted_quantity.is_zero() {
        Decimal::ZERO
    } else {
        weighted_cost
            .checked_div(weighted_quantity)
            .ok_or_else(overflow)?
            .round_dp_with_strategy(COST_SCALE, RoundingStrategy::MidpointAwayFromZero)
    };

    Ok(Costing {
        total_quantity,
        average_cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn batch(variant_id: VariantId, remaining: Decimal, unit_cost: Decimal) -> PurchaseBatch {
        PurchaseBatch {
            id: BatchId::new(),
            variant_id,
            unit_cost,
            remaining_quantity: remaining,
            received_at: Utc::now(),
        }
    }

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn no_batches_is_neutral() {
        assert_eq!(compute_costing(&[]).unwrap(), Costing::neutral());
    }

    #[test]
    fn weighted_average_over_two_batches() {
        let v = VariantId::new();
        let costing = compute_costing(&[batch(v, dec(10), dec(2)), batch(v, dec(5), dec(8))]).unwrap();

        assert_eq!(costing.total_quantity, dec(15));
        assert_eq!(costing.average_cost, dec(4));
    }

    #[test]
    fn exhausted_batches_count_toward_quantity_but_not_cost() {
        let v = VariantId::new();
        let costing = compute_costing(&[batch(v, dec(0), dec(100)), batch(v, dec(5), dec(10))]).unwrap();

        assert_eq!(costing.total_quantity, dec(5));
        assert_eq!(costing.average_cost, dec(10));
    }

    #[test]
    fn only_exhausted_batches_resolve_to_zero_cost() {
        let v = VariantId::new();
        let costing = compute_costing(&[batch(v, dec(0), dec(100)), batch(v, dec(0), dec(7))]).unwrap();

        assert_eq!(costing, Costing::neutral());
    }

    #[test]
    fn average_is_rounded_to_cost_scale() {
        let v = VariantId::new();
        // (1*1 + 2*2) / 3 = 1.6666...
        let costing = compute_costing(&[batch(v, dec(1), dec(1)), batch(v, dec(2), dec(2))]).unwrap();

        assert_eq!(costing.average_cost, Decimal::new(16_667, 4));
        assert_eq!(costing.average_cost.scale(), COST_SCALE);
    }

    #[test]
    fn negative_remaining_is_reported_not_clamped() {
        let v = VariantId::new();
        let bad = batch(v, dec(-3), dec(2));
        let bad_id = bad.id;

        let err = compute_costing(&[batch(v, dec(4), dec(1)), bad]).unwrap_err();
        assert_eq!(
            err,
            CostingError::NegativeRemaining {
                batch_id: bad_id,
                remaining: dec(-3),
            }
        );
    }

    #[test]
    fn batches_from_two_variants_are_rejected() {
        let err = compute_costing(&[
            batch(VariantId::new(), dec(1), dec(1)),
            batch(VariantId::new(), dec(1), dec(1)),
        ])
        .unwrap_err();
        assert!(matches!(err, CostingError::MixedVariants { .. }));
    }

    #[test]
    fn overflow_is_an_error_not_a_panic() {
        let v = VariantId::new();
        let err = compute_costing(&[batch(v, Decimal::MAX, Decimal::MAX)]).unwrap_err();
        assert_eq!(err, CostingError::Overflow { variant_id: v });
    }

    #[test]
    fn inventory_value_multiplies_figures() {
        let costing = Costing {
            total_quantity: dec(15),
            average_cost: dec(4),
        };
        assert_eq!(costing.inventory_value(), Some(dec(60)));
    }

    fn arb_lots() -> impl Strategy<Value = Vec<(i64, i64)>> {
        // (remaining in hundredths, unit cost in cents)
        prop::collection::vec((0i64..100_000i64, 0i64..1_000_000i64), 0..12)
    }

    fn to_batches(variant_id: VariantId, lots: &[(i64, i64)]) -> Vec<PurchaseBatch> {
        lots.iter()
            .map(|(q, c)| batch(variant_id, Decimal::new(*q, 2), Decimal::new(*c, 2)))
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: total quantity is the plain sum of remaining quantities.
        #[test]
        fn total_equals_sum_of_remaining(lots in arb_lots()) {
            let v = VariantId::new();
            let batches = to_batches(v, &lots);
            let costing = compute_costing(&batches).unwrap();

            let expected: Decimal = batches.iter().map(|b| b.remaining_quantity).sum();
            prop_assert_eq!(costing.total_quantity, expected);
        }

        /// Property: the average lies between the cheapest and dearest stocked lot.
        #[test]
        fn average_is_bounded_by_stocked_costs(lots in arb_lots()) {
            let v = VariantId::new();
            let batches = to_batches(v, &lots);
            let costing = compute_costing(&batches).unwrap();

            let stocked: Vec<Decimal> = batches
                .iter()
                .filter(|b| b.has_stock())
                .map(|b| b.unit_cost)
                .collect();

            match (stocked.iter().min(), stocked.iter().max()) {
                (Some(min), Some(max)) => {
                    prop_assert!(costing.average_cost >= *min);
                    prop_assert!(costing.average_cost <= *max);
                }
                _ => prop_assert_eq!(costing.average_cost, Decimal::ZERO),
            }
        }

        /// Property: batch order does not change the result.
        #[test]
        fn order_independent(lots in arb_lots()) {
            let v = VariantId::new();
            let batches = to_batches(v, &lots);
            let mut reversed = batches.clone();
            reversed.reverse();

            prop_assert_eq!(compute_costing(&batches).unwrap(), compute_costing(&reversed).unwrap());
        }
    }
}
