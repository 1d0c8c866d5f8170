use serde::Serialize;

use stockrecon_infra::reconcile::{Discrepancies, Discrepancy};
use stockrecon_inventory::StockMovement;

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub clean: bool,
    pub variants_compared: usize,
    pub discrepancies: Vec<Discrepancy>,
}

impl From<Discrepancies> for VerifyResponse {
    fn from(discrepancies: Discrepancies) -> Self {
        let variants_compared = discrepancies.variant_count();
        let discrepancies: Vec<Discrepancy> = discrepancies.collect();
        Self {
            clean: discrepancies.is_empty(),
            variants_compared,
            discrepancies,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrphansResponse {
    pub count: usize,
    pub movements: Vec<StockMovement>,
}

impl From<Vec<StockMovement>> for OrphansResponse {
    fn from(movements: Vec<StockMovement>) -> Self {
        Self {
            count: movements.len(),
            movements,
        }
    }
}
