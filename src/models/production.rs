use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::ProcessType;

/// A transactional container linking input lots to output lots (and
/// losses) for one processing step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionOrder {
    pub id: i64,
    pub process_profile_id: i64,
    pub process_type: ProcessType,
    pub is_rework: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionInput {
    pub id: i64,
    pub production_order_id: i64,
    pub lot_id: i64,
    pub quantity_kg: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionOutput {
    pub id: i64,
    pub production_order_id: i64,
    pub output_lot_id: i64,
    pub quantity_kg: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakdownLoss {
    pub id: i64,
    pub production_order_id: i64,
    pub loss_type: String,
    pub quantity_kg: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
