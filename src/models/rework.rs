use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct ReworkLossIn {
    pub loss_type: String,
    pub quantity_kg: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReworkRequest {
    pub input_lot_id: i64,
    pub output_item_id: i64,
    pub to_location_id: i64,
    pub rework_quantity_kg: Decimal,
    pub losses: Vec<ReworkLossIn>,
    pub notes: Option<String>,
    pub performed_by: i64,
    pub performed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReworkLotRef {
    pub id: i64,
    pub lot_code: String,
    pub quantity_kg: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReworkResponse {
    pub production_order_id: i64,
    pub input_lot_id: i64,
    pub output_lot: ReworkLotRef,
    pub remainder_lot: Option<ReworkLotRef>,
    pub loss_total_kg: Decimal,
}
