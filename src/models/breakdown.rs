use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct BreakdownOutputIn {
    pub item_id: i64,
    pub quantity_kg: Decimal,
    pub to_location_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BreakdownLossIn {
    pub loss_type: String,
    pub quantity_kg: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BreakdownRequest {
    pub input_lot_id: i64,
    pub input_quantity_kg: Decimal,
    pub outputs: Vec<BreakdownOutputIn>,
    pub losses: Vec<BreakdownLossIn>,
    pub notes: Option<String>,
    pub performed_by: i64,
    pub performed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakdownOutputOut {
    pub id: i64,
    pub lot_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakdownResponse {
    pub production_order_id: i64,
    pub outputs: Vec<BreakdownOutputOut>,
    pub movement_ids: Vec<i64>,
    pub loss_ids: Vec<i64>,
    pub lot_event_ids: Vec<i64>,
}
