use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct MixInputIn {
    pub lot_id: i64,
    pub quantity_kg: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MixRequest {
    pub process_profile_id: i64,
    pub inputs: Vec<MixInputIn>,
    pub output_item_id: i64,
    pub output_location_id: i64,
    pub notes: Option<String>,
    pub performed_by: i64,
    pub performed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MixResponse {
    pub production_order_id: i64,
    pub output_lot_id: i64,
    pub output_lot_code: String,
    pub movement_ids: Vec<i64>,
    pub lot_event_ids: Vec<i64>,
}
