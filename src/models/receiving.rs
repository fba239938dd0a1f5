use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct ReceivingRequest {
    pub item_id: i64,
    pub supplier_id: Option<i64>,
    pub to_location_id: i64,
    pub quantity_kg: Decimal,
    pub notes: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub performed_by: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceivingResponse {
    pub lot_id: i64,
    pub lot_code: String,
    pub movement_id: i64,
    pub lot_event_id: i64,
}
