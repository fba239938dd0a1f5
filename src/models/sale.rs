use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: i64,
    pub customer_id: i64,
    pub sold_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLine {
    pub id: i64,
    pub sale_id: i64,
    pub lot_id: i64,
    pub quantity_kg: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaleLineIn {
    pub lot_id: i64,
    pub quantity_kg: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaleCreateRequest {
    pub customer_id: i64,
    pub sold_at: Option<DateTime<Utc>>,
    pub lines: Vec<SaleLineIn>,
    pub notes: Option<String>,
    pub performed_by: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleCreateResponse {
    pub sale_id: i64,
    pub sale_line_ids: Vec<i64>,
    pub movement_ids: Vec<i64>,
    pub lot_event_ids: Vec<i64>,
}
