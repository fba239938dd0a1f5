use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::lot::{InventoryMovement, LotEvent};
use super::qa::QaCheck;
use super::reservation::Reservation;
use super::sale::SaleLine;

#[derive(Debug, Clone, Serialize)]
pub struct LotQuantities {
    pub received_kg: Decimal,
    pub available_kg: Decimal,
    pub reserved_kg: Decimal,
    pub sellable_kg: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenealogyOrderRef {
    pub production_order_id: i64,
    pub process_type: String,
    pub lot_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LotDetailResponse {
    pub lot_id: i64,
    pub lot_code: String,
    pub item_id: i64,
    pub supplier_id: Option<i64>,
    pub current_location_id: Option<i64>,
    pub state: String,
    pub quantities: LotQuantities,
    pub movements: Vec<InventoryMovement>,
    pub events: Vec<LotEvent>,
    pub reservations: Vec<Reservation>,
    pub qa_checks: Vec<QaCheck>,
    pub sale_lines: Vec<SaleLine>,
    /// Orders where this lot is an input, with their outputs.
    pub as_input_to: Vec<GenealogyOrderRef>,
    /// Orders where this lot is an output, with their inputs.
    pub as_output_of: Vec<GenealogyOrderRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AtRiskQuery {
    pub expiring_soon_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AtRiskFlag {
    pub lot_id: i64,
    pub lot_code: String,
    pub state: String,
    pub flags: Vec<String>,
    pub ready_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AtRiskResponse {
    pub as_of: DateTime<Utc>,
    pub horizon_days: i64,
    pub lots: Vec<AtRiskFlag>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StockQuery {
    pub item_id: Option<i64>,
    pub include_zero: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockRow {
    pub lot_id: i64,
    pub lot_code: String,
    pub item_id: i64,
    pub state: String,
    pub available_kg: Decimal,
    pub reserved_kg: Decimal,
    pub sellable_kg: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockResponse {
    pub rows: Vec<StockRow>,
}
