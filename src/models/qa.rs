use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::QaMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaCheck {
    pub id: i64,
    pub lot_id: i64,
    pub check_type: String,
    pub passed: bool,
    pub mode: QaMode,
    pub pass_qty_kg: Option<Decimal>,
    pub fail_qty_kg: Option<Decimal>,
    pub pass_lot_id: Option<i64>,
    pub fail_lot_id: Option<i64>,
    pub performed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QaCheckRequest {
    pub lot_id: i64,
    pub check_type: String,
    pub mode: QaMode,
    /// Required in full mode.
    pub passed: Option<bool>,
    /// Required (at least one of pass/fail) in partial mode.
    pub pass_qty_kg: Option<Decimal>,
    pub fail_qty_kg: Option<Decimal>,
    pub notes: Option<String>,
    pub performed_by: i64,
    pub performed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QaCheckResponse {
    pub qa_check_id: i64,
    pub quarantined: bool,
    pub lot_event_id: Option<i64>,
    pub pass_lot_id: Option<i64>,
    pub fail_lot_id: Option<i64>,
}
