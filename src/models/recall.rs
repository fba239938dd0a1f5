use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct RecallReportResponse {
    pub lot_id: i64,
    pub backward_lot_ids: Vec<i64>,
    pub forward_lot_ids: Vec<i64>,
    pub affected_customers: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuarantineForwardRequest {
    pub performed_by: i64,
    pub reason: String,
    pub performed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuarantineForwardResponse {
    pub root_lot_id: i64,
    pub forward_lot_ids: Vec<i64>,
    pub quarantined_count: i64,
    pub already_quarantined_count: i64,
    pub lot_event_ids: Vec<i64>,
}
