use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: i64,
    pub lot_id: i64,
    pub customer_id: i64,
    pub quantity_kg: Decimal,
    pub reserved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReservationCreateRequest {
    pub lot_id: i64,
    pub customer_id: i64,
    pub quantity_kg: Decimal,
    pub reserved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReservationCreateResponse {
    pub reservation_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReservationCancelRequest {
    pub notes: String,
    pub performed_by: i64,
    pub canceled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReservationCancelResponse {
    pub lot_id: i64,
    pub lot_code: String,
    pub lot_event_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReservationListQuery {
    pub lot_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub limit: Option<i64>,
}

/// Read-projection row for `reservations.list`, joined with lot and
/// customer display fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationView {
    pub id: i64,
    pub lot_id: i64,
    pub lot_code: String,
    pub lot_state: String,
    pub customer_id: i64,
    pub customer_name: String,
    pub quantity_kg: Decimal,
    pub reserved_at: DateTime<Utc>,
}
