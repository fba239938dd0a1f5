use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct AgingStartRequest {
    pub lot_id: i64,
    pub aging_location_id: i64,
    pub process_profile_id: i64,
    pub performed_by: i64,
    pub reason: String,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgingStartResponse {
    pub lot_id: i64,
    pub state: String,
    pub aging_started_at: DateTime<Utc>,
    pub ready_at: DateTime<Utc>,
    pub lot_event_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgingReleaseRequest {
    pub lot_id: i64,
    pub performed_by: i64,
    pub reason: String,
    pub released_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgingReleaseResponse {
    pub lot_id: i64,
    pub state: String,
    pub released_at: DateTime<Utc>,
    pub lot_event_id: i64,
}
