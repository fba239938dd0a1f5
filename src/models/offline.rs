use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::enums::{ActionType, OfflineStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineQueueRow {
    pub id: i64,
    pub client_id: String,
    pub client_txn_id: String,
    pub action_type: ActionType,
    pub payload: Value,
    pub status: OfflineStatus,
    pub submitted_by: i64,
    pub created_at: DateTime<Utc>,
    pub applied_at: Option<DateTime<Utc>>,
    pub conflict_reason: Option<String>,
    pub server_refs: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineConflict {
    pub id: i64,
    pub queue_id: i64,
    /// Classifier outcome: `conflict`, or `txn_exception` for an unexpected
    /// runtime error surfaced during apply.
    pub conflict_type: String,
    pub details: Value,
    pub resolution: Option<String>,
    pub resolved_by: Option<i64>,
    pub resolved_at: Option<DateTime<Utc>>,
}

// ---- Command surface DTOs -------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct OfflineAction {
    pub client_txn_id: String,
    pub action_type: ActionType,
    pub payload: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfflineSubmitRequest {
    pub client_id: String,
    pub submitted_by: i64,
    pub actions: Vec<OfflineAction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfflineSubmitResult {
    pub client_txn_id: String,
    pub status: String, // "queued" | "duplicate"
    pub offline_queue_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfflineSubmitResponse {
    pub results: Vec<OfflineSubmitResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfflineApplyRequest {
    pub client_id: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfflineApplyResultRow {
    pub offline_queue_id: i64,
    pub client_txn_id: String,
    pub status: String, // "applied" | "conflict" | "rejected"
    pub server_refs: Option<Value>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfflineApplyResponse {
    pub applied: i64,
    pub conflicts: i64,
    pub rejected: i64,
    pub results: Vec<OfflineApplyResultRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfflineResolveRequest {
    pub resolved_by: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfflineConflictView {
    pub offline_queue_id: i64,
    pub conflict_type: String,
    pub details: Value,
    pub resolution: Option<String>,
}
