// Contract tests for the offline sync surface (SPEC_FULL.md §4.13):
// POST /api/offline/submit, POST /api/offline/apply,
// GET /api/offline/conflicts, POST /api/offline/:id/resolve.
// Mirrors models::offline's wire shape.

use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ActionType {
    Receiving,
    Breakdown,
    Sale,
}

#[derive(Debug, Deserialize)]
struct OfflineAction {
    client_txn_id: String,
    action_type: ActionType,
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct OfflineSubmitRequest {
    client_id: String,
    submitted_by: i64,
    actions: Vec<OfflineAction>,
}

#[derive(Debug, Deserialize)]
struct OfflineApplyRequest {
    client_id: String,
    limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_request_accepts_a_batch_of_mixed_action_types() {
        let body = json!({
            "client_id": "scanner-07",
            "submitted_by": 7,
            "actions": [
                {
                    "client_txn_id": "c1",
                    "action_type": "receiving",
                    "payload": {"item_id": 1, "to_location_id": 2, "quantity_kg": "10.000", "performed_by": 7}
                },
                {
                    "client_txn_id": "c2",
                    "action_type": "sale",
                    "payload": {"customer_id": 5, "lines": [], "performed_by": 7}
                }
            ]
        });
        let request: OfflineSubmitRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.actions.len(), 2);
        assert_eq!(request.actions[0].action_type, ActionType::Receiving);
        assert_eq!(request.actions[1].action_type, ActionType::Sale);
    }

    #[test]
    fn unknown_action_type_is_rejected_at_the_wire_level() {
        let body = json!({
            "client_id": "scanner-07",
            "submitted_by": 7,
            "actions": [
                {"client_txn_id": "c1", "action_type": "widget", "payload": {}}
            ]
        });
        let result: Result<OfflineSubmitRequest, _> = serde_json::from_value(body);
        assert!(
            result.is_err(),
            "action_type is a closed enum; unsupported types fail to deserialize rather than \
             reaching the reconciler's match arm"
        );
    }

    #[test]
    fn apply_request_limit_is_optional_and_clamped_by_the_service() {
        let body = json!({"client_id": "scanner-07"});
        let request: OfflineApplyRequest = serde_json::from_value(body).unwrap();
        assert!(request.limit.is_none());

        let body_with_limit = json!({"client_id": "scanner-07", "limit": 5000});
        let request: OfflineApplyRequest = serde_json::from_value(body_with_limit).unwrap();
        // the wire contract accepts any i64; offline_service::apply clamps
        // it to [1, 500] rather than rejecting an out-of-range value
        assert_eq!(request.limit, Some(5000));
    }

    #[test]
    fn payload_is_opaque_json_until_dispatched_by_action_type() {
        let body = json!({
            "client_id": "scanner-07",
            "submitted_by": 7,
            "actions": [{
                "client_txn_id": "c1",
                "action_type": "breakdown",
                "payload": {"anything": "goes", "nested": {"a": 1}}
            }]
        });
        let request: OfflineSubmitRequest = serde_json::from_value(body).unwrap();
        assert!(request.actions[0].payload.is_object());
    }
}
