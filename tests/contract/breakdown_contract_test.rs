// Contract tests for POST /api/breakdown (SPEC_FULL.md §4.6).
// Mirrors models::breakdown's wire shape; exercises the request schema
// including the mass-balance invariant's input data (checked at the
// service layer, not here — this file validates only that the JSON
// contract carries the fields the invariant needs).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct BreakdownOutputIn {
    item_id: i64,
    quantity_kg: Decimal,
    to_location_id: i64,
}

#[derive(Debug, Deserialize)]
struct BreakdownLossIn {
    loss_type: String,
    quantity_kg: Decimal,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BreakdownRequest {
    input_lot_id: i64,
    input_quantity_kg: Decimal,
    outputs: Vec<BreakdownOutputIn>,
    losses: Vec<BreakdownLossIn>,
    notes: Option<String>,
    performed_by: i64,
    performed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_with_two_outputs_and_one_loss_parses() {
        let body = json!({
            "input_lot_id": 10,
            "input_quantity_kg": "100.000",
            "outputs": [
                {"item_id": 20, "quantity_kg": "60.000", "to_location_id": 1},
                {"item_id": 21, "quantity_kg": "39.500", "to_location_id": 1}
            ],
            "losses": [
                {"loss_type": "TRIM", "quantity_kg": "0.500", "notes": null}
            ],
            "performed_by": 7
        });
        let request: BreakdownRequest = serde_json::from_value(body).unwrap();

        assert_eq!(request.outputs.len(), 2);
        assert_eq!(request.losses.len(), 1);

        let total_outputs: Decimal = request.outputs.iter().map(|o| o.quantity_kg).sum();
        let total_losses: Decimal = request.losses.iter().map(|l| l.quantity_kg).sum();
        assert_eq!(total_outputs + total_losses, request.input_quantity_kg);
    }

    #[test]
    fn empty_outputs_is_structurally_valid_json_but_a_service_level_rejection() {
        // the contract permits zero outputs; breakdown_service rejects it
        // because a breakdown producing nothing is not a meaningful command
        let body = json!({
            "input_lot_id": 10,
            "input_quantity_kg": "100.000",
            "outputs": [],
            "losses": [],
            "performed_by": 7
        });
        let request: BreakdownRequest = serde_json::from_value(body).unwrap();
        assert!(request.outputs.is_empty());
    }

    #[test]
    fn loss_type_is_a_free_form_code_validated_against_reference_data() {
        let body = json!({
            "input_lot_id": 10,
            "input_quantity_kg": "10.000",
            "outputs": [{"item_id": 20, "quantity_kg": "9.000", "to_location_id": 1}],
            "losses": [{"loss_type": "NOT_A_REAL_CODE", "quantity_kg": "1.000"}],
            "performed_by": 7
        });
        let request: BreakdownRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.losses[0].loss_type, "NOT_A_REAL_CODE");
    }

    #[test]
    fn missing_input_lot_id_is_rejected() {
        let body = json!({
            "input_quantity_kg": "10.000",
            "outputs": [],
            "losses": [],
            "performed_by": 7
        });
        let result: Result<BreakdownRequest, _> = serde_json::from_value(body);
        assert!(result.is_err());
    }
}
