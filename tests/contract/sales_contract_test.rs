// Contract tests for POST /api/sales (SPEC_FULL.md §4.11).
// Mirrors models::sale's wire shape — notably that a sale may reference
// multiple lines against the same lot (quantities summed, not rejected as
// a duplicate), and that an empty `lines` array is structurally valid JSON
// even though sales_service rejects it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct SaleLineIn {
    lot_id: i64,
    quantity_kg: Decimal,
}

#[derive(Debug, Deserialize)]
struct SaleCreateRequest {
    customer_id: i64,
    sold_at: Option<DateTime<Utc>>,
    lines: Vec<SaleLineIn>,
    notes: Option<String>,
    performed_by: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_lot_sale_parses_with_ascending_and_descending_lot_ids() {
        let body = json!({
            "customer_id": 5,
            "lines": [
                {"lot_id": 30, "quantity_kg": "5.000"},
                {"lot_id": 12, "quantity_kg": "3.000"}
            ],
            "performed_by": 7
        });
        let request: SaleCreateRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.lines.len(), 2);
        // the wire order need not be lock order; sales_service is
        // responsible for re-sorting ascending before locking
        assert_eq!(request.lines[0].lot_id, 30);
        assert_eq!(request.lines[1].lot_id, 12);
    }

    #[test]
    fn repeated_lines_against_the_same_lot_parse_and_sum() {
        let body = json!({
            "customer_id": 5,
            "lines": [
                {"lot_id": 30, "quantity_kg": "5.000"},
                {"lot_id": 30, "quantity_kg": "2.500"}
            ],
            "performed_by": 7
        });
        let request: SaleCreateRequest = serde_json::from_value(body).unwrap();
        let total: Decimal = request
            .lines
            .iter()
            .filter(|l| l.lot_id == 30)
            .map(|l| l.quantity_kg)
            .sum();
        assert_eq!(total, Decimal::new(7500, 3));
    }

    #[test]
    fn empty_lines_is_structurally_valid_but_a_service_level_rejection() {
        let body = json!({
            "customer_id": 5,
            "lines": [],
            "performed_by": 7
        });
        let request: SaleCreateRequest = serde_json::from_value(body).unwrap();
        assert!(request.lines.is_empty());
    }

    #[test]
    fn sold_at_defaults_to_none_meaning_server_assigned_now() {
        let body = json!({
            "customer_id": 5,
            "lines": [{"lot_id": 30, "quantity_kg": "1.000"}],
            "performed_by": 7
        });
        let request: SaleCreateRequest = serde_json::from_value(body).unwrap();
        assert!(request.sold_at.is_none());
    }
}
