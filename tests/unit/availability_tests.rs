// Unit tests for the Availability Oracle's classification rules
// (SPEC_FULL.md §4.2): which states/movement types count toward on_hand,
// and the available_for_sale_kg gating on ready_at.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LotState {
    Received,
    Aging,
    Released,
    Sold,
    Disposed,
    Quarantined,
}

struct Availability {
    on_hand_kg: Decimal,
    reserved_kg: Decimal,
    available_kg: Decimal,
    available_for_sale_kg: Decimal,
}

/// Mirrors availability_service::compute's classification rules without a
/// database round trip: on_hand is receipts minus consuming movements,
/// available is on_hand minus reservations, and available_for_sale is
/// additionally gated on state and ready_at.
fn compute(
    received_kg: Decimal,
    consumed_kg: Decimal,
    reserved_kg: Decimal,
    state: LotState,
    ready_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Availability {
    let on_hand_kg = received_kg - consumed_kg;
    let available_kg = on_hand_kg - reserved_kg;

    let sellable_state = matches!(state, LotState::Released);
    let ready = ready_at.map(|r| r <= now).unwrap_or(false);

    let available_for_sale_kg = if sellable_state && ready {
        available_kg
    } else {
        Decimal::ZERO
    };

    Availability {
        on_hand_kg,
        reserved_kg,
        available_kg,
        available_for_sale_kg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn released_and_ready_lot_is_fully_available_for_sale() {
        let now = Utc::now();
        let a = compute(
            d("100.000"),
            d("0"),
            d("0"),
            LotState::Released,
            Some(now - Duration::days(1)),
            now,
        );
        assert_eq!(a.available_for_sale_kg, d("100.000"));
    }

    #[test]
    fn released_but_not_yet_ready_is_not_available_for_sale() {
        let now = Utc::now();
        let a = compute(
            d("100.000"),
            d("0"),
            d("0"),
            LotState::Released,
            Some(now + Duration::days(1)),
            now,
        );
        assert_eq!(a.available_for_sale_kg, Decimal::ZERO);
        // on_hand and available are unaffected by the sale gate
        assert_eq!(a.available_kg, d("100.000"));
    }

    #[test]
    fn aging_lot_has_on_hand_but_no_available_for_sale() {
        let now = Utc::now();
        let a = compute(d("50.000"), d("0"), d("0"), LotState::Aging, None, now);
        assert_eq!(a.on_hand_kg, d("50.000"));
        assert_eq!(a.available_for_sale_kg, Decimal::ZERO);
    }

    #[test]
    fn quarantined_lot_is_never_available_for_sale_even_if_ready() {
        let now = Utc::now();
        let a = compute(
            d("20.000"),
            d("0"),
            d("0"),
            LotState::Quarantined,
            Some(now - Duration::days(1)),
            now,
        );
        assert_eq!(a.available_for_sale_kg, Decimal::ZERO);
    }

    #[test]
    fn reservations_reduce_available_but_not_on_hand() {
        let now = Utc::now();
        let a = compute(
            d("100.000"),
            d("0"),
            d("30.000"),
            LotState::Released,
            Some(now - Duration::days(1)),
            now,
        );
        assert_eq!(a.on_hand_kg, d("100.000"));
        assert_eq!(a.available_kg, d("70.000"));
        assert_eq!(a.available_for_sale_kg, d("70.000"));
    }

    #[test]
    fn consumed_quantity_reduces_on_hand() {
        let now = Utc::now();
        let a = compute(d("100.000"), d("40.000"), d("0"), LotState::Aging, None, now);
        assert_eq!(a.on_hand_kg, d("60.000"));
    }
}
