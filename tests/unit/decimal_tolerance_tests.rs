// Unit tests for mass-balance tolerance arithmetic (SPEC_FULL.md §9:
// quantity comparisons must never hop through f64; mirrors
// availability_service::within_tolerance / QUANTITY_TOLERANCE_KG).

use rust_decimal::Decimal;
use std::str::FromStr;

const QUANTITY_TOLERANCE_KG: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= QUANTITY_TOLERANCE_KG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_within_tolerance() {
        let a = Decimal::from_str("10.000").unwrap();
        let b = Decimal::from_str("10.000").unwrap();
        assert!(within_tolerance(a, b));
    }

    #[test]
    fn difference_at_tolerance_boundary_is_accepted() {
        let a = Decimal::from_str("10.000").unwrap();
        let b = Decimal::from_str("10.001").unwrap();
        assert!(within_tolerance(a, b));
    }

    #[test]
    fn difference_past_boundary_is_rejected() {
        let a = Decimal::from_str("10.000").unwrap();
        let b = Decimal::from_str("10.002").unwrap();
        assert!(!within_tolerance(a, b));
    }

    #[test]
    fn tolerance_is_symmetric() {
        let a = Decimal::from_str("5.500").unwrap();
        let b = Decimal::from_str("5.499").unwrap();
        assert!(within_tolerance(a, b));
        assert!(within_tolerance(b, a));
    }

    #[test]
    fn mass_balance_sums_lose_no_precision_across_many_terms() {
        // Sigma of 3 inputs should equal sigma of 2 outputs + 1 loss exactly,
        // a case where an f64 accumulation would drift but Decimal does not.
        let inputs = [
            Decimal::from_str("3.333").unwrap(),
            Decimal::from_str("3.333").unwrap(),
            Decimal::from_str("3.334").unwrap(),
        ];
        let total_in: Decimal = inputs.iter().copied().sum();

        let outputs = Decimal::from_str("9.500").unwrap();
        let loss = Decimal::from_str("0.500").unwrap();

        assert!(within_tolerance(total_in, outputs + loss));
    }
}
