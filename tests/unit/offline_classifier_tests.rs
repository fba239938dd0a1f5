// Unit tests for the offline reconciler's conflict/reject classifier
// (SPEC_FULL.md §4.13, mirrors error::is_conflict_signal). A group's
// failure is a `conflict` (state moved on since the client queued the
// action) or a `rejected` (malformed/invalid regardless of server state) —
// getting this wrong misfiles rejectable garbage as a resolvable conflict.

fn is_conflict_signal(message: &str) -> bool {
    const SIGNALS: &[&str] = &[
        "Insufficient available",
        "Insufficient reservable",
        "not released",
        "not ready",
        "quarantined",
        "Weight mismatch",
        "must consume full available",
        "Invalid",
        "already used",
    ];
    SIGNALS.iter().any(|s| message.contains(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_available_quantity_is_a_conflict() {
        assert!(is_conflict_signal(
            "Insufficient available quantity for sale on lot 42: requested 10.000, available 3.500"
        ));
    }

    #[test]
    fn insufficient_reservable_quantity_is_a_conflict() {
        assert!(is_conflict_signal(
            "Insufficient reservable quantity on lot 7"
        ));
    }

    #[test]
    fn lot_not_released_is_a_conflict() {
        assert!(is_conflict_signal("Lot 12 is not released"));
    }

    #[test]
    fn lot_not_ready_is_a_conflict() {
        assert!(is_conflict_signal("Lot 12 is not ready for release"));
    }

    #[test]
    fn quarantined_lot_is_a_conflict() {
        assert!(is_conflict_signal("Lot 9 is quarantined"));
    }

    #[test]
    fn weight_mismatch_is_a_conflict() {
        assert!(is_conflict_signal(
            "Weight mismatch: outputs + losses does not balance against inputs"
        ));
    }

    #[test]
    fn malformed_payload_is_classified_as_conflict_not_silently_rejected() {
        // a client replaying a stale schema version should be told to
        // resync rather than have the row silently dropped as rejected
        assert!(is_conflict_signal(
            "Invalid breakdown payload: missing field `outputs`"
        ));
    }

    #[test]
    fn unrelated_database_error_is_not_a_conflict() {
        assert!(!is_conflict_signal("connection reset by peer"));
    }

    #[test]
    fn unsupported_action_type_is_not_a_conflict() {
        assert!(!is_conflict_signal("Unsupported offline action_type 'widget'"));
    }
}
