// Unit tests for the lot lifecycle state machine (SPEC_FULL.md §3, §4.9:
// received -> aging -> released -> {sold, disposed}, with quarantined
// reachable from any non-terminal state). Mirrors LotState::is_terminal
// and the legal-transition table enforced by aging_service/qa_service.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LotState {
    Received,
    Aging,
    Released,
    Sold,
    Disposed,
    Quarantined,
}

impl LotState {
    fn is_terminal(&self) -> bool {
        matches!(self, LotState::Sold | LotState::Disposed | LotState::Quarantined)
    }
}

/// Mirrors the transitions actually issued across aging_service (start/
/// release), sales_service (mark sold), qa_service/recall_service (quarantine).
fn can_transition(from: LotState, to: LotState) -> bool {
    use LotState::*;
    match (from, to) {
        (Received, Aging) => true,
        (Aging, Released) => true,
        (Released, Sold) => true,
        (Received | Aging | Released, Quarantined) => true,
        (Received | Aging | Released, Disposed) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_sold_disposed_quarantined() {
        assert!(LotState::Sold.is_terminal());
        assert!(LotState::Disposed.is_terminal());
        assert!(LotState::Quarantined.is_terminal());
        assert!(!LotState::Received.is_terminal());
        assert!(!LotState::Aging.is_terminal());
        assert!(!LotState::Released.is_terminal());
    }

    #[test]
    fn happy_path_progression_is_legal() {
        assert!(can_transition(LotState::Received, LotState::Aging));
        assert!(can_transition(LotState::Aging, LotState::Released));
        assert!(can_transition(LotState::Released, LotState::Sold));
    }

    #[test]
    fn cannot_skip_aging_straight_to_released() {
        assert!(!can_transition(LotState::Received, LotState::Released));
    }

    #[test]
    fn cannot_sell_a_lot_that_was_never_released() {
        assert!(!can_transition(LotState::Received, LotState::Sold));
        assert!(!can_transition(LotState::Aging, LotState::Sold));
    }

    #[test]
    fn quarantine_is_reachable_from_every_non_terminal_state() {
        assert!(can_transition(LotState::Received, LotState::Quarantined));
        assert!(can_transition(LotState::Aging, LotState::Quarantined));
        assert!(can_transition(LotState::Released, LotState::Quarantined));
    }

    #[test]
    fn no_transition_leaves_a_terminal_state() {
        for terminal in [LotState::Sold, LotState::Disposed, LotState::Quarantined] {
            for target in [
                LotState::Received,
                LotState::Aging,
                LotState::Released,
                LotState::Sold,
                LotState::Disposed,
                LotState::Quarantined,
            ] {
                assert!(
                    !can_transition(terminal, target),
                    "{:?} -> {:?} should be illegal, terminal states are absorbing",
                    terminal,
                    target
                );
            }
        }
    }
}
