//! Quote lifecycle: DRAFT → SENT → ACCEPTED | REJECTED.
//!
//! Accepted and rejected are terminal for the forward workflow; totals stay
//! recomputable in any state for display and audit. Direct writes to any
//! status remain allowed as a manual correction path — a non-forward write is
//! logged, not rejected.

use crate::models::QuoteStatus;

pub fn is_forward_transition(from: QuoteStatus, to: QuoteStatus) -> bool {
    use QuoteStatus::{Accepted, Draft, Rejected, Sent};
    matches!(
        (from, to),
        (Draft, Sent) | (Sent, Accepted) | (Sent, Rejected)
    )
}

pub fn is_terminal(status: QuoteStatus) -> bool {
    matches!(status, QuoteStatus::Accepted | QuoteStatus::Rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuoteStatus::{Accepted, Draft, Rejected, Sent};

    #[test]
    fn forward_path_is_draft_sent_then_terminal() {
        assert!(is_forward_transition(Draft, Sent));
        assert!(is_forward_transition(Sent, Accepted));
        assert!(is_forward_transition(Sent, Rejected));
    }

    #[test]
    fn skips_and_reversals_are_not_forward() {
        assert!(!is_forward_transition(Draft, Accepted));
        assert!(!is_forward_transition(Accepted, Draft));
        assert!(!is_forward_transition(Rejected, Sent));
        assert!(!is_forward_transition(Sent, Sent));
    }

    #[test]
    fn only_accepted_and_rejected_are_terminal() {
        assert!(is_terminal(Accepted));
        assert!(is_terminal(Rejected));
        assert!(!is_terminal(Draft));
        assert!(!is_terminal(Sent));
    }
}
