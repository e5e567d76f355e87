use std::fmt;

use serde::Serialize;

/// Lifecycle state of a proposal, always recomputed from the underlying
/// events rather than stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProposalStatus {
    /// Fewer approvals than the threshold.
    Collecting,
    /// Approvals reached the threshold but no execution event has been
    /// observed yet. Transient: the chain executes as part of the final
    /// approval, so this only shows up while the indexer lags.
    Executable,
    Executed,
    Cancelled,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProposalStatus::Executed | ProposalStatus::Cancelled)
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProposalStatus::Collecting => write!(f, "collecting"),
            ProposalStatus::Executable => write!(f, "executable"),
            ProposalStatus::Executed => write!(f, "executed"),
            ProposalStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Pure status derivation. An observed execution event is authoritative and
/// wins over everything else; the approval count is advisory.
pub fn derive_status(
    approval_count: usize,
    threshold: u16,
    executed: bool,
    cancelled: bool,
) -> ProposalStatus {
    if executed {
        ProposalStatus::Executed
    } else if cancelled {
        ProposalStatus::Cancelled
    } else if approval_count >= usize::from(threshold) {
        ProposalStatus::Executable
    } else {
        ProposalStatus::Collecting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_is_collecting() {
        assert_eq!(derive_status(1, 2, false, false), ProposalStatus::Collecting);
        assert_eq!(derive_status(2, 3, false, false), ProposalStatus::Collecting);
    }

    #[test]
    fn at_threshold_without_execution_event_is_executable() {
        assert_eq!(derive_status(2, 2, false, false), ProposalStatus::Executable);
        assert_eq!(derive_status(3, 2, false, false), ProposalStatus::Executable);
    }

    #[test]
    fn execution_event_wins_over_approval_count() {
        assert_eq!(derive_status(1, 2, true, false), ProposalStatus::Executed);
        assert_eq!(derive_status(2, 2, true, false), ProposalStatus::Executed);
        // and over a cancellation event, should both ever be observed
        assert_eq!(derive_status(2, 2, true, true), ProposalStatus::Executed);
    }

    #[test]
    fn cancellation_event_is_terminal() {
        assert_eq!(derive_status(1, 2, false, true), ProposalStatus::Cancelled);
        assert!(derive_status(1, 2, false, true).is_terminal());
        assert!(!derive_status(1, 2, false, false).is_terminal());
    }
}
