//! Outstanding-request counter.

use tracing::warn;

/// Result of settling one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// Requests still outstanding.
    Outstanding(usize),
    /// The count just reached zero after at least one issue.
    AllSettled,
    /// More settlements than issues; the count stays at zero.
    Underflow,
}

/// Counts reads issued and not yet answered within one load generation.
///
/// Every `issue` must be matched by exactly one `settle`, whatever the
/// reply's outcome.
#[derive(Debug, Default)]
pub struct PendingLedger {
    outstanding: usize,
    issued_total: usize,
}

impl PendingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) {
        self.outstanding += 1;
        self.issued_total += 1;
    }

    pub fn settle(&mut self) -> SettleOutcome {
        match self.outstanding {
            0 => {
                warn!("pending ledger underflow: settle without a matching issue");
                SettleOutcome::Underflow
            }
            1 => {
                self.outstanding = 0;
                SettleOutcome::AllSettled
            }
            n => {
                self.outstanding = n - 1;
                SettleOutcome::Outstanding(n - 1)
            }
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Whether any request was issued since this ledger was created.
    pub fn has_issued(&self) -> bool {
        self.issued_total > 0
    }

    pub fn is_settled(&self) -> bool {
        self.outstanding == 0 && self.has_issued()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_n_issues_n_settles_fire_once() {
        let mut ledger = PendingLedger::new();
        for _ in 0..5 {
            ledger.issue();
        }
        let outcomes: Vec<_> = (0..5).map(|_| ledger.settle()).collect();
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| **o == SettleOutcome::AllSettled)
                .count(),
            1
        );
        assert_eq!(outcomes.last(), Some(&SettleOutcome::AllSettled));
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn test_extra_issue_refires_only_after_it_settles() {
        let mut ledger = PendingLedger::new();
        ledger.issue();
        assert_eq!(ledger.settle(), SettleOutcome::AllSettled);
        ledger.issue();
        assert!(!ledger.is_settled());
        ledger.issue();
        assert_eq!(ledger.settle(), SettleOutcome::Outstanding(1));
        assert_eq!(ledger.settle(), SettleOutcome::AllSettled);
    }

    #[test]
    fn test_underflow_clamps() {
        let mut ledger = PendingLedger::new();
        assert_eq!(ledger.settle(), SettleOutcome::Underflow);
        assert_eq!(ledger.outstanding(), 0);
        assert!(!ledger.is_settled());
        ledger.issue();
        assert_eq!(ledger.settle(), SettleOutcome::AllSettled);
    }
}
