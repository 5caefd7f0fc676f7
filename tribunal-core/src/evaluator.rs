//! Quorum/outcome evaluator.
//!
//! Pure function mapping a vote set plus elapsed time to an outcome.
//! This function has NO side effects — the caller decides whether and
//! how to apply the outcome (synchronously on a vote write, or from the
//! periodic tally job).

use chrono::{DateTime, Duration, Utc};

use crate::config::VotingConfig;
use crate::types::VoteChoice;

/// Aggregate vote counts for an appeal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteTally {
    pub approve: usize,
    pub reject: usize,
}

impl VoteTally {
    /// Count a slice of vote choices.
    pub fn count(votes: &[VoteChoice]) -> Self {
        let approve = votes.iter().filter(|v| **v == VoteChoice::Approve).count();
        Self {
            approve,
            reject: votes.len() - approve,
        }
    }

    pub fn total(&self) -> usize {
        self.approve + self.reject
    }
}

/// What the evaluator concluded about an appeal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Neither quorum nor timeout reached; keep collecting votes.
    Pending,
    /// Voting window elapsed with zero votes cast. Content stays hidden.
    Timeout,
    /// Strict majority approved: restore the content.
    Approved,
    /// No strict majority: content stays hidden.
    Rejected,
}

impl Outcome {
    /// Whether this outcome resolves the appeal.
    pub fn is_ready(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Full evaluation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub quorum_met: bool,
    pub timeout_reached: bool,
    pub tally: VoteTally,
    pub outcome: Outcome,
}

/// Evaluate an appeal's vote set against the quorum and timeout rules.
///
/// - `quorum_met` iff the vote count has reached `minimum_votes`.
/// - `timeout_reached` iff `timeout_minutes` have elapsed since the
///   appeal was created. This is the short voting window, not the
///   30-day appeal expiry.
/// - Outcome is `Pending` until one of the two triggers fires, then a
///   strict-majority decision over the votes actually cast. Exactly 50%
///   approval is NOT approval.
pub fn evaluate(
    votes: &[VoteChoice],
    appeal_created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    cfg: &VotingConfig,
) -> Evaluation {
    let tally = VoteTally::count(votes);
    let quorum_met = tally.total() >= cfg.minimum_votes;
    let timeout_reached = now - appeal_created_at >= Duration::minutes(cfg.timeout_minutes);

    let outcome = if !quorum_met && !timeout_reached {
        Outcome::Pending
    } else if timeout_reached && tally.total() == 0 {
        Outcome::Timeout
    } else if tally.approve * 2 > tally.total() {
        // approve/total > 0.5 without floating point
        Outcome::Approved
    } else {
        Outcome::Rejected
    };

    Evaluation {
        quorum_met,
        timeout_reached,
        tally,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cfg() -> VotingConfig {
        VotingConfig::default()
    }

    fn votes(approve: usize, reject: usize) -> Vec<VoteChoice> {
        let mut v = vec![VoteChoice::Approve; approve];
        v.extend(vec![VoteChoice::Reject; reject]);
        v
    }

    #[test]
    fn test_three_of_five_approves() {
        let now = Utc::now();
        let eval = evaluate(&votes(3, 2), now, now, &cfg());
        assert!(eval.quorum_met);
        assert_eq!(eval.outcome, Outcome::Approved);
    }

    #[test]
    fn test_two_of_five_rejects() {
        let now = Utc::now();
        let eval = evaluate(&votes(2, 3), now, now, &cfg());
        assert!(eval.quorum_met);
        assert_eq!(eval.outcome, Outcome::Rejected);
    }

    #[test]
    fn test_exactly_half_is_not_approved() {
        // Timeout with a 2-2 split: strict majority required.
        let now = Utc::now();
        let created = now - Duration::minutes(6);
        let eval = evaluate(&votes(2, 2), created, now, &cfg());
        assert!(!eval.quorum_met);
        assert!(eval.timeout_reached);
        assert_eq!(eval.outcome, Outcome::Rejected);
    }

    #[test]
    fn test_below_quorum_before_timeout_is_pending() {
        let now = Utc::now();
        let created = now - Duration::minutes(2);
        let eval = evaluate(&votes(3, 0), created, now, &cfg());
        assert!(!eval.quorum_met);
        assert!(!eval.timeout_reached);
        assert_eq!(eval.outcome, Outcome::Pending);
    }

    #[test]
    fn test_timeout_with_zero_votes() {
        let now = Utc::now();
        let created = now - Duration::minutes(5);
        let eval = evaluate(&[], created, now, &cfg());
        assert!(eval.timeout_reached);
        assert_eq!(eval.outcome, Outcome::Timeout);
    }

    #[test]
    fn test_timeout_with_partial_votes_uses_majority() {
        // 2-for/1-against after the window: resolved by the 3 cast votes.
        let now = Utc::now();
        let created = now - Duration::minutes(10);
        let eval = evaluate(&votes(2, 1), created, now, &cfg());
        assert!(!eval.quorum_met);
        assert!(eval.timeout_reached);
        assert_eq!(eval.outcome, Outcome::Approved);
    }

    #[test]
    fn test_timeout_boundary_is_inclusive() {
        let now = Utc::now();
        let created = now - Duration::minutes(cfg().timeout_minutes);
        let eval = evaluate(&[], created, now, &cfg());
        assert!(eval.timeout_reached);
    }

    proptest! {
        /// Approved requires a strict majority, for any vote mix at quorum.
        #[test]
        fn approved_iff_strict_majority(approve in 0usize..20, reject in 0usize..20) {
            prop_assume!(approve + reject >= 5);
            let now = Utc::now();
            let eval = evaluate(&votes(approve, reject), now, now, &cfg());
            prop_assert!(eval.quorum_met);
            if approve * 2 > approve + reject {
                prop_assert_eq!(eval.outcome, Outcome::Approved);
            } else {
                prop_assert_eq!(eval.outcome, Outcome::Rejected);
            }
        }

        /// The evaluator never resolves an appeal before quorum or timeout.
        #[test]
        fn pending_until_trigger(approve in 0usize..5, reject in 0usize..5, minutes in 0i64..5) {
            prop_assume!(approve + reject < 5);
            let now = Utc::now();
            let created = now - Duration::minutes(minutes) + Duration::seconds(1);
            let eval = evaluate(&votes(approve, reject), created, now, &cfg());
            prop_assert_eq!(eval.outcome, Outcome::Pending);
        }

        /// The tally always matches the input votes.
        #[test]
        fn tally_matches_input(approve in 0usize..50, reject in 0usize..50) {
            let tally = VoteTally::count(&votes(approve, reject));
            prop_assert_eq!(tally.approve, approve);
            prop_assert_eq!(tally.reject, reject);
            prop_assert_eq!(tally.total(), approve + reject);
        }
    }
}
