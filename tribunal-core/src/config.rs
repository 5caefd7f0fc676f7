//! Voting configuration.
//!
//! Thresholds are loaded once at process start and threaded through
//! calls explicitly. There is deliberately no module-level cache here:
//! every function that needs a threshold takes a `&VotingConfig`.

use serde::{Deserialize, Serialize};

/// Thresholds governing the appeal lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingConfig {
    /// Votes required before an appeal is eligible for automatic
    /// resolution (quorum).
    pub minimum_votes: usize,
    /// Length of the community voting window, in minutes. Short by
    /// design; distinct from the 30-day appeal expiry.
    pub timeout_minutes: i64,
    /// Minimum voter account age, in days.
    pub min_account_age_days: i64,
    /// Minimum voter reputation score.
    pub min_reputation_score: i64,
    /// Rolling-window cap on votes per actor per hour.
    pub max_votes_per_hour: usize,
    /// Fixed daily cap on appeal submissions per actor.
    pub max_appeals_per_day: usize,
    /// Days until an unresolved appeal expires, and the length of the
    /// window after a moderation decision during which it can be
    /// appealed at all.
    pub appeal_expiry_days: i64,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            minimum_votes: 5,
            timeout_minutes: 5,
            min_account_age_days: 7,
            min_reputation_score: 10,
            max_votes_per_hour: 20,
            max_appeals_per_day: 5,
            appeal_expiry_days: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_policy() {
        let cfg = VotingConfig::default();
        assert_eq!(cfg.minimum_votes, 5);
        assert_eq!(cfg.timeout_minutes, 5);
        assert_eq!(cfg.max_appeals_per_day, 5);
        assert_eq!(cfg.max_votes_per_hour, 20);
        assert_eq!(cfg.appeal_expiry_days, 30);
    }
}
