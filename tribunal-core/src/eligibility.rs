//! Identity & eligibility guard.
//!
//! Pure checks applied before a user may vote on (or submit) an appeal.
//! All rules must pass: no self-interest, sufficient account age,
//! sufficient reputation.

use chrono::{DateTime, Utc};

use crate::config::VotingConfig;
use crate::types::UserId;

/// Outcome of an eligibility check.
///
/// `reason` is human-readable and safe to return to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eligibility {
    pub eligible: bool,
    pub reason: String,
}

impl Eligibility {
    fn ok() -> Self {
        Self {
            eligible: true,
            reason: "meets all voting requirements".to_string(),
        }
    }

    fn denied(reason: String) -> Self {
        Self {
            eligible: false,
            reason,
        }
    }
}

/// Check whether `user_id` may act on an appeal over content owned by
/// `content_owner_id`.
///
/// Pure function: no side effects, no I/O. The caller supplies the
/// user's account creation time and reputation score as observed at
/// request time.
pub fn check_eligibility(
    user_id: &UserId,
    content_owner_id: &UserId,
    account_created_at: DateTime<Utc>,
    reputation_score: i64,
    now: DateTime<Utc>,
    cfg: &VotingConfig,
) -> Eligibility {
    if user_id == content_owner_id {
        return Eligibility::denied("cannot vote on your own content".to_string());
    }

    let account_age_days = (now - account_created_at).num_days();
    if account_age_days < cfg.min_account_age_days {
        return Eligibility::denied(format!(
            "account must be at least {} days old (current: {} days)",
            cfg.min_account_age_days, account_age_days
        ));
    }

    if reputation_score < cfg.min_reputation_score {
        return Eligibility::denied(format!(
            "minimum reputation score required: {} (current: {})",
            cfg.min_reputation_score, reputation_score
        ));
    }

    Eligibility::ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn cfg() -> VotingConfig {
        VotingConfig::default()
    }

    #[test]
    fn test_self_vote_is_rejected() {
        let now = Utc::now();
        let user = UserId::from("u1");
        let result = check_eligibility(&user, &user, now - Duration::days(365), 100, now, &cfg());
        assert!(!result.eligible);
        assert!(result.reason.contains("own content"));
    }

    #[test]
    fn test_young_account_is_rejected() {
        let now = Utc::now();
        let result = check_eligibility(
            &UserId::from("u1"),
            &UserId::from("u2"),
            now - Duration::days(3),
            100,
            now,
            &cfg(),
        );
        assert!(!result.eligible);
        assert!(result.reason.contains("days old"));
    }

    #[test]
    fn test_low_reputation_is_rejected() {
        let now = Utc::now();
        let result = check_eligibility(
            &UserId::from("u1"),
            &UserId::from("u2"),
            now - Duration::days(30),
            9,
            now,
            &cfg(),
        );
        assert!(!result.eligible);
        assert!(result.reason.contains("reputation"));
    }

    #[test]
    fn test_boundary_values_pass() {
        let now = Utc::now();
        // Exactly the minimum age and exactly the minimum reputation.
        let result = check_eligibility(
            &UserId::from("u1"),
            &UserId::from("u2"),
            now - Duration::days(7),
            10,
            now,
            &cfg(),
        );
        assert!(result.eligible, "boundary case should pass: {}", result.reason);
    }

    #[test]
    fn test_self_check_wins_over_other_failures() {
        // A brand-new zero-reputation owner still gets the self-interest
        // reason, which is the one the client should show.
        let now = Utc::now();
        let user = UserId::from("u1");
        let result = check_eligibility(&user, &user, now, 0, now, &cfg());
        assert!(result.reason.contains("own content"));
    }
}
