//! Urgency scoring for review-queue ordering.
//!
//! Higher score = reviewed sooner. The score blends how close the
//! voting window is to closing, how heavily the content was flagged,
//! how close the appeal is to quorum, and how close it is to expiry.

use chrono::{DateTime, Duration, Utc};

use crate::config::VotingConfig;

/// Compute the live urgency score for an appeal.
pub fn voting_urgency(
    total_votes: usize,
    appeal_created_at: DateTime<Utc>,
    flag_count: u32,
    now: DateTime<Utc>,
    cfg: &VotingConfig,
) -> f64 {
    let minutes_since_created = (now - appeal_created_at).num_seconds() as f64 / 60.0;
    let expires_at = appeal_created_at + Duration::days(cfg.appeal_expiry_days);
    let hours_until_expiry = (expires_at - now).num_seconds() as f64 / 3600.0;

    let mut score = 0.0;

    // Voting-window pressure: most urgent right after submission, decaying
    // to zero as the window closes.
    let window = cfg.timeout_minutes as f64;
    score += ((window - minutes_since_created) / window).max(0.0) * 50.0;

    // Flag pressure, capped so a pile-on cannot dominate.
    score += (f64::from(flag_count) * 10.0).min(30.0);

    // Quorum proximity: each vote already cast moves the appeal up.
    let votes_counted = total_votes.min(cfg.minimum_votes);
    score += votes_counted as f64 * 5.0;

    // Expiry pressure kicks in during the final day.
    if hours_until_expiry < 24.0 {
        score += (24.0 - hours_until_expiry.max(0.0)) * 2.0;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> VotingConfig {
        VotingConfig::default()
    }

    #[test]
    fn test_fresh_appeal_outranks_stale_one() {
        let now = Utc::now();
        let fresh = voting_urgency(0, now, 1, now, &cfg());
        let stale = voting_urgency(0, now - Duration::minutes(10), 1, now, &cfg());
        assert!(fresh > stale);
    }

    #[test]
    fn test_votes_increase_urgency() {
        let now = Utc::now();
        let created = now - Duration::minutes(2);
        let none = voting_urgency(0, created, 1, now, &cfg());
        let four = voting_urgency(4, created, 1, now, &cfg());
        assert!(four > none);
    }

    #[test]
    fn test_flag_contribution_is_capped() {
        let now = Utc::now();
        let heavy = voting_urgency(0, now, 100, now, &cfg());
        let capped = voting_urgency(0, now, 3, now, &cfg());
        assert_eq!(heavy, capped);
    }

    #[test]
    fn test_near_expiry_boost() {
        let now = Utc::now();
        let near_expiry = now - Duration::days(cfg().appeal_expiry_days) + Duration::hours(2);
        let mid_life = now - Duration::days(10);
        assert!(voting_urgency(0, near_expiry, 0, now, &cfg()) > voting_urgency(0, mid_life, 0, now, &cfg()));
    }
}
