//! Per-actor rate limiting.
//!
//! Two window shapes, matching the two write operations:
//!
//! - appeal submission uses a fixed daily window aligned to UTC
//!   midnight (5/day, resets at midnight);
//! - voting uses a rolling one-hour window (20/hour).
//!
//! The limiter tracks admitted actions in memory. `check` is called
//! before the write, `record` after it succeeds, so a failed write does
//! not consume budget.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use tribunal_core::{UserId, VotingConfig};

use crate::error::AppealError;

/// The rate-limited operation classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionClass {
    SubmitAppeal,
    CastVote,
}

/// In-memory per-actor action log with pruning.
#[derive(Default)]
pub struct RateLimiter {
    actions: Mutex<HashMap<(UserId, ActionClass), Vec<DateTime<Utc>>>>,
}

/// Start of the current fixed daily window.
fn utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(
        &now.date_naive()
            .and_hms_opt(0, 0, 0)
            .unwrap_or_else(|| now.naive_utc()),
    )
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn window_start(action: ActionClass, now: DateTime<Utc>) -> DateTime<Utc> {
        match action {
            ActionClass::SubmitAppeal => utc_midnight(now),
            ActionClass::CastVote => now - Duration::hours(1),
        }
    }

    fn max(action: ActionClass, cfg: &VotingConfig) -> usize {
        match action {
            ActionClass::SubmitAppeal => cfg.max_appeals_per_day,
            ActionClass::CastVote => cfg.max_votes_per_hour,
        }
    }

    /// When the caller may try again: next UTC midnight for the daily
    /// window, one hour after the oldest in-window action for the
    /// rolling window.
    fn reset_at(
        action: ActionClass,
        in_window: &[DateTime<Utc>],
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        match action {
            ActionClass::SubmitAppeal => utc_midnight(now) + Duration::days(1),
            ActionClass::CastVote => in_window
                .iter()
                .min()
                .map(|oldest| *oldest + Duration::hours(1))
                .unwrap_or(now),
        }
    }

    /// Fail with `RateLimited` if the actor is at the cap for this
    /// action class. Does not consume budget.
    pub fn check(
        &self,
        user_id: &UserId,
        action: ActionClass,
        now: DateTime<Utc>,
        cfg: &VotingConfig,
    ) -> Result<(), AppealError> {
        let window_start = Self::window_start(action, now);
        let max = Self::max(action, cfg);

        let mut actions = self.actions.lock().expect("rate limiter lock poisoned");
        let log = actions.entry((user_id.clone(), action)).or_default();
        // Prune everything that can no longer affect any window.
        log.retain(|t| *t >= window_start);

        if log.len() >= max {
            let reset_at = Self::reset_at(action, log, now);
            return Err(AppealError::RateLimited {
                count: log.len(),
                max,
                reset_at,
            });
        }
        Ok(())
    }

    /// Record an admitted action after its write succeeded.
    pub fn record(&self, user_id: &UserId, action: ActionClass, now: DateTime<Utc>) {
        let mut actions = self.actions.lock().expect("rate limiter lock poisoned");
        actions
            .entry((user_id.clone(), action))
            .or_default()
            .push(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> VotingConfig {
        VotingConfig::default()
    }

    #[test]
    fn test_submit_cap_is_daily() {
        let limiter = RateLimiter::new();
        let user = UserId::from("u1");
        let now = Utc::now();
        for _ in 0..5 {
            limiter.check(&user, ActionClass::SubmitAppeal, now, &cfg()).unwrap();
            limiter.record(&user, ActionClass::SubmitAppeal, now);
        }
        let err = limiter
            .check(&user, ActionClass::SubmitAppeal, now, &cfg())
            .unwrap_err();
        match err {
            AppealError::RateLimited { count, max, reset_at } => {
                assert_eq!(count, 5);
                assert_eq!(max, 5);
                assert_eq!(reset_at, utc_midnight(now) + Duration::days(1));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn test_daily_window_resets_at_midnight() {
        let limiter = RateLimiter::new();
        let user = UserId::from("u1");
        let yesterday = utc_midnight(Utc::now()) - Duration::hours(1);
        for _ in 0..5 {
            limiter.record(&user, ActionClass::SubmitAppeal, yesterday);
        }
        // Yesterday's submissions do not count against today.
        assert!(limiter
            .check(&user, ActionClass::SubmitAppeal, Utc::now(), &cfg())
            .is_ok());
    }

    #[test]
    fn test_vote_window_is_rolling() {
        let limiter = RateLimiter::new();
        let user = UserId::from("u1");
        let now = Utc::now();
        // 20 votes 59 minutes ago still count; the same votes 61 minutes
        // ago do not.
        for _ in 0..20 {
            limiter.record(&user, ActionClass::CastVote, now - Duration::minutes(59));
        }
        assert!(limiter.check(&user, ActionClass::CastVote, now, &cfg()).is_err());

        let limiter = RateLimiter::new();
        for _ in 0..20 {
            limiter.record(&user, ActionClass::CastVote, now - Duration::minutes(61));
        }
        assert!(limiter.check(&user, ActionClass::CastVote, now, &cfg()).is_ok());
    }

    #[test]
    fn test_vote_reset_at_is_oldest_plus_hour() {
        let limiter = RateLimiter::new();
        let user = UserId::from("u1");
        let now = Utc::now();
        let oldest = now - Duration::minutes(50);
        limiter.record(&user, ActionClass::CastVote, oldest);
        for _ in 0..19 {
            limiter.record(&user, ActionClass::CastVote, now - Duration::minutes(5));
        }
        match limiter.check(&user, ActionClass::CastVote, now, &cfg()) {
            Err(AppealError::RateLimited { reset_at, .. }) => {
                assert_eq!(reset_at, oldest + Duration::hours(1));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn test_classes_do_not_share_budget() {
        let limiter = RateLimiter::new();
        let user = UserId::from("u1");
        let now = Utc::now();
        for _ in 0..5 {
            limiter.record(&user, ActionClass::SubmitAppeal, now);
        }
        assert!(limiter.check(&user, ActionClass::CastVote, now, &cfg()).is_ok());
    }

    #[test]
    fn test_check_does_not_consume_budget() {
        let limiter = RateLimiter::new();
        let user = UserId::from("u1");
        let now = Utc::now();
        for _ in 0..100 {
            limiter.check(&user, ActionClass::SubmitAppeal, now, &cfg()).unwrap();
        }
    }
}
