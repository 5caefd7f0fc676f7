//! The appeal document and its state machine.
//!
//! An appeal is created once, mutated only through the legal
//! transitions below, and never deleted. The status enum plus the
//! transition guard are the single place that encodes:
//!
//! ```text
//! pending ──► tallying ──► approved | rejected
//!    │            │
//!    └────────────┴──────► overridden | expired
//! ```
//!
//! Everything else is rejected as an invalid transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use tribunal_core::{
    AppealId, AppealKind, ContentRef, Decision, ReasonCode, ReviewQueue, UserId, VotingConfig,
};

use crate::error::AppealError;

/// Lifecycle status of an appeal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppealStatus {
    /// Accepting votes (or awaiting admin review).
    Pending,
    /// Quorum or timeout reached; a resolution is being applied.
    Tallying,
    /// Community approved: content restored.
    Approved,
    /// Community rejected (or voting window closed): content stays hidden.
    Rejected,
    /// A moderator short-circuited voting.
    Overridden,
    /// The 30-day appeal lifetime elapsed without resolution.
    Expired,
}

impl AppealStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Rejected | Self::Overridden | Self::Expired
        )
    }

    /// States from which a resolution (or expiry, or override) may start.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Tallying)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Tallying => "tallying",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Overridden => "overridden",
            Self::Expired => "expired",
        }
    }

    /// Check whether `self -> to` is a legal transition.
    pub fn check_transition(self, to: AppealStatus) -> Result<(), AppealError> {
        let legal = match (self, to) {
            (Self::Pending, Self::Tallying) => true,
            (Self::Pending | Self::Tallying, Self::Approved)
            | (Self::Pending | Self::Tallying, Self::Rejected)
            | (Self::Pending | Self::Tallying, Self::Overridden)
            | (Self::Pending | Self::Tallying, Self::Expired) => true,
            _ => false,
        };
        if legal {
            Ok(())
        } else {
            Err(AppealError::InvalidTransition { from: self, to })
        }
    }
}

impl fmt::Display for AppealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One appeal per (content item, submitter) while non-terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appeal {
    pub id: AppealId,
    pub content: ContentRef,
    pub content_owner_id: UserId,
    pub submitter_id: UserId,
    pub kind: AppealKind,
    /// Short summary of why the decision was wrong (10-200 chars).
    pub reason: String,
    /// The submitter's full statement (20-2000 chars).
    pub statement: String,
    /// First 200 characters of the content, captured at submission so
    /// reviewers can vote without a second lookup.
    pub content_preview: Option<String>,
    /// Flag count on the content at submission time.
    pub flag_count: u32,

    pub status: AppealStatus,
    /// Set exactly once when the appeal leaves `pending`/`tallying`
    /// with a decision; `None` for expired appeals.
    pub final_decision: Option<Decision>,
    pub review_queue: ReviewQueue,

    // Denormalized counters, recomputed from the vote ledger on every
    // vote write. The ledger is the source of truth.
    pub votes_for: usize,
    pub votes_against: usize,
    pub total_votes: usize,
    pub required_votes: usize,

    /// Static urgency assigned at submission (0-10).
    pub urgency_score: u8,

    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,

    pub override_idempotency_key: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub decision_reason_code: Option<ReasonCode>,
    pub decision_note: Option<String>,
}

impl Appeal {
    /// Whether enough votes have been recorded to meet quorum.
    pub fn quorum_reached(&self) -> bool {
        self.required_votes > 0 && self.total_votes >= self.required_votes
    }

    /// The static urgency score: base urgency by appeal kind plus flag
    /// pressure, capped at 10.
    pub fn compute_urgency(kind: AppealKind, flag_count: u32) -> u8 {
        let score = u32::from(kind.base_urgency()) + flag_count / 2;
        score.min(10) as u8
    }

    /// Snapshot of the fields an audit record captures as before/after.
    pub fn audit_snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.status,
            "finalDecision": self.final_decision,
            "votesFor": self.votes_for,
            "votesAgainst": self.votes_against,
            "totalVotes": self.total_votes,
            "quorumReached": self.quorum_reached(),
        })
    }
}

/// Decide which queue reviews an appeal.
///
/// Community voting is only for posts and comments appealed by someone
/// other than the content owner. Owner appeals and anything targeting a
/// user document go to the admin queue.
pub fn route_queue(
    content: &ContentRef,
    submitter_id: &UserId,
    content_owner_id: &UserId,
) -> ReviewQueue {
    use tribunal_core::ContentKind;
    if content.kind == ContentKind::User || submitter_id == content_owner_id {
        ReviewQueue::Admin
    } else {
        ReviewQueue::Community
    }
}

/// Build a new appeal in `pending` with all counters zeroed.
#[allow(clippy::too_many_arguments)]
pub fn new_appeal(
    content: ContentRef,
    content_owner_id: UserId,
    submitter_id: UserId,
    kind: AppealKind,
    reason: String,
    statement: String,
    content_preview: Option<String>,
    flag_count: u32,
    now: DateTime<Utc>,
    cfg: &VotingConfig,
) -> Appeal {
    let review_queue = route_queue(&content, &submitter_id, &content_owner_id);
    let urgency_score = Appeal::compute_urgency(kind, flag_count);
    Appeal {
        id: AppealId::generate(),
        content,
        content_owner_id,
        submitter_id,
        kind,
        reason,
        statement,
        content_preview,
        flag_count,
        status: AppealStatus::Pending,
        final_decision: None,
        review_queue,
        votes_for: 0,
        votes_against: 0,
        total_votes: 0,
        required_votes: cfg.minimum_votes,
        urgency_score,
        created_at: now,
        expires_at: now + chrono::Duration::days(cfg.appeal_expiry_days),
        override_idempotency_key: None,
        resolved_at: None,
        resolved_by: None,
        decision_reason_code: None,
        decision_note: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tribunal_core::ContentKind;

    #[test]
    fn test_terminal_states() {
        assert!(!AppealStatus::Pending.is_terminal());
        assert!(!AppealStatus::Tallying.is_terminal());
        assert!(AppealStatus::Approved.is_terminal());
        assert!(AppealStatus::Rejected.is_terminal());
        assert!(AppealStatus::Overridden.is_terminal());
        assert!(AppealStatus::Expired.is_terminal());
    }

    #[test]
    fn test_legal_transitions() {
        use AppealStatus::*;
        assert!(Pending.check_transition(Tallying).is_ok());
        assert!(Pending.check_transition(Approved).is_ok());
        assert!(Pending.check_transition(Overridden).is_ok());
        assert!(Pending.check_transition(Expired).is_ok());
        assert!(Tallying.check_transition(Rejected).is_ok());
        assert!(Tallying.check_transition(Overridden).is_ok());
        assert!(Tallying.check_transition(Expired).is_ok());
    }

    #[test]
    fn test_terminal_states_admit_no_transitions() {
        use AppealStatus::*;
        for from in [Approved, Rejected, Overridden, Expired] {
            for to in [Pending, Tallying, Approved, Rejected, Overridden, Expired] {
                assert!(
                    from.check_transition(to).is_err(),
                    "{from} -> {to} must be rejected"
                );
            }
        }
    }

    #[test]
    fn test_no_backwards_transition() {
        assert!(AppealStatus::Tallying
            .check_transition(AppealStatus::Pending)
            .is_err());
    }

    #[test]
    fn test_queue_routing() {
        let owner = UserId::from("owner");
        let other = UserId::from("other");
        let post = ContentRef::new(ContentKind::Post, "p1");
        let user_doc = ContentRef::new(ContentKind::User, "owner");

        // Non-owner appeal on a post goes to the community.
        assert_eq!(route_queue(&post, &other, &owner), ReviewQueue::Community);
        // Owner appeals always go to admins.
        assert_eq!(route_queue(&post, &owner, &owner), ReviewQueue::Admin);
        // User-content appeals always go to admins, whoever submits.
        assert_eq!(route_queue(&user_doc, &other, &owner), ReviewQueue::Admin);
    }

    #[test]
    fn test_urgency_is_capped_at_ten() {
        assert_eq!(Appeal::compute_urgency(AppealKind::FalsePositive, 100), 10);
        assert_eq!(Appeal::compute_urgency(AppealKind::Other, 0), 3);
        assert_eq!(Appeal::compute_urgency(AppealKind::FalsePositive, 4), 10);
    }
}
