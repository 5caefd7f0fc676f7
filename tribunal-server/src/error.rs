//! Domain error taxonomy.
//!
//! Every failure a caller can see maps to exactly one variant here, and
//! every variant maps to exactly one HTTP status. Eligibility,
//! rate-limit, and validation failures are definitive responses, never
//! silently swallowed; conflict-class errors tell the caller to
//! re-fetch state rather than retry blindly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

use tribunal_core::{AppealId, VoteChoice};

use crate::appeal::record::AppealStatus;
use crate::repository::RepositoryError;

#[derive(Debug, Error)]
pub enum AppealError {
    /// Malformed or out-of-range request data. Local, no retry.
    #[error("invalid request: {0}")]
    Validation(String),

    /// No verified caller identity on the request.
    #[error("missing or invalid caller identity")]
    Unauthenticated,

    /// The caller is authenticated but lacks the required role.
    #[error("insufficient permissions")]
    Forbidden,

    /// The eligibility guard rejected the actor.
    #[error("not eligible: {reason}")]
    NotEligible { reason: String },

    /// Rolling or fixed window cap hit. Retry after `reset_at`.
    #[error("rate limit exceeded ({count}/{max})")]
    RateLimited {
        count: usize,
        max: usize,
        reset_at: DateTime<Utc>,
    },

    /// The submitter already has a live appeal for this content.
    #[error("an appeal for this content already exists")]
    DuplicateAppeal {
        existing_id: AppealId,
        status: AppealStatus,
    },

    /// One vote per (appeal, voter); the second attempt is terminal.
    #[error("vote already recorded for this appeal")]
    DuplicateVote {
        existing_choice: VoteChoice,
        cast_at: DateTime<Utc>,
    },

    /// The appeal is not in a state (or queue) that accepts votes.
    #[error("appeal is not accepting votes: {reason}")]
    AppealNotVotable { reason: String },

    /// The 30-day appeal lifetime has elapsed.
    #[error("appeal has expired")]
    AppealExpired { expires_at: DateTime<Utc> },

    /// The moderation decision is too old to appeal.
    #[error("appeal window has closed")]
    WindowExpired { deadline: DateTime<Utc> },

    /// The content's current moderation status is not in the appealable set.
    #[error("content is not under a moderation decision that can be appealed")]
    NotAppealable { content_status: String },

    /// The requested state change is not legal from the current state.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: AppealStatus, to: AppealStatus },

    /// Override precondition failed: the appeal is past the point where
    /// a moderator may preempt it.
    #[error("override is not allowed for this appeal")]
    OverrideNotAllowed { status: AppealStatus },

    /// Another writer won the race; the caller must re-fetch and re-decide.
    #[error("appeal was modified concurrently")]
    OverrideConflict,

    /// Replay with a mismatched decision or idempotency key.
    #[error("appeal already overridden")]
    AlreadyOverridden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Internal(#[from] RepositoryError),
}

impl AppealError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::NotEligible { .. } => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::DuplicateAppeal { .. }
            | Self::DuplicateVote { .. }
            | Self::AppealNotVotable { .. }
            | Self::NotAppealable { .. }
            | Self::InvalidTransition { .. }
            | Self::OverrideNotAllowed { .. }
            | Self::OverrideConflict
            | Self::AlreadyOverridden => StatusCode::CONFLICT,
            Self::AppealExpired { .. } | Self::WindowExpired { .. } => StatusCode::GONE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code for the JSON body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::NotEligible { .. } => "not_eligible",
            Self::RateLimited { .. } => "rate_limit_exceeded",
            Self::DuplicateAppeal { .. } => "duplicate_appeal",
            Self::DuplicateVote { .. } => "duplicate_vote",
            Self::AppealNotVotable { .. } => "appeal_not_votable",
            Self::AppealExpired { .. } => "appeal_expired",
            Self::WindowExpired { .. } => "appeal_window_expired",
            Self::NotAppealable { .. } => "not_appealable",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::OverrideNotAllowed { .. } => "override_not_allowed",
            Self::OverrideConflict => "override_conflict",
            Self::AlreadyOverridden => "appeal_overridden",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Structured detail so the client can explain the failure without
    /// a second round-trip.
    fn details(&self) -> serde_json::Value {
        match self {
            Self::RateLimited {
                count,
                max,
                reset_at,
            } => json!({ "count": count, "max": max, "resetAt": reset_at }),
            Self::DuplicateAppeal {
                existing_id,
                status,
            } => json!({ "existingAppealId": existing_id, "status": status }),
            Self::DuplicateVote {
                existing_choice,
                cast_at,
            } => json!({ "existingVote": existing_choice, "castAt": cast_at }),
            Self::AppealExpired { expires_at } => json!({ "expiresAt": expires_at }),
            Self::WindowExpired { deadline } => json!({ "appealDeadline": deadline }),
            Self::NotAppealable { content_status } => {
                json!({ "currentStatus": content_status })
            }
            Self::AppealNotVotable { reason } => json!({ "reason": reason }),
            Self::NotEligible { reason } => json!({ "reason": reason }),
            Self::InvalidTransition { from, to } => json!({ "from": from, "to": to }),
            Self::OverrideNotAllowed { status } => json!({ "currentStatus": status }),
            _ => serde_json::Value::Null,
        }
    }
}

impl IntoResponse for AppealError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal error");
        }
        // Internal detail stays out of the response body.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        let mut body = json!({ "error": self.code(), "message": message });
        let details = self.details();
        if !details.is_null() {
            body["details"] = details;
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppealError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppealError::NotEligible {
                reason: "x".into()
            }
            .status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppealError::RateLimited {
                count: 5,
                max: 5,
                reset_at: Utc::now()
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppealError::AppealExpired {
                expires_at: Utc::now()
            }
            .status_code(),
            StatusCode::GONE
        );
        assert_eq!(
            AppealError::OverrideConflict.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppealError::NotFound("appeal").status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_rate_limit_details_carry_reset_time() {
        let reset_at = Utc::now();
        let err = AppealError::RateLimited {
            count: 21,
            max: 20,
            reset_at,
        };
        let details = err.details();
        assert_eq!(details["count"], 21);
        assert_eq!(details["max"], 20);
        assert!(details["resetAt"].is_string());
    }
}
