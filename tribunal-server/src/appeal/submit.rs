//! Appeal submission.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use tribunal_core::{ActorRole, AppealKind, ContentKind, ContentRef, UserId};

use crate::appeal::record::{new_appeal, Appeal};
use crate::audit::AuditAction;
use crate::error::AppealError;
use crate::rate_limit::ActionClass;
use crate::AppState;

/// The submission request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub content_kind: ContentKind,
    pub content_id: String,
    pub kind: AppealKind,
    pub reason: String,
    pub statement: String,
}

const REASON_LEN: std::ops::RangeInclusive<usize> = 10..=200;
const STATEMENT_LEN: std::ops::RangeInclusive<usize> = 20..=2000;

fn validate(req: &SubmitRequest) -> Result<(), AppealError> {
    let reason_len = req.reason.trim().chars().count();
    if !REASON_LEN.contains(&reason_len) {
        return Err(AppealError::Validation(format!(
            "reason must be {}-{} characters (got {})",
            REASON_LEN.start(),
            REASON_LEN.end(),
            reason_len
        )));
    }
    let statement_len = req.statement.trim().chars().count();
    if !STATEMENT_LEN.contains(&statement_len) {
        return Err(AppealError::Validation(format!(
            "statement must be {}-{} characters (got {})",
            STATEMENT_LEN.start(),
            STATEMENT_LEN.end(),
            statement_len
        )));
    }
    Ok(())
}

/// Submit an appeal against a moderated content item.
///
/// Guard order: validation, rate limit, content lookup and appealable
/// check, 30-day window, duplicate check. Only then is the appeal
/// written, the limiter charged, and the audit record appended.
pub async fn submit_appeal(
    state: &AppState,
    submitter: &UserId,
    req: SubmitRequest,
    now: DateTime<Utc>,
) -> Result<Appeal, AppealError> {
    validate(&req)?;

    state
        .rate_limiter
        .check(submitter, ActionClass::SubmitAppeal, now, &state.voting)?;

    let content_ref = ContentRef::new(req.content_kind, req.content_id.as_str());
    let content = state
        .content
        .read(&content_ref)
        .await?
        .ok_or(AppealError::NotFound("content"))?;

    if !content.status.is_appealable() {
        return Err(AppealError::NotAppealable {
            content_status: content.status.to_string(),
        });
    }

    // The appeal window is anchored on the moderation decision, not on
    // content creation.
    let moderated_at = content.moderated_at.ok_or_else(|| {
        AppealError::NotAppealable {
            content_status: format!("{} (no moderation decision recorded)", content.status),
        }
    })?;
    let deadline = moderated_at + Duration::days(state.voting.appeal_expiry_days);
    if now >= deadline {
        return Err(AppealError::WindowExpired { deadline });
    }

    if let Some(existing) = state
        .appeals
        .find_active_for_submitter(&content_ref, submitter)
        .await?
    {
        return Err(AppealError::DuplicateAppeal {
            existing_id: existing.value.id,
            status: existing.value.status,
        });
    }

    let appeal = new_appeal(
        content_ref.clone(),
        content.owner_id.clone(),
        submitter.clone(),
        req.kind,
        req.reason.trim().to_string(),
        req.statement.trim().to_string(),
        Some(content.preview()),
        content.flag_count,
        now,
        &state.voting,
    );
    state.appeals.insert(&appeal).await?;
    state
        .rate_limiter
        .record(submitter, ActionClass::SubmitAppeal, now);

    // The back-pointer on the content document is best effort; the
    // appeal exists regardless.
    if let Err(e) = state.content.link_appeal(&content_ref, &appeal.id).await {
        tracing::warn!(appeal = %appeal.id, error = %e, "failed to link appeal on content");
    }

    let correlation_id = crate::audit::AuditRecorder::new_correlation_id();
    state
        .audit
        .record(
            AuditAction::AppealSubmit,
            &submitter.to_string(),
            ActorRole::Community,
            &appeal.id.to_string(),
            &content_ref.to_string(),
            None,
            None,
            serde_json::json!({ "contentStatus": content.status }),
            appeal.audit_snapshot(),
            &correlation_id,
        )
        .await?;

    tracing::info!(
        appeal = %appeal.id,
        content = %content_ref,
        queue = %appeal.review_queue,
        urgency = appeal.urgency_score,
        "appeal submitted"
    );

    Ok(appeal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(reason: &str, statement: &str) -> SubmitRequest {
        SubmitRequest {
            content_kind: ContentKind::Post,
            content_id: "p1".to_string(),
            kind: AppealKind::FalsePositive,
            reason: reason.to_string(),
            statement: statement.to_string(),
        }
    }

    #[test]
    fn test_reason_length_bounds() {
        assert!(validate(&req("too short", &"s".repeat(50))).is_err());
        assert!(validate(&req(&"r".repeat(10), &"s".repeat(50))).is_ok());
        assert!(validate(&req(&"r".repeat(201), &"s".repeat(50))).is_err());
    }

    #[test]
    fn test_statement_length_bounds() {
        assert!(validate(&req(&"r".repeat(20), "short statement")).is_err());
        assert!(validate(&req(&"r".repeat(20), &"s".repeat(20))).is_ok());
        assert!(validate(&req(&"r".repeat(20), &"s".repeat(2001))).is_err());
    }

    #[test]
    fn test_whitespace_does_not_count() {
        let padded = format!("   {}   ", "r".repeat(5));
        assert!(validate(&req(&padded, &"s".repeat(50))).is_err());
    }
}
