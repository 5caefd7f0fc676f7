//! Moderator override.
//!
//! A moderator may preempt community voting at any point before the
//! appeal is terminal. The operation is idempotent under a caller
//! idempotency key: replaying the same key with the same decision
//! returns the already-overridden appeal instead of failing.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use tribunal_core::{ActorRole, AppealId, Decision, ReasonCode, UserId};

use crate::appeal::record::{Appeal, AppealStatus};
use crate::audit::AuditAction;
use crate::error::AppealError;
use crate::repository::{DecisionRecord, RepositoryError};
use crate::AppState;

/// The override request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideRequest {
    pub decision: Decision,
    pub reason_code: ReasonCode,
    #[serde(default)]
    pub reason_note: Option<String>,
}

/// What an override attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideApplied {
    /// The override was applied by this request.
    Fresh,
    /// The same key and decision had already been applied; nothing
    /// changed.
    Replay,
}

/// Apply (or replay) a moderator override.
pub async fn override_appeal(
    state: &AppState,
    appeal_id: &AppealId,
    moderator: &UserId,
    idempotency_key: &str,
    req: OverrideRequest,
    now: DateTime<Utc>,
) -> Result<(Appeal, OverrideApplied), AppealError> {
    if idempotency_key.trim().is_empty() {
        return Err(AppealError::Validation(
            "Idempotency-Key header is required".to_string(),
        ));
    }
    if let Some(note) = &req.reason_note {
        if note.chars().count() > 1000 {
            return Err(AppealError::Validation(
                "reasonNote must be at most 1000 characters".to_string(),
            ));
        }
    }

    let current = state
        .appeals
        .get(appeal_id)
        .await?
        .ok_or(AppealError::NotFound("appeal"))?;
    let appeal = &current.value;

    if appeal.status == AppealStatus::Overridden {
        // Replay: same decision, and either a matching key or none
        // stored on the original write.
        let key_matches = match appeal.override_idempotency_key.as_deref() {
            Some(stored) => stored == idempotency_key,
            None => true,
        };
        if key_matches && appeal.final_decision == Some(req.decision) {
            return Ok((appeal.clone(), OverrideApplied::Replay));
        }
        return Err(AppealError::AlreadyOverridden);
    }
    if appeal.status.is_terminal() {
        return Err(AppealError::OverrideNotAllowed {
            status: appeal.status,
        });
    }

    // A pending appeal can always be overridden. One already in
    // tallying may only be short-circuited while it is undecided at
    // quorum; the counters can lag the ledger, so quorum is checked
    // against the ledger itself.
    if appeal.status == AppealStatus::Tallying {
        let votes = state.votes.list_for_appeal(appeal_id).await?;
        let quorum_reached = votes.len() >= appeal.required_votes;
        if !quorum_reached || appeal.final_decision.is_some() {
            return Err(AppealError::OverrideNotAllowed {
                status: appeal.status,
            });
        }
    }

    let before = appeal.audit_snapshot();
    let mut updated = appeal.clone();
    updated.status = AppealStatus::Overridden;
    updated.final_decision = Some(req.decision);
    updated.resolved_at = Some(now);
    updated.resolved_by = Some(moderator.to_string());
    updated.decision_reason_code = Some(req.reason_code);
    updated.decision_note = req.reason_note.clone();
    updated.override_idempotency_key = Some(idempotency_key.to_string());

    match state.appeals.update(&updated, current.version).await {
        Ok(_) => {}
        // A voter, the tally job, or another moderator won the race.
        Err(RepositoryError::VersionMismatch(_)) => return Err(AppealError::OverrideConflict),
        Err(e) => return Err(e.into()),
    }

    tracing::info!(
        appeal = %appeal_id,
        moderator = %moderator,
        decision = %req.decision,
        reason = %req.reason_code,
        "appeal overridden"
    );

    state
        .content
        .apply_decision(&updated.content, req.decision, appeal_id)
        .await?;
    state
        .decisions
        .append(&DecisionRecord {
            id: format!("decision_{}", Uuid::new_v4()),
            appeal_id: appeal_id.clone(),
            content_id: updated.content.id.to_string(),
            decision: req.decision,
            source: "moderator_override".to_string(),
            actor_role: ActorRole::Moderator,
            decided_by: moderator.to_string(),
            reason_code: Some(req.reason_code),
            votes_for: updated.votes_for,
            votes_against: updated.votes_against,
            decided_at: now,
        })
        .await?;

    let correlation_id = crate::audit::AuditRecorder::new_correlation_id();
    state
        .audit
        .record(
            AuditAction::AppealOverride,
            &moderator.to_string(),
            ActorRole::Moderator,
            &appeal_id.to_string(),
            &updated.content.to_string(),
            Some(req.reason_code),
            req.reason_note,
            before,
            updated.audit_snapshot(),
            &correlation_id,
        )
        .await?;

    Ok((updated, OverrideApplied::Fresh))
}
