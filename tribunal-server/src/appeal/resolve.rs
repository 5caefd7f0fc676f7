//! Applying a resolution to an appeal.
//!
//! All resolution paths (synchronous after a quorum vote, the periodic
//! tally pass, and expiry) funnel through this module so the write
//! order is identical everywhere:
//!
//! 1. version-preconditioned appeal update (the commit point);
//! 2. content patch (skipped for timeout and expiry);
//! 3. decision record;
//! 4. audit record.
//!
//! Only step 1 is guarded against concurrent writers. If it succeeds,
//! this process owns the resolution; later steps are applied once and
//! their failures surface as errors rather than rolling anything back.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use tribunal_core::{ActorRole, Decision, Outcome, VoteTally};

use crate::appeal::record::{Appeal, AppealStatus};
use crate::audit::AuditAction;
use crate::error::AppealError;
use crate::repository::{DecisionRecord, RepositoryError, Version, Versioned};
use crate::AppState;

/// Map a ready evaluator outcome to the target status and decision.
fn resolution_of(outcome: Outcome) -> Option<(AppealStatus, Decision, AuditAction)> {
    match outcome {
        Outcome::Approved => Some((AppealStatus::Approved, Decision::Allow, AuditAction::AppealApprove)),
        Outcome::Rejected => Some((AppealStatus::Rejected, Decision::Block, AuditAction::AppealReject)),
        Outcome::Timeout => Some((AppealStatus::Rejected, Decision::Block, AuditAction::AppealTimeout)),
        Outcome::Pending => None,
    }
}

/// Resolve an appeal per the evaluator's outcome.
///
/// `outcome` must be ready (not `Pending`). The version precondition
/// makes this safe to call from both the vote path and the tally job:
/// whichever caller commits first wins, the other gets
/// `InvalidTransition` and should treat the appeal as already handled.
pub async fn resolve_appeal(
    state: &AppState,
    current: &Versioned<Appeal>,
    outcome: Outcome,
    tally: VoteTally,
    actor_role: ActorRole,
    correlation_id: &str,
    now: DateTime<Utc>,
) -> Result<Appeal, AppealError> {
    let (target, decision, action) = resolution_of(outcome)
        .ok_or_else(|| AppealError::Validation("cannot resolve a pending outcome".to_string()))?;

    let appeal = &current.value;
    appeal.status.check_transition(target)?;

    let before = appeal.audit_snapshot();
    let mut updated = appeal.clone();
    updated.status = target;
    updated.final_decision = Some(decision);
    updated.votes_for = tally.approve;
    updated.votes_against = tally.reject;
    updated.total_votes = tally.total();
    updated.resolved_at = Some(now);
    updated.resolved_by = Some(actor_role.to_string());

    commit(state, &updated, current.version).await?;

    tracing::info!(
        appeal = %updated.id,
        status = %target,
        votes_for = tally.approve,
        votes_against = tally.reject,
        "appeal resolved"
    );

    // Timeout leaves the content untouched: it was hidden before the
    // appeal and stays hidden.
    if outcome != Outcome::Timeout {
        state
            .content
            .apply_decision(&updated.content, decision, &updated.id)
            .await?;
        state
            .decisions
            .append(&DecisionRecord {
                id: format!("decision_{}", Uuid::new_v4()),
                appeal_id: updated.id.clone(),
                content_id: updated.content.id.to_string(),
                decision,
                source: "community_vote".to_string(),
                actor_role,
                decided_by: actor_role.to_string(),
                reason_code: None,
                votes_for: tally.approve,
                votes_against: tally.reject,
                decided_at: now,
            })
            .await?;
    }

    state
        .audit
        .record(
            action,
            "system",
            actor_role,
            &updated.id.to_string(),
            &updated.content.to_string(),
            None,
            None,
            before,
            updated.audit_snapshot(),
            correlation_id,
        )
        .await?;

    Ok(updated)
}

/// Expire an appeal that outlived its 30-day lifetime unresolved.
///
/// Expiry is terminal but carries no decision: the content keeps
/// whatever moderation status it already has.
pub async fn expire_appeal(
    state: &AppState,
    current: &Versioned<Appeal>,
    correlation_id: &str,
    now: DateTime<Utc>,
) -> Result<Appeal, AppealError> {
    let appeal = &current.value;
    appeal.status.check_transition(AppealStatus::Expired)?;

    let before = appeal.audit_snapshot();
    let mut updated = appeal.clone();
    updated.status = AppealStatus::Expired;
    updated.final_decision = None;
    updated.resolved_at = Some(now);
    updated.resolved_by = Some(ActorRole::System.to_string());

    commit(state, &updated, current.version).await?;

    tracing::info!(appeal = %updated.id, "appeal expired");

    state
        .audit
        .record(
            AuditAction::AppealExpire,
            "system",
            ActorRole::System,
            &updated.id.to_string(),
            &updated.content.to_string(),
            None,
            None,
            before,
            updated.audit_snapshot(),
            correlation_id,
        )
        .await?;

    Ok(updated)
}

/// The preconditioned write. A lost race surfaces as `InvalidTransition`
/// from the freshly observed state, which tells the caller the appeal
/// already moved on.
async fn commit(
    state: &AppState,
    updated: &Appeal,
    expected: Version,
) -> Result<(), AppealError> {
    match state.appeals.update(updated, expected).await {
        Ok(_) => Ok(()),
        Err(RepositoryError::VersionMismatch(_)) => {
            let from = match state.appeals.get(&updated.id).await? {
                Some(fresh) => fresh.value.status,
                None => return Err(AppealError::NotFound("appeal")),
            };
            Err(AppealError::InvalidTransition {
                from,
                to: updated.status,
            })
        }
        Err(e) => Err(e.into()),
    }
}
