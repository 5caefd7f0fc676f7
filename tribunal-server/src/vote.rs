//! Vote collection.
//!
//! Votes are an append-only ledger; the counters on the appeal document
//! are denormalized from it after every write. On any disagreement the
//! ledger wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tribunal_core::{
    check_eligibility, evaluate, ActorRole, AppealId, ContentId, Outcome, ReviewQueue, UserId,
    VoteChoice, VoteId,
};

use crate::appeal::record::AppealStatus;
use crate::appeal::resolve::resolve_appeal;
use crate::audit::AuditAction;
use crate::error::AppealError;
use crate::rate_limit::ActionClass;
use crate::repository::RepositoryError;
use crate::AppState;

/// One immutable vote record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: VoteId,
    pub appeal_id: AppealId,
    pub content_id: ContentId,
    pub voter_id: UserId,
    pub choice: VoteChoice,
    /// Optional free-text rationale supplied with the vote.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Voter standing as observed at cast time, kept for audit.
    pub voter_reputation: i64,
    pub voter_account_age_days: i64,
    pub cast_at: DateTime<Utc>,
}

/// What the caller learns after a successful vote.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub vote_id: VoteId,
    pub appeal_id: AppealId,
    pub choice: VoteChoice,
    pub votes_for: usize,
    pub votes_against: usize,
    pub total_votes: usize,
    pub required_votes: usize,
    pub quorum_reached: bool,
    pub appeal_status: AppealStatus,
}

/// Cast a vote on an appeal.
///
/// Guard order: appeal state, expiry, queue, eligibility, rate limit,
/// then the duplicate check. The storage-level unique constraint on
/// (appeal, voter) is the real duplicate guard; the read-first check
/// only exists to return the earlier vote's details.
pub async fn cast_vote(
    state: &AppState,
    appeal_id: &AppealId,
    voter: &UserId,
    choice: VoteChoice,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<VoteReceipt, AppealError> {
    let current = state
        .appeals
        .get(appeal_id)
        .await?
        .ok_or(AppealError::NotFound("appeal"))?;
    let appeal = &current.value;

    if appeal.status != AppealStatus::Pending {
        return Err(AppealError::AppealNotVotable {
            reason: format!("appeal is {}", appeal.status),
        });
    }
    if now >= appeal.expires_at {
        return Err(AppealError::AppealExpired {
            expires_at: appeal.expires_at,
        });
    }
    if appeal.review_queue != ReviewQueue::Community {
        return Err(AppealError::AppealNotVotable {
            reason: "appeal is under admin review".to_string(),
        });
    }

    let profile = state
        .users
        .profile(voter)
        .await?
        .ok_or(AppealError::NotFound("user"))?;
    let eligibility = check_eligibility(
        voter,
        &appeal.content_owner_id,
        profile.created_at,
        profile.reputation_score,
        now,
        &state.voting,
    );
    if !eligibility.eligible {
        return Err(AppealError::NotEligible {
            reason: eligibility.reason,
        });
    }

    state
        .rate_limiter
        .check(voter, ActionClass::CastVote, now, &state.voting)?;

    if let Some(existing) = state.votes.find(appeal_id, voter).await? {
        return Err(AppealError::DuplicateVote {
            existing_choice: existing.choice,
            cast_at: existing.cast_at,
        });
    }

    let vote = Vote {
        id: VoteId::generate(),
        appeal_id: appeal_id.clone(),
        content_id: appeal.content.id.clone(),
        voter_id: voter.clone(),
        choice,
        reason,
        voter_reputation: profile.reputation_score,
        voter_account_age_days: (now - profile.created_at).num_days(),
        cast_at: now,
    };
    match state.votes.insert(&vote).await {
        Ok(()) => {}
        // Lost a race with the voter's own concurrent request.
        Err(RepositoryError::DuplicateVote { .. }) => {
            let existing = state
                .votes
                .find(appeal_id, voter)
                .await?
                .ok_or_else(|| RepositoryError::corruption("duplicate vote not found on re-read"))?;
            return Err(AppealError::DuplicateVote {
                existing_choice: existing.choice,
                cast_at: existing.cast_at,
            });
        }
        Err(e) => return Err(e.into()),
    }
    state.rate_limiter.record(voter, ActionClass::CastVote, now);

    let correlation_id = crate::audit::AuditRecorder::new_correlation_id();
    state
        .audit
        .record(
            AuditAction::VoteCast,
            &voter.to_string(),
            ActorRole::Community,
            &appeal_id.to_string(),
            &appeal.content.to_string(),
            None,
            None,
            appeal.audit_snapshot(),
            serde_json::json!({ "choice": choice }),
            &correlation_id,
        )
        .await?;

    // Recompute counters from the full ledger rather than incrementing,
    // so concurrent voters converge on the true counts.
    let ledger = state.votes.list_for_appeal(appeal_id).await?;
    let choices: Vec<VoteChoice> = ledger.iter().map(|v| v.choice).collect();
    let evaluation = evaluate(&choices, appeal.created_at, now, &state.voting);

    let mut receipt = VoteReceipt {
        vote_id: vote.id.clone(),
        appeal_id: appeal_id.clone(),
        choice,
        votes_for: evaluation.tally.approve,
        votes_against: evaluation.tally.reject,
        total_votes: evaluation.tally.total(),
        required_votes: appeal.required_votes,
        quorum_reached: evaluation.quorum_met,
        appeal_status: appeal.status,
    };

    if evaluation.outcome.is_ready() {
        // Quorum (or the window edge) hit on this vote: move to
        // tallying, then resolve synchronously. A lost race at either
        // step means another writer is resolving; the vote itself stood.
        match advance_and_resolve(state, appeal_id, evaluation.outcome, &correlation_id, now).await
        {
            Ok(status) => receipt.appeal_status = status,
            Err(AppealError::InvalidTransition { from, .. }) => {
                tracing::debug!(appeal = %appeal_id, status = %from, "lost resolution race");
                receipt.appeal_status = from;
            }
            Err(e) => return Err(e),
        }
    } else {
        // Below quorum: refresh the denormalized counters. Retried once
        // on a version race, then left for the next writer; the ledger
        // stays authoritative either way.
        if let Err(e) = refresh_counters(state, appeal_id, &evaluation.tally).await {
            tracing::warn!(appeal = %appeal_id, error = %e, "counter refresh skipped");
        }
    }

    tracing::info!(
        appeal = %appeal_id,
        voter = %voter,
        choice = %choice,
        total = receipt.total_votes,
        "vote recorded"
    );

    Ok(receipt)
}

async fn advance_and_resolve(
    state: &AppState,
    appeal_id: &AppealId,
    outcome: Outcome,
    correlation_id: &str,
    now: DateTime<Utc>,
) -> Result<AppealStatus, AppealError> {
    let current = state
        .appeals
        .get(appeal_id)
        .await?
        .ok_or(AppealError::NotFound("appeal"))?;
    if current.value.status != AppealStatus::Pending {
        return Ok(current.value.status);
    }

    let mut tallying = current.value.clone();
    tallying.status = AppealStatus::Tallying;
    let version = match state.appeals.update(&tallying, current.version).await {
        Ok(v) => v,
        Err(RepositoryError::VersionMismatch(_)) => {
            return Err(AppealError::InvalidTransition {
                from: current.value.status,
                to: AppealStatus::Tallying,
            })
        }
        Err(e) => return Err(e.into()),
    };

    // Re-read the ledger under tallying so the resolution reflects any
    // vote that slipped in between.
    let ledger = state.votes.list_for_appeal(appeal_id).await?;
    let choices: Vec<VoteChoice> = ledger.iter().map(|v| v.choice).collect();
    let evaluation = evaluate(&choices, tallying.created_at, now, &state.voting);
    let final_outcome = if evaluation.outcome.is_ready() {
        evaluation.outcome
    } else {
        outcome
    };

    let resolved = resolve_appeal(
        state,
        &crate::repository::Versioned {
            value: tallying,
            version,
        },
        final_outcome,
        evaluation.tally,
        ActorRole::Community,
        correlation_id,
        now,
    )
    .await?;
    Ok(resolved.status)
}

async fn refresh_counters(
    state: &AppState,
    appeal_id: &AppealId,
    tally: &tribunal_core::VoteTally,
) -> Result<(), AppealError> {
    for _ in 0..2 {
        let current = state
            .appeals
            .get(appeal_id)
            .await?
            .ok_or(AppealError::NotFound("appeal"))?;
        if !current.value.status.is_open() {
            return Ok(());
        }
        let mut updated = current.value.clone();
        updated.votes_for = tally.approve;
        updated.votes_against = tally.reject;
        updated.total_votes = tally.total();
        match state.appeals.update(&updated, current.version).await {
            Ok(_) => return Ok(()),
            Err(RepositoryError::VersionMismatch(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
