//! The periodic tally job.
//!
//! Votes resolve most appeals synchronously; this job is the backstop
//! that catches everything else: windows that elapsed without quorum,
//! appeals stuck in `tallying` after a crashed resolver, and the 30-day
//! expiry sweep. It only scans the community queue; admin-queue appeals
//! resolve by moderator override.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use tribunal_core::{evaluate, ActorRole, ReviewQueue, VoteChoice};

use crate::appeal::resolve::{expire_appeal, resolve_appeal};
use crate::audit::AuditRecorder;
use crate::error::AppealError;
use crate::AppState;

const TALLY_INTERVAL: Duration = Duration::from_secs(120);

/// What one tally pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TallySummary {
    pub scanned: usize,
    pub resolved: usize,
    pub expired: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Run the tally job until the process stops.
pub async fn tally_loop(state: Arc<AppState>) {
    let mut ticker = tokio::time::interval(TALLY_INTERVAL);
    loop {
        ticker.tick().await;
        match run_tally_pass(&state).await {
            Ok(summary) => {
                if summary.scanned > 0 {
                    tracing::info!(
                        scanned = summary.scanned,
                        resolved = summary.resolved,
                        expired = summary.expired,
                        skipped = summary.skipped,
                        failed = summary.failed,
                        "tally pass complete"
                    );
                }
            }
            Err(e) => tracing::error!(error = %e, "tally pass failed"),
        }
    }
}

/// One sweep over the open community appeals.
///
/// Each appeal is handled independently: one failure is logged and
/// counted, never aborting the pass.
pub async fn run_tally_pass(state: &AppState) -> Result<TallySummary, AppealError> {
    let open = state.appeals.list_open(ReviewQueue::Community).await?;
    let correlation_id = AuditRecorder::new_correlation_id();
    let mut summary = TallySummary {
        scanned: open.len(),
        ..TallySummary::default()
    };

    for current in open {
        let appeal_id = current.value.id.clone();
        match tally_one(state, &current, &correlation_id).await {
            Ok(TallyAction::Resolved) => summary.resolved += 1,
            Ok(TallyAction::Expired) => summary.expired += 1,
            Ok(TallyAction::Skipped) => summary.skipped += 1,
            Err(AppealError::InvalidTransition { .. }) => {
                // Another writer resolved it mid-pass.
                summary.skipped += 1;
            }
            Err(e) => {
                summary.failed += 1;
                tracing::error!(appeal = %appeal_id, error = %e, "tally failed for appeal");
            }
        }
    }

    Ok(summary)
}

enum TallyAction {
    Resolved,
    Expired,
    Skipped,
}

async fn tally_one(
    state: &AppState,
    current: &crate::repository::Versioned<crate::appeal::record::Appeal>,
    correlation_id: &str,
) -> Result<TallyAction, AppealError> {
    let now = Utc::now();
    let appeal = &current.value;

    // Expiry takes precedence over any pending tally.
    if now >= appeal.expires_at {
        expire_appeal(state, current, correlation_id, now).await?;
        return Ok(TallyAction::Expired);
    }

    let ledger = state.votes.list_for_appeal(&appeal.id).await?;
    let choices: Vec<VoteChoice> = ledger.iter().map(|v| v.choice).collect();
    let evaluation = evaluate(&choices, appeal.created_at, now, &state.voting);
    if !evaluation.outcome.is_ready() {
        return Ok(TallyAction::Skipped);
    }

    resolve_appeal(
        state,
        current,
        evaluation.outcome,
        evaluation.tally,
        ActorRole::System,
        correlation_id,
        now,
    )
    .await?;
    Ok(TallyAction::Resolved)
}
