//! Append-only audit trail.
//!
//! Every state-changing operation writes an audit record after its
//! document write succeeds. Audit failures on the write path are real
//! failures: an action that cannot be audited is reported to the caller
//! as an error even though the document write already landed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use tribunal_core::{ActorRole, ReasonCode};

use crate::repository::{AuditRepository, RepositoryError};

/// The audited action kinds, one per state-changing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    AppealSubmit,
    VoteCast,
    AppealApprove,
    AppealReject,
    AppealTimeout,
    AppealExpire,
    AppealOverride,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AppealSubmit => "appeal_submit",
            Self::VoteCast => "vote_cast",
            Self::AppealApprove => "appeal_approve",
            Self::AppealReject => "appeal_reject",
            Self::AppealTimeout => "appeal_timeout",
            Self::AppealExpire => "appeal_expire",
            Self::AppealOverride => "appeal_override",
        };
        write!(f, "{s}")
    }
}

/// One immutable audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: String,
    pub action: AuditAction,
    pub actor_id: String,
    pub actor_role: ActorRole,
    /// The appeal id the action concerns.
    pub subject_id: String,
    /// What the action targeted, e.g. "post:post-1".
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<ReasonCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Relevant appeal fields before the mutation.
    pub before: serde_json::Value,
    /// The same fields after the mutation.
    pub after: serde_json::Value,
    /// Correlates all records from one request or tally pass.
    pub correlation_id: String,
    pub recorded_at: DateTime<Utc>,
}

/// Builds and appends audit records.
#[derive(Clone)]
pub struct AuditRecorder {
    repo: Arc<dyn AuditRepository>,
}

impl AuditRecorder {
    pub fn new(repo: Arc<dyn AuditRepository>) -> Self {
        Self { repo }
    }

    pub fn new_correlation_id() -> String {
        format!("corr_{}", Uuid::new_v4())
    }

    /// Append one record. Errors propagate: the caller decides whether
    /// the surrounding operation fails with it.
    #[allow(clippy::too_many_arguments)]
    pub async fn record(
        &self,
        action: AuditAction,
        actor_id: &str,
        actor_role: ActorRole,
        subject_id: &str,
        target: &str,
        reason_code: Option<ReasonCode>,
        note: Option<String>,
        before: serde_json::Value,
        after: serde_json::Value,
        correlation_id: &str,
    ) -> Result<(), RepositoryError> {
        let record = AuditRecord {
            id: format!("audit_{}", Uuid::new_v4()),
            action,
            actor_id: actor_id.to_string(),
            actor_role,
            subject_id: subject_id.to_string(),
            target: target.to_string(),
            reason_code,
            note,
            before,
            after,
            correlation_id: correlation_id.to_string(),
            recorded_at: Utc::now(),
        };
        self.repo.append(&record).await?;
        tracing::debug!(
            action = %record.action,
            subject = %record.subject_id,
            actor = %record.actor_id,
            "audit record appended"
        );
        Ok(())
    }

    pub async fn list_for_subject(
        &self,
        subject_id: &str,
    ) -> Result<Vec<AuditRecord>, RepositoryError> {
        self.repo.list_for_subject(subject_id).await
    }
}
