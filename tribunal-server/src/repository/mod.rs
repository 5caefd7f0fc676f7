//! Persistence traits for appeals, votes, audit records, and decision
//! records.
//!
//! The store is document-shaped and eventually consistent across
//! partitions, so nothing here assumes cross-document transactions.
//! Single-document writes go through a version precondition instead:
//! every appeal carries a monotonically increasing version, and
//! `update` only succeeds when the caller's snapshot is still current.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use tribunal_core::{AppealId, ContentRef, ReviewQueue, UserId};

use crate::appeal::record::{Appeal, AppealStatus};
use crate::audit::AuditRecord;
use crate::vote::Vote;

pub mod memory;
pub mod sqlite;

/// Monotonic document version used as a write precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(pub i64);

impl Version {
    pub fn next(self) -> Version {
        Version(self.0 + 1)
    }
}

/// A document together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: Version,
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage error during {operation}: {message}")]
    Storage { operation: String, message: String },

    #[error("data corruption: {0}")]
    Corruption(String),

    /// The version precondition failed: another writer got there first.
    #[error("version precondition failed for {0}")]
    VersionMismatch(AppealId),

    /// Unique-vote constraint violated: this voter already voted on
    /// this appeal.
    #[error("duplicate vote by {voter_id} on {appeal_id}")]
    DuplicateVote {
        appeal_id: AppealId,
        voter_id: UserId,
    },

    #[error("{0} not found")]
    NotFound(String),
}

impl RepositoryError {
    pub fn storage(operation: &str, message: impl std::fmt::Display) -> Self {
        Self::Storage {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }

    pub fn corruption(what: impl std::fmt::Display) -> Self {
        Self::Corruption(what.to_string())
    }
}

/// Appeal documents, versioned for optimistic concurrency.
#[async_trait]
pub trait AppealRepository: Send + Sync {
    /// Fetch an appeal with its current version.
    async fn get(&self, id: &AppealId) -> Result<Option<Versioned<Appeal>>, RepositoryError>;

    /// Insert a brand-new appeal at version 1.
    async fn insert(&self, appeal: &Appeal) -> Result<Version, RepositoryError>;

    /// Replace an appeal iff its stored version still equals `expected`.
    ///
    /// Returns the new version, or `VersionMismatch` if a concurrent
    /// writer changed the document since the caller read it.
    async fn update(
        &self,
        appeal: &Appeal,
        expected: Version,
    ) -> Result<Version, RepositoryError>;

    /// Find a non-terminal appeal for `content` submitted by
    /// `submitter`, if one exists. Backs the duplicate-appeal guard.
    async fn find_active_for_submitter(
        &self,
        content: &ContentRef,
        submitter: &UserId,
    ) -> Result<Option<Versioned<Appeal>>, RepositoryError>;

    /// All open (pending/tallying) appeals in the given queue. The
    /// tally job scans this.
    async fn list_open(
        &self,
        queue: ReviewQueue,
    ) -> Result<Vec<Versioned<Appeal>>, RepositoryError>;

    /// Appeals submitted by one user, newest first.
    async fn list_by_submitter(
        &self,
        submitter: &UserId,
    ) -> Result<Vec<Versioned<Appeal>>, RepositoryError>;

    /// Review listing: optional status filter, newest first, paginated
    /// by offset cursor.
    async fn list(
        &self,
        status: Option<AppealStatus>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Versioned<Appeal>>, RepositoryError>;
}

/// The append-only vote ledger. A vote, once recorded, is never updated
/// or deleted.
#[async_trait]
pub trait VoteRepository: Send + Sync {
    /// Record a vote. Fails with `DuplicateVote` if this voter already
    /// voted on this appeal; the (appeal, voter) pair is unique at the
    /// storage layer, not just checked first.
    async fn insert(&self, vote: &Vote) -> Result<(), RepositoryError>;

    /// Every vote cast on an appeal, in cast order.
    async fn list_for_appeal(&self, appeal_id: &AppealId) -> Result<Vec<Vote>, RepositoryError>;

    /// This voter's vote on this appeal, if any.
    async fn find(
        &self,
        appeal_id: &AppealId,
        voter_id: &UserId,
    ) -> Result<Option<Vote>, RepositoryError>;
}

/// Append-only audit trail.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append(&self, record: &AuditRecord) -> Result<(), RepositoryError>;

    /// Audit records for one subject (appeal), oldest first.
    async fn list_for_subject(
        &self,
        subject_id: &str,
    ) -> Result<Vec<AuditRecord>, RepositoryError>;
}

/// Moderation decision records produced when an appeal resolves with a
/// decision. Append-only; read by downstream moderation tooling.
#[async_trait]
pub trait DecisionRepository: Send + Sync {
    async fn append(&self, record: &DecisionRecord) -> Result<(), RepositoryError>;

    async fn list_for_content(
        &self,
        content_id: &str,
    ) -> Result<Vec<DecisionRecord>, RepositoryError>;
}

/// A resolved moderation decision, written alongside the content patch.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRecord {
    pub id: String,
    pub appeal_id: AppealId,
    pub content_id: String,
    pub decision: tribunal_core::Decision,
    /// "community_vote" or "moderator_override".
    pub source: String,
    pub actor_role: tribunal_core::ActorRole,
    pub decided_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<tribunal_core::ReasonCode>,
    pub votes_for: usize,
    pub votes_against: usize,
    pub decided_at: DateTime<Utc>,
}
