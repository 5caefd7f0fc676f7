//! In-memory repository implementations.
//!
//! Used by tests and local runs. Versioning and the unique-vote
//! constraint behave exactly like the SQLite implementation so tests
//! exercise the same concurrency semantics.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use tribunal_core::{AppealId, ContentRef, ReviewQueue, UserId};

use crate::appeal::record::{Appeal, AppealStatus};
use crate::audit::AuditRecord;
use crate::vote::Vote;

use super::{
    AppealRepository, AuditRepository, DecisionRecord, DecisionRepository, RepositoryError,
    Version, Versioned, VoteRepository,
};

#[derive(Default)]
pub struct InMemoryAppealRepository {
    appeals: RwLock<HashMap<AppealId, Versioned<Appeal>>>,
}

impl InMemoryAppealRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppealRepository for InMemoryAppealRepository {
    async fn get(&self, id: &AppealId) -> Result<Option<Versioned<Appeal>>, RepositoryError> {
        Ok(self
            .appeals
            .read()
            .expect("appeal lock poisoned")
            .get(id)
            .cloned())
    }

    async fn insert(&self, appeal: &Appeal) -> Result<Version, RepositoryError> {
        let mut appeals = self.appeals.write().expect("appeal lock poisoned");
        if appeals.contains_key(&appeal.id) {
            return Err(RepositoryError::storage(
                "insert appeal",
                format!("appeal {} already exists", appeal.id),
            ));
        }
        let version = Version(1);
        appeals.insert(
            appeal.id.clone(),
            Versioned {
                value: appeal.clone(),
                version,
            },
        );
        Ok(version)
    }

    async fn update(
        &self,
        appeal: &Appeal,
        expected: Version,
    ) -> Result<Version, RepositoryError> {
        let mut appeals = self.appeals.write().expect("appeal lock poisoned");
        let stored = appeals
            .get_mut(&appeal.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("appeal {}", appeal.id)))?;
        if stored.version != expected {
            return Err(RepositoryError::VersionMismatch(appeal.id.clone()));
        }
        stored.value = appeal.clone();
        stored.version = expected.next();
        Ok(stored.version)
    }

    async fn find_active_for_submitter(
        &self,
        content: &ContentRef,
        submitter: &UserId,
    ) -> Result<Option<Versioned<Appeal>>, RepositoryError> {
        Ok(self
            .appeals
            .read()
            .expect("appeal lock poisoned")
            .values()
            .find(|v| {
                v.value.content == *content
                    && v.value.submitter_id == *submitter
                    && v.value.status.is_open()
            })
            .cloned())
    }

    async fn list_open(
        &self,
        queue: ReviewQueue,
    ) -> Result<Vec<Versioned<Appeal>>, RepositoryError> {
        let mut open: Vec<_> = self
            .appeals
            .read()
            .expect("appeal lock poisoned")
            .values()
            .filter(|v| v.value.review_queue == queue && v.value.status.is_open())
            .cloned()
            .collect();
        open.sort_by_key(|v| v.value.created_at);
        Ok(open)
    }

    async fn list_by_submitter(
        &self,
        submitter: &UserId,
    ) -> Result<Vec<Versioned<Appeal>>, RepositoryError> {
        let mut mine: Vec<_> = self
            .appeals
            .read()
            .expect("appeal lock poisoned")
            .values()
            .filter(|v| v.value.submitter_id == *submitter)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.value.created_at.cmp(&a.value.created_at));
        Ok(mine)
    }

    async fn list(
        &self,
        status: Option<AppealStatus>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Versioned<Appeal>>, RepositoryError> {
        let mut all: Vec<_> = self
            .appeals
            .read()
            .expect("appeal lock poisoned")
            .values()
            .filter(|v| status.map_or(true, |s| v.value.status == s))
            .cloned()
            .collect();
        all.sort_by(|a, b| b.value.created_at.cmp(&a.value.created_at));
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }
}

#[derive(Default)]
pub struct InMemoryVoteRepository {
    votes: RwLock<Vec<Vote>>,
}

impl InMemoryVoteRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VoteRepository for InMemoryVoteRepository {
    async fn insert(&self, vote: &Vote) -> Result<(), RepositoryError> {
        let mut votes = self.votes.write().expect("vote lock poisoned");
        // Uniqueness is enforced under the same lock as the append.
        if votes
            .iter()
            .any(|v| v.appeal_id == vote.appeal_id && v.voter_id == vote.voter_id)
        {
            return Err(RepositoryError::DuplicateVote {
                appeal_id: vote.appeal_id.clone(),
                voter_id: vote.voter_id.clone(),
            });
        }
        votes.push(vote.clone());
        Ok(())
    }

    async fn list_for_appeal(&self, appeal_id: &AppealId) -> Result<Vec<Vote>, RepositoryError> {
        Ok(self
            .votes
            .read()
            .expect("vote lock poisoned")
            .iter()
            .filter(|v| v.appeal_id == *appeal_id)
            .cloned()
            .collect())
    }

    async fn find(
        &self,
        appeal_id: &AppealId,
        voter_id: &UserId,
    ) -> Result<Option<Vote>, RepositoryError> {
        Ok(self
            .votes
            .read()
            .expect("vote lock poisoned")
            .iter()
            .find(|v| v.appeal_id == *appeal_id && v.voter_id == *voter_id)
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryAuditRepository {
    records: RwLock<Vec<AuditRecord>>,
}

impl InMemoryAuditRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn append(&self, record: &AuditRecord) -> Result<(), RepositoryError> {
        self.records
            .write()
            .expect("audit lock poisoned")
            .push(record.clone());
        Ok(())
    }

    async fn list_for_subject(
        &self,
        subject_id: &str,
    ) -> Result<Vec<AuditRecord>, RepositoryError> {
        Ok(self
            .records
            .read()
            .expect("audit lock poisoned")
            .iter()
            .filter(|r| r.subject_id == subject_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryDecisionRepository {
    records: RwLock<Vec<DecisionRecord>>,
}

impl InMemoryDecisionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DecisionRepository for InMemoryDecisionRepository {
    async fn append(&self, record: &DecisionRecord) -> Result<(), RepositoryError> {
        self.records
            .write()
            .expect("decision lock poisoned")
            .push(record.clone());
        Ok(())
    }

    async fn list_for_content(
        &self,
        content_id: &str,
    ) -> Result<Vec<DecisionRecord>, RepositoryError> {
        Ok(self
            .records
            .read()
            .expect("decision lock poisoned")
            .iter()
            .filter(|r| r.content_id == content_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tribunal_core::{AppealKind, ContentKind, VoteChoice, VoteId, VotingConfig};

    use crate::appeal::record::new_appeal;

    fn appeal(content_id: &str, submitter: &str) -> Appeal {
        new_appeal(
            ContentRef::new(ContentKind::Post, content_id),
            UserId::from("owner"),
            UserId::from(submitter),
            AppealKind::FalsePositive,
            "wrongly flagged post".to_string(),
            "this post was removed by mistake and should be restored".to_string(),
            None,
            0,
            Utc::now(),
            &VotingConfig::default(),
        )
    }

    fn vote(appeal_id: &AppealId, voter: &str) -> Vote {
        Vote {
            id: VoteId::generate(),
            appeal_id: appeal_id.clone(),
            content_id: "p1".into(),
            voter_id: UserId::from(voter),
            choice: VoteChoice::Approve,
            reason: None,
            voter_reputation: 50,
            voter_account_age_days: 100,
            cast_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_starts_at_version_one() {
        let repo = InMemoryAppealRepository::new();
        let a = appeal("p1", "u1");
        assert_eq!(repo.insert(&a).await.unwrap(), Version(1));
        let stored = repo.get(&a.id).await.unwrap().unwrap();
        assert_eq!(stored.version, Version(1));
        assert_eq!(stored.value, a);
    }

    #[tokio::test]
    async fn test_update_with_stale_version_fails() {
        let repo = InMemoryAppealRepository::new();
        let mut a = appeal("p1", "u1");
        repo.insert(&a).await.unwrap();

        a.total_votes = 1;
        assert_eq!(repo.update(&a, Version(1)).await.unwrap(), Version(2));

        // A second writer holding the old snapshot loses.
        a.total_votes = 2;
        assert!(matches!(
            repo.update(&a, Version(1)).await,
            Err(RepositoryError::VersionMismatch(_))
        ));
    }

    #[tokio::test]
    async fn test_find_active_ignores_terminal_appeals() {
        let repo = InMemoryAppealRepository::new();
        let mut a = appeal("p1", "u1");
        repo.insert(&a).await.unwrap();

        let content = a.content.clone();
        let submitter = a.submitter_id.clone();
        assert!(repo
            .find_active_for_submitter(&content, &submitter)
            .await
            .unwrap()
            .is_some());

        a.status = AppealStatus::Rejected;
        repo.update(&a, Version(1)).await.unwrap();
        assert!(repo
            .find_active_for_submitter(&content, &submitter)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_open_filters_by_queue() {
        let repo = InMemoryAppealRepository::new();
        // Community appeal from a non-owner, admin appeal from the owner.
        repo.insert(&appeal("p1", "u1")).await.unwrap();
        repo.insert(&appeal("p2", "owner")).await.unwrap();

        let community = repo.list_open(ReviewQueue::Community).await.unwrap();
        assert_eq!(community.len(), 1);
        assert_eq!(community[0].value.content.id.to_string(), "p1");

        let admin = repo.list_open(ReviewQueue::Admin).await.unwrap();
        assert_eq!(admin.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_vote_is_rejected_at_storage() {
        let repo = InMemoryVoteRepository::new();
        let appeal_id = AppealId::generate();
        repo.insert(&vote(&appeal_id, "u1")).await.unwrap();
        assert!(matches!(
            repo.insert(&vote(&appeal_id, "u1")).await,
            Err(RepositoryError::DuplicateVote { .. })
        ));
        // Same voter on a different appeal is fine.
        repo.insert(&vote(&AppealId::generate(), "u1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let repo = InMemoryAppealRepository::new();
        for i in 0..5 {
            repo.insert(&appeal(&format!("p{i}"), "u1")).await.unwrap();
        }
        let page = repo.list(None, 2, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        let rest = repo.list(None, 4, 10).await.unwrap();
        assert_eq!(rest.len(), 1);
    }
}
