//! Content documents and the moderation patch applied when an appeal
//! resolves.
//!
//! Content lives in a different partition from appeals, so a resolution
//! is two single-document writes (appeal, then content) rather than a
//! transaction. The content patch is deliberately tiny: status plus a
//! pointer back to the appeal.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use tribunal_core::{AppealId, ContentRef, Decision, UserId};

use crate::repository::RepositoryError;

/// Moderation status of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Published,
    Blocked,
    HiddenPendingReview,
    HiddenConfirmed,
}

impl ContentStatus {
    /// Only content currently under an adverse moderation decision can
    /// be appealed.
    pub fn is_appealable(self) -> bool {
        matches!(
            self,
            Self::Blocked | Self::HiddenPendingReview | Self::HiddenConfirmed
        )
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Published => "published",
            Self::Blocked => "blocked",
            Self::HiddenPendingReview => "hidden_pending_review",
            Self::HiddenConfirmed => "hidden_confirmed",
        };
        write!(f, "{s}")
    }
}

/// The slice of a content document the appeal engine needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDoc {
    #[serde(flatten)]
    pub content: ContentRef,
    pub owner_id: UserId,
    pub status: ContentStatus,
    pub body: String,
    pub flag_count: u32,
    /// When the adverse moderation decision was made. Anchors the
    /// 30-day appeal window.
    pub moderated_at: Option<DateTime<Utc>>,
    /// Live appeal on this content, if any.
    pub appeal_id: Option<AppealId>,
}

impl ContentDoc {
    /// First 200 characters, captured on the appeal at submission.
    pub fn preview(&self) -> String {
        self.body.chars().take(200).collect()
    }
}

/// Gateway to the content partition.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn read(&self, content: &ContentRef) -> Result<Option<ContentDoc>, RepositoryError>;

    /// Patch the content's moderation status per a resolved decision:
    /// `Allow` republishes, `Block` confirms the hide.
    async fn apply_decision(
        &self,
        content: &ContentRef,
        decision: Decision,
        appeal_id: &AppealId,
    ) -> Result<(), RepositoryError>;

    /// Point the content document at its live appeal. Best-effort from
    /// the caller's perspective.
    async fn link_appeal(
        &self,
        content: &ContentRef,
        appeal_id: &AppealId,
    ) -> Result<(), RepositoryError>;
}

/// In-memory content store, used in tests and local runs.
#[derive(Default)]
pub struct InMemoryContentStore {
    docs: RwLock<HashMap<ContentRef, ContentDoc>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, doc: ContentDoc) {
        self.docs
            .write()
            .expect("content lock poisoned")
            .insert(doc.content.clone(), doc);
    }

    pub fn get(&self, content: &ContentRef) -> Option<ContentDoc> {
        self.docs
            .read()
            .expect("content lock poisoned")
            .get(content)
            .cloned()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn read(&self, content: &ContentRef) -> Result<Option<ContentDoc>, RepositoryError> {
        Ok(self.get(content))
    }

    async fn apply_decision(
        &self,
        content: &ContentRef,
        decision: Decision,
        appeal_id: &AppealId,
    ) -> Result<(), RepositoryError> {
        let mut docs = self.docs.write().expect("content lock poisoned");
        let doc = docs
            .get_mut(content)
            .ok_or_else(|| RepositoryError::NotFound(format!("content {content}")))?;
        doc.status = match decision {
            Decision::Allow => ContentStatus::Published,
            Decision::Block => ContentStatus::HiddenConfirmed,
        };
        doc.appeal_id = Some(appeal_id.clone());
        Ok(())
    }

    async fn link_appeal(
        &self,
        content: &ContentRef,
        appeal_id: &AppealId,
    ) -> Result<(), RepositoryError> {
        let mut docs = self.docs.write().expect("content lock poisoned");
        let doc = docs
            .get_mut(content)
            .ok_or_else(|| RepositoryError::NotFound(format!("content {content}")))?;
        doc.appeal_id = Some(appeal_id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tribunal_core::ContentKind;

    fn doc(status: ContentStatus) -> ContentDoc {
        ContentDoc {
            content: ContentRef::new(ContentKind::Post, "p1"),
            owner_id: UserId::from("owner"),
            status,
            body: "x".repeat(500),
            flag_count: 2,
            moderated_at: Some(Utc::now()),
            appeal_id: None,
        }
    }

    #[test]
    fn test_appealable_statuses() {
        assert!(ContentStatus::Blocked.is_appealable());
        assert!(ContentStatus::HiddenPendingReview.is_appealable());
        assert!(ContentStatus::HiddenConfirmed.is_appealable());
        assert!(!ContentStatus::Published.is_appealable());
    }

    #[test]
    fn test_preview_truncates_to_200_chars() {
        assert_eq!(doc(ContentStatus::Blocked).preview().chars().count(), 200);
    }

    #[tokio::test]
    async fn test_allow_decision_republishes() {
        let store = InMemoryContentStore::new();
        let d = doc(ContentStatus::Blocked);
        let content = d.content.clone();
        store.put(d);

        let appeal_id = AppealId::from("appeal_x");
        store
            .apply_decision(&content, Decision::Allow, &appeal_id)
            .await
            .unwrap();
        let after = store.get(&content).unwrap();
        assert_eq!(after.status, ContentStatus::Published);
        assert_eq!(after.appeal_id, Some(appeal_id));
    }

    #[tokio::test]
    async fn test_block_decision_confirms_hide() {
        let store = InMemoryContentStore::new();
        let d = doc(ContentStatus::HiddenPendingReview);
        let content = d.content.clone();
        store.put(d);

        store
            .apply_decision(&content, Decision::Block, &AppealId::from("appeal_x"))
            .await
            .unwrap();
        assert_eq!(
            store.get(&content).unwrap().status,
            ContentStatus::HiddenConfirmed
        );
    }
}
