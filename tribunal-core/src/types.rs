//! Identifier newtypes and shared enums.
//!
//! Following the principle of "make illegal states unrepresentable",
//! every identifier gets its own newtype so an appeal id can never be
//! passed where a voter id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Newtype for an appeal document id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppealId(pub String);

impl AppealId {
    pub fn generate() -> Self {
        Self(format!("appeal_{}", Uuid::new_v4()))
    }
}

impl fmt::Display for AppealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AppealId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Newtype for a content item id (post, comment, or user document).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub String);

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Newtype for a user id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Newtype for a vote record id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteId(pub String);

impl VoteId {
    pub fn generate() -> Self {
        Self(format!("vote_{}", Uuid::new_v4()))
    }
}

impl fmt::Display for VoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of content an appeal targets.
///
/// Each kind lives in a different container and has different business
/// rules (user appeals never go to community voting, for example), so
/// the kind is resolved once at the boundary and carried explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Post,
    Comment,
    User,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Post => write!(f, "post"),
            Self::Comment => write!(f, "comment"),
            Self::User => write!(f, "user"),
        }
    }
}

/// A fully qualified reference to a content item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    pub kind: ContentKind,
    pub id: ContentId,
}

impl ContentRef {
    pub fn new(kind: ContentKind, id: impl Into<ContentId>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl From<String> for ContentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// A community member's vote on an appeal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Approve,
    Reject,
}

impl fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// The terminal decision applied to the appealed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Restore the content to public visibility.
    Allow,
    /// Keep (or make) the content hidden.
    Block,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Block => write!(f, "block"),
        }
    }
}

/// Which queue reviews this appeal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewQueue {
    Admin,
    Community,
}

impl fmt::Display for ReviewQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Community => write!(f, "community"),
        }
    }
}

/// Why the submitter believes the moderation decision was wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealKind {
    FalsePositive,
    ContextMissing,
    PolicyDisagreement,
    TechnicalError,
    Other,
}

impl AppealKind {
    /// Base urgency contribution per appeal kind. A likely false
    /// positive is reviewed ahead of a policy disagreement.
    pub fn base_urgency(self) -> u8 {
        match self {
            Self::FalsePositive => 8,
            Self::TechnicalError => 7,
            Self::ContextMissing => 6,
            Self::PolicyDisagreement => 4,
            Self::Other => 3,
        }
    }
}

/// Reason code recorded with a moderator override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    PolicyException,
    FalsePositive,
    SafetyRisk,
    Other,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PolicyException => write!(f, "policy_exception"),
            Self::FalsePositive => write!(f, "false_positive"),
            Self::SafetyRisk => write!(f, "safety_risk"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Who performed an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    System,
    Community,
    Moderator,
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Community => write!(f, "community"),
            Self::Moderator => write!(f, "moderator"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_prefixed() {
        assert!(AppealId::generate().0.starts_with("appeal_"));
        assert!(VoteId::generate().0.starts_with("vote_"));
    }

    #[test]
    fn test_content_ref_display() {
        let r = ContentRef::new(ContentKind::Post, "post-1");
        assert_eq!(r.to_string(), "post:post-1");
    }

    #[test]
    fn test_appeal_kind_urgency_ordering() {
        // A suspected false positive outranks everything else.
        assert!(AppealKind::FalsePositive.base_urgency() > AppealKind::TechnicalError.base_urgency());
        assert!(AppealKind::PolicyDisagreement.base_urgency() > AppealKind::Other.base_urgency());
    }

    #[test]
    fn test_serde_wire_names() {
        assert_eq!(serde_json::to_string(&VoteChoice::Approve).unwrap(), "\"approve\"");
        assert_eq!(serde_json::to_string(&Decision::Block).unwrap(), "\"block\"");
        assert_eq!(
            serde_json::to_string(&AppealKind::FalsePositive).unwrap(),
            "\"false_positive\""
        );
        assert_eq!(
            serde_json::to_string(&ContentKind::Comment).unwrap(),
            "\"comment\""
        );
    }
}
