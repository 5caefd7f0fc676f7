//! Caller identity and the user directory.
//!
//! Requests arrive with a verified identity established upstream (an
//! API gateway terminates authentication); this service trusts the
//! forwarded identity headers and enforces roles. The user directory
//! supplies the account facts eligibility checks need.

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use tribunal_core::UserId;

use crate::error::AppealError;
use crate::repository::RepositoryError;

/// Role attached to the caller by the upstream gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn can_moderate(self) -> bool {
        matches!(self, Self::Moderator | Self::Admin)
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct CallerIdentity {
    pub user_id: UserId,
    pub role: Role,
}

impl CallerIdentity {
    /// Extract the identity forwarded in headers by the gateway.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AppealError> {
        let user_id = headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .ok_or(AppealError::Unauthenticated)?;

        let role = match headers.get("x-user-role").and_then(|v| v.to_str().ok()) {
            Some("moderator") => Role::Moderator,
            Some("admin") => Role::Admin,
            _ => Role::User,
        };

        Ok(Self {
            user_id: UserId::from(user_id),
            role,
        })
    }

    pub fn require_moderator(&self) -> Result<(), AppealError> {
        if self.role.can_moderate() {
            Ok(())
        } else {
            Err(AppealError::Forbidden)
        }
    }
}

/// The account facts eligibility checks consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub reputation_score: i64,
}

/// Read access to user profiles.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, RepositoryError>;
}

/// In-memory directory for tests and local runs.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    profiles: RwLock<HashMap<UserId, UserProfile>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, profile: UserProfile) {
        self.profiles
            .write()
            .expect("directory lock poisoned")
            .insert(profile.user_id.clone(), profile);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
        Ok(self
            .profiles
            .read()
            .expect("directory lock poisoned")
            .get(user_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_identity_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("u1"));
        headers.insert("x-user-role", HeaderValue::from_static("moderator"));
        let caller = CallerIdentity::from_headers(&headers).unwrap();
        assert_eq!(caller.user_id, UserId::from("u1"));
        assert_eq!(caller.role, Role::Moderator);
    }

    #[test]
    fn test_missing_identity_is_unauthenticated() {
        let headers = HeaderMap::new();
        assert!(matches!(
            CallerIdentity::from_headers(&headers),
            Err(AppealError::Unauthenticated)
        ));
    }

    #[test]
    fn test_unknown_role_defaults_to_user() {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("u1"));
        headers.insert("x-user-role", HeaderValue::from_static("superuser"));
        let caller = CallerIdentity::from_headers(&headers).unwrap();
        assert_eq!(caller.role, Role::User);
        assert!(caller.require_moderator().is_err());
    }
}
