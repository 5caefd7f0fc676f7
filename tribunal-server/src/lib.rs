//! Appeal lifecycle engine.
//!
//! Users appeal moderation decisions; eligible community members vote;
//! a quorum or a timed-out voting window resolves the appeal, a
//! periodic tally job backstops both, and moderators can override the
//! whole process. All writes to an appeal go through a version
//! precondition, so concurrent voters, the tally job, and moderators
//! can race safely over an eventually consistent document store.

pub mod appeal;
pub mod audit;
pub mod config;
pub mod content;
pub mod error;
pub mod http;
pub mod identity;
pub mod rate_limit;
pub mod repository;
pub mod scheduler;
pub mod vote;

use std::sync::Arc;

use tribunal_core::VotingConfig;

use audit::AuditRecorder;
use content::ContentStore;
use identity::UserDirectory;
use rate_limit::RateLimiter;
use repository::{AppealRepository, DecisionRepository, VoteRepository};

/// Shared state behind every handler and the tally job.
pub struct AppState {
    pub appeals: Arc<dyn AppealRepository>,
    pub votes: Arc<dyn VoteRepository>,
    pub decisions: Arc<dyn DecisionRepository>,
    pub audit: AuditRecorder,
    pub content: Arc<dyn ContentStore>,
    pub users: Arc<dyn UserDirectory>,
    pub rate_limiter: RateLimiter,
    pub voting: VotingConfig,
}
