//! Domain logic for the tribunal appeal lifecycle engine.
//!
//! This crate contains the pure parts of the system: identifier
//! newtypes, the voting configuration, the eligibility guard, the
//! quorum/outcome evaluator, and the urgency scorer. Nothing in here
//! performs I/O or depends on an async runtime, which keeps the rules
//! that decide appeals unit-testable in isolation.

pub mod config;
pub mod eligibility;
pub mod evaluator;
pub mod types;
pub mod urgency;

pub use config::VotingConfig;
pub use eligibility::{check_eligibility, Eligibility};
pub use evaluator::{evaluate, Evaluation, Outcome, VoteTally};
pub use types::*;
pub use urgency::voting_urgency;
