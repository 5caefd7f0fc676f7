//! Appeal lifecycle: the record itself plus the three operations that
//! move it through its states (submission, resolution, moderator
//! override).

pub mod moderator;
pub mod record;
pub mod resolve;
pub mod submit;
