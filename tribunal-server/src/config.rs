use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use tribunal_core::VotingConfig;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    /// Directory for persistent state (SQLite database).
    /// Defaults to current working directory.
    pub state_dir: PathBuf,
    pub voting: VotingConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let state_dir = env::var("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        // Policy thresholds default to production values; the two that
        // matter for staging can be overridden.
        let mut voting = VotingConfig::default();
        if let Ok(v) = env::var("MINIMUM_VOTES") {
            voting.minimum_votes = v
                .parse::<usize>()
                .context("MINIMUM_VOTES must be a valid number")?;
        }
        if let Ok(v) = env::var("VOTE_TIMEOUT_MINUTES") {
            voting.timeout_minutes = v
                .parse::<i64>()
                .context("VOTE_TIMEOUT_MINUTES must be a valid number")?;
        }

        Ok(Config {
            port,
            state_dir,
            voting,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.state_dir.join("tribunal.db")
    }
}
