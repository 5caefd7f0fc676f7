use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};

use tribunal_server::audit::AuditRecorder;
use tribunal_server::config::Config;
use tribunal_server::content::InMemoryContentStore;
use tribunal_server::http::router;
use tribunal_server::identity::InMemoryUserDirectory;
use tribunal_server::rate_limit::RateLimiter;
use tribunal_server::repository::sqlite::SqliteStore;
use tribunal_server::scheduler::tally_loop;
use tribunal_server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting tribunal appeal service");

    let config = Config::from_env()?;

    let store = Arc::new(SqliteStore::new(config.database_path())?);
    let state = Arc::new(AppState {
        appeals: store.clone(),
        votes: store.clone(),
        decisions: store.clone(),
        audit: AuditRecorder::new(store),
        // The content and user partitions live in other services; the
        // in-memory gateways here stand in until those integrations land.
        content: Arc::new(InMemoryContentStore::new()),
        users: Arc::new(InMemoryUserDirectory::new()),
        rate_limiter: RateLimiter::new(),
        voting: config.voting.clone(),
    });

    tokio::spawn(tally_loop(state.clone()));

    let app = router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
