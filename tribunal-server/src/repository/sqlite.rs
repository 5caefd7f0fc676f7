//! SQLite implementations of the repositories.
//!
//! Documents are stored as JSON in a `document` column, with the fields
//! the queries need mirrored into indexed columns. The appeal table
//! carries an integer `version` column; `update` bumps it under a
//! `WHERE version = ?` guard, which is the whole optimistic-concurrency
//! story.
//!
//! # Schema Versioning
//!
//! A `schema_version` table tracks the schema version. To change the
//! schema, increment `CURRENT_SCHEMA_VERSION` and add a migration in
//! `run_migrations()`; migrations run sequentially from the stored
//! version to the target.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use tribunal_core::{AppealId, ContentRef, ReviewQueue, UserId};

use crate::appeal::record::{Appeal, AppealStatus};
use crate::audit::AuditRecord;
use crate::vote::Vote;

use super::{
    AppealRepository, AuditRepository, DecisionRecord, DecisionRepository, RepositoryError,
    Version, Versioned, VoteRepository,
};

/// Current schema version. Increment when making schema changes and add
/// corresponding migration logic in `run_migrations()`.
const CURRENT_SCHEMA_VERSION: i64 = 1;

/// One SQLite database holding all four tables. The repository handles
/// share the connection; rusqlite operations run on the blocking pool.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// The database is configured with `journal_mode = WAL` and
    /// `synchronous = FULL` so committed appeals survive a crash.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy();

        if path_str != ":memory:" && !path_str.is_empty() {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        RepositoryError::storage(
                            "create database directory",
                            format!("{}: {}", parent.display(), e),
                        )
                    })?;
                }
            }
        }

        let conn = Connection::open(path_ref)
            .map_err(|e| RepositoryError::storage("open database", e.to_string()))?;

        // WAL can silently fail to enable on filesystems without shared
        // memory support; verify rather than assume. In-memory databases
        // report "memory", which is fine.
        let is_in_memory = path_str == ":memory:";
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| RepositoryError::storage("set journal_mode", e.to_string()))?;
        let journal_mode_ok = journal_mode.eq_ignore_ascii_case("wal")
            || (is_in_memory && journal_mode.eq_ignore_ascii_case("memory"));
        if !journal_mode_ok {
            return Err(RepositoryError::storage(
                "configure journal_mode",
                format!(
                    "failed to enable WAL mode: SQLite returned '{journal_mode}' instead of 'wal'"
                ),
            ));
        }

        conn.execute_batch(
            r#"
            PRAGMA synchronous = FULL;
            PRAGMA busy_timeout = 5000;
            PRAGMA foreign_keys = ON;
            "#,
        )
        .map_err(|e| RepositoryError::storage("configure pragmas", e.to_string()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| RepositoryError::storage("create schema_version table", e.to_string()))?;

        let current_version: i64 = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| RepositoryError::storage("get schema version", e.to_string()))?
            .unwrap_or(0);

        Self::run_migrations(&conn, current_version)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database for tests.
    pub fn new_in_memory() -> Result<Self, RepositoryError> {
        Self::new(":memory:")
    }

    fn run_migrations(conn: &Connection, from_version: i64) -> Result<(), RepositoryError> {
        if from_version > CURRENT_SCHEMA_VERSION {
            return Err(RepositoryError::storage(
                "schema version",
                format!(
                    "database schema version {from_version} is newer than supported version \
                     {CURRENT_SCHEMA_VERSION}; upgrade the application"
                ),
            ));
        }
        if from_version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        if from_version < 1 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS appeals (
                    id TEXT PRIMARY KEY,
                    document TEXT NOT NULL,
                    version INTEGER NOT NULL,
                    submitter_id TEXT NOT NULL,
                    content_kind TEXT NOT NULL,
                    content_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    review_queue TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_appeals_open
                    ON appeals(review_queue, status)
                    WHERE status IN ('pending', 'tallying');
                CREATE INDEX IF NOT EXISTS idx_appeals_submitter
                    ON appeals(submitter_id, created_at);
                CREATE INDEX IF NOT EXISTS idx_appeals_content
                    ON appeals(content_kind, content_id);

                CREATE TABLE IF NOT EXISTS votes (
                    id TEXT PRIMARY KEY,
                    appeal_id TEXT NOT NULL,
                    voter_id TEXT NOT NULL,
                    document TEXT NOT NULL,
                    cast_at TEXT NOT NULL,
                    UNIQUE(appeal_id, voter_id)
                );
                CREATE INDEX IF NOT EXISTS idx_votes_appeal
                    ON votes(appeal_id, cast_at);

                CREATE TABLE IF NOT EXISTS audit_records (
                    id TEXT PRIMARY KEY,
                    subject_id TEXT NOT NULL,
                    document TEXT NOT NULL,
                    recorded_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_audit_subject
                    ON audit_records(subject_id, recorded_at);

                CREATE TABLE IF NOT EXISTS decision_records (
                    id TEXT PRIMARY KEY,
                    content_id TEXT NOT NULL,
                    document TEXT NOT NULL,
                    decided_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_decisions_content
                    ON decision_records(content_id, decided_at);
                "#,
            )
            .map_err(|e| RepositoryError::storage("migration v1", e.to_string()))?;
        }

        // Future migrations would go here:
        // if from_version < 2 { ... }

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(|e| RepositoryError::storage("update schema version", e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }
}

fn parse_appeal(json: &str) -> Result<Appeal, RepositoryError> {
    serde_json::from_str(json).map_err(|_| RepositoryError::corruption("appeal JSON"))
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[async_trait]
impl AppealRepository for SqliteStore {
    async fn get(&self, id: &AppealId) -> Result<Option<Versioned<Appeal>>, RepositoryError> {
        let conn = self.conn();
        let id = id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let result: Option<(String, i64)> = conn
                .query_row(
                    "SELECT document, version FROM appeals WHERE id = ?1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(|e| RepositoryError::storage("get appeal", e.to_string()))?;

            result
                .map(|(json, version)| {
                    Ok(Versioned {
                        value: parse_appeal(&json)?,
                        version: Version(version),
                    })
                })
                .transpose()
        })
        .await
        .map_err(|e| RepositoryError::storage("get appeal", e.to_string()))?
    }

    async fn insert(&self, appeal: &Appeal) -> Result<Version, RepositoryError> {
        let conn = self.conn();
        let document = serde_json::to_string(appeal)
            .map_err(|e| RepositoryError::storage("serialize appeal", e.to_string()))?;
        let appeal = appeal.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute(
                "INSERT INTO appeals (id, document, version, submitter_id, content_kind,
                                      content_id, status, review_queue, created_at)
                 VALUES (?1, ?2, 1, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    appeal.id.to_string(),
                    document,
                    appeal.submitter_id.to_string(),
                    appeal.content.kind.to_string(),
                    appeal.content.id.to_string(),
                    appeal.status.as_str(),
                    appeal.review_queue.to_string(),
                    appeal.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| RepositoryError::storage("insert appeal", e.to_string()))?;
            Ok(Version(1))
        })
        .await
        .map_err(|e| RepositoryError::storage("insert appeal", e.to_string()))?
    }

    async fn update(
        &self,
        appeal: &Appeal,
        expected: Version,
    ) -> Result<Version, RepositoryError> {
        let conn = self.conn();
        let document = serde_json::to_string(appeal)
            .map_err(|e| RepositoryError::storage("serialize appeal", e.to_string()))?;
        let id = appeal.id.clone();
        let status = appeal.status.as_str();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let changed = conn
                .execute(
                    "UPDATE appeals SET document = ?1, status = ?2, version = version + 1
                     WHERE id = ?3 AND version = ?4",
                    params![document, status, id.to_string(), expected.0],
                )
                .map_err(|e| RepositoryError::storage("update appeal", e.to_string()))?;

            if changed == 1 {
                return Ok(expected.next());
            }

            // Distinguish a missing row from a lost race.
            let exists: bool = conn
                .query_row(
                    "SELECT 1 FROM appeals WHERE id = ?1",
                    params![id.to_string()],
                    |_| Ok(true),
                )
                .optional()
                .map_err(|e| RepositoryError::storage("update appeal", e.to_string()))?
                .unwrap_or(false);
            if exists {
                Err(RepositoryError::VersionMismatch(id))
            } else {
                Err(RepositoryError::NotFound(format!("appeal {id}")))
            }
        })
        .await
        .map_err(|e| RepositoryError::storage("update appeal", e.to_string()))?
    }

    async fn find_active_for_submitter(
        &self,
        content: &ContentRef,
        submitter: &UserId,
    ) -> Result<Option<Versioned<Appeal>>, RepositoryError> {
        let conn = self.conn();
        let kind = content.kind.to_string();
        let content_id = content.id.to_string();
        let submitter = submitter.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let result: Option<(String, i64)> = conn
                .query_row(
                    "SELECT document, version FROM appeals
                     WHERE content_kind = ?1 AND content_id = ?2 AND submitter_id = ?3
                       AND status IN ('pending', 'tallying')
                     LIMIT 1",
                    params![kind, content_id, submitter],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(|e| RepositoryError::storage("find active appeal", e.to_string()))?;

            result
                .map(|(json, version)| {
                    Ok(Versioned {
                        value: parse_appeal(&json)?,
                        version: Version(version),
                    })
                })
                .transpose()
        })
        .await
        .map_err(|e| RepositoryError::storage("find active appeal", e.to_string()))?
    }

    async fn list_open(
        &self,
        queue: ReviewQueue,
    ) -> Result<Vec<Versioned<Appeal>>, RepositoryError> {
        let conn = self.conn();
        let queue = queue.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn
                .prepare(
                    "SELECT document, version FROM appeals
                     WHERE review_queue = ?1 AND status IN ('pending', 'tallying')
                     ORDER BY created_at",
                )
                .map_err(|e| RepositoryError::storage("list open appeals", e.to_string()))?;
            let rows = stmt
                .query_map(params![queue], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })
                .map_err(|e| RepositoryError::storage("list open appeals", e.to_string()))?;

            collect_versioned(rows)
        })
        .await
        .map_err(|e| RepositoryError::storage("list open appeals", e.to_string()))?
    }

    async fn list_by_submitter(
        &self,
        submitter: &UserId,
    ) -> Result<Vec<Versioned<Appeal>>, RepositoryError> {
        let conn = self.conn();
        let submitter = submitter.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn
                .prepare(
                    "SELECT document, version FROM appeals
                     WHERE submitter_id = ?1 ORDER BY created_at DESC",
                )
                .map_err(|e| RepositoryError::storage("list appeals by submitter", e.to_string()))?;
            let rows = stmt
                .query_map(params![submitter], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })
                .map_err(|e| RepositoryError::storage("list appeals by submitter", e.to_string()))?;

            collect_versioned(rows)
        })
        .await
        .map_err(|e| RepositoryError::storage("list appeals by submitter", e.to_string()))?
    }

    async fn list(
        &self,
        status: Option<AppealStatus>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Versioned<Appeal>>, RepositoryError> {
        let conn = self.conn();
        let status = status.map(|s| s.as_str().to_string());

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn
                .prepare(
                    "SELECT document, version FROM appeals
                     WHERE (?1 IS NULL OR status = ?1)
                     ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
                )
                .map_err(|e| RepositoryError::storage("list appeals", e.to_string()))?;
            let rows = stmt
                .query_map(params![status, limit as i64, offset as i64], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })
                .map_err(|e| RepositoryError::storage("list appeals", e.to_string()))?;

            collect_versioned(rows)
        })
        .await
        .map_err(|e| RepositoryError::storage("list appeals", e.to_string()))?
    }
}

/// Collect (document, version) rows, skipping corrupt documents so one
/// bad row cannot wedge a whole listing. Corrupt rows are logged for
/// investigation.
fn collect_versioned(
    rows: impl Iterator<Item = Result<(String, i64), rusqlite::Error>>,
) -> Result<Vec<Versioned<Appeal>>, RepositoryError> {
    let mut results = Vec::new();
    for row in rows {
        let (json, version) =
            row.map_err(|e| RepositoryError::storage("read appeal row", e.to_string()))?;
        match parse_appeal(&json) {
            Ok(appeal) => results.push(Versioned {
                value: appeal,
                version: Version(version),
            }),
            Err(e) => warn!(error = %e, "skipping corrupt appeal row"),
        }
    }
    Ok(results)
}

#[async_trait]
impl VoteRepository for SqliteStore {
    async fn insert(&self, vote: &Vote) -> Result<(), RepositoryError> {
        let conn = self.conn();
        let document = serde_json::to_string(vote)
            .map_err(|e| RepositoryError::storage("serialize vote", e.to_string()))?;
        let vote = vote.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute(
                "INSERT INTO votes (id, appeal_id, voter_id, document, cast_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    vote.id.to_string(),
                    vote.appeal_id.to_string(),
                    vote.voter_id.to_string(),
                    document,
                    vote.cast_at.to_rfc3339(),
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    RepositoryError::DuplicateVote {
                        appeal_id: vote.appeal_id.clone(),
                        voter_id: vote.voter_id.clone(),
                    }
                } else {
                    RepositoryError::storage("insert vote", e.to_string())
                }
            })?;
            Ok(())
        })
        .await
        .map_err(|e| RepositoryError::storage("insert vote", e.to_string()))?
    }

    async fn list_for_appeal(&self, appeal_id: &AppealId) -> Result<Vec<Vote>, RepositoryError> {
        let conn = self.conn();
        let appeal_id = appeal_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn
                .prepare("SELECT document FROM votes WHERE appeal_id = ?1 ORDER BY cast_at")
                .map_err(|e| RepositoryError::storage("list votes", e.to_string()))?;
            let rows = stmt
                .query_map(params![appeal_id], |row| row.get::<_, String>(0))
                .map_err(|e| RepositoryError::storage("list votes", e.to_string()))?;

            let mut votes = Vec::new();
            for row in rows {
                let json =
                    row.map_err(|e| RepositoryError::storage("read vote row", e.to_string()))?;
                let vote: Vote = serde_json::from_str(&json)
                    .map_err(|_| RepositoryError::corruption("vote JSON"))?;
                votes.push(vote);
            }
            Ok(votes)
        })
        .await
        .map_err(|e| RepositoryError::storage("list votes", e.to_string()))?
    }

    async fn find(
        &self,
        appeal_id: &AppealId,
        voter_id: &UserId,
    ) -> Result<Option<Vote>, RepositoryError> {
        let conn = self.conn();
        let appeal_id = appeal_id.to_string();
        let voter_id = voter_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let result: Option<String> = conn
                .query_row(
                    "SELECT document FROM votes WHERE appeal_id = ?1 AND voter_id = ?2",
                    params![appeal_id, voter_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| RepositoryError::storage("find vote", e.to_string()))?;

            result
                .map(|json| {
                    serde_json::from_str(&json)
                        .map_err(|_| RepositoryError::corruption("vote JSON"))
                })
                .transpose()
        })
        .await
        .map_err(|e| RepositoryError::storage("find vote", e.to_string()))?
    }
}

#[async_trait]
impl AuditRepository for SqliteStore {
    async fn append(&self, record: &AuditRecord) -> Result<(), RepositoryError> {
        let conn = self.conn();
        let document = serde_json::to_string(record)
            .map_err(|e| RepositoryError::storage("serialize audit record", e.to_string()))?;
        let id = record.id.clone();
        let subject_id = record.subject_id.clone();
        let recorded_at = record.recorded_at.to_rfc3339();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute(
                "INSERT INTO audit_records (id, subject_id, document, recorded_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, subject_id, document, recorded_at],
            )
            .map_err(|e| RepositoryError::storage("append audit record", e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| RepositoryError::storage("append audit record", e.to_string()))?
    }

    async fn list_for_subject(
        &self,
        subject_id: &str,
    ) -> Result<Vec<AuditRecord>, RepositoryError> {
        let conn = self.conn();
        let subject_id = subject_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn
                .prepare(
                    "SELECT document FROM audit_records
                     WHERE subject_id = ?1 ORDER BY recorded_at",
                )
                .map_err(|e| RepositoryError::storage("list audit records", e.to_string()))?;
            let rows = stmt
                .query_map(params![subject_id], |row| row.get::<_, String>(0))
                .map_err(|e| RepositoryError::storage("list audit records", e.to_string()))?;

            let mut records = Vec::new();
            for row in rows {
                let json =
                    row.map_err(|e| RepositoryError::storage("read audit row", e.to_string()))?;
                let record: AuditRecord = serde_json::from_str(&json)
                    .map_err(|_| RepositoryError::corruption("audit record JSON"))?;
                records.push(record);
            }
            Ok(records)
        })
        .await
        .map_err(|e| RepositoryError::storage("list audit records", e.to_string()))?
    }
}

#[async_trait]
impl DecisionRepository for SqliteStore {
    async fn append(&self, record: &DecisionRecord) -> Result<(), RepositoryError> {
        let conn = self.conn();
        let document = serde_json::to_string(record)
            .map_err(|e| RepositoryError::storage("serialize decision record", e.to_string()))?;
        let id = record.id.clone();
        let content_id = record.content_id.clone();
        let decided_at = record.decided_at.to_rfc3339();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute(
                "INSERT INTO decision_records (id, content_id, document, decided_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, content_id, document, decided_at],
            )
            .map_err(|e| RepositoryError::storage("append decision record", e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| RepositoryError::storage("append decision record", e.to_string()))?
    }

    async fn list_for_content(
        &self,
        content_id: &str,
    ) -> Result<Vec<DecisionRecord>, RepositoryError> {
        let conn = self.conn();
        let content_id = content_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn
                .prepare(
                    "SELECT document FROM decision_records
                     WHERE content_id = ?1 ORDER BY decided_at",
                )
                .map_err(|e| RepositoryError::storage("list decision records", e.to_string()))?;
            let rows = stmt
                .query_map(params![content_id], |row| row.get::<_, String>(0))
                .map_err(|e| RepositoryError::storage("list decision records", e.to_string()))?;

            let mut records = Vec::new();
            for row in rows {
                let json = row
                    .map_err(|e| RepositoryError::storage("read decision row", e.to_string()))?;
                let record: DecisionRecord = serde_json::from_str(&json)
                    .map_err(|_| RepositoryError::corruption("decision record JSON"))?;
                records.push(record);
            }
            Ok(records)
        })
        .await
        .map_err(|e| RepositoryError::storage("list decision records", e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tribunal_core::{AppealKind, ContentKind, VoteChoice, VoteId, VotingConfig};

    use crate::appeal::record::new_appeal;

    fn store() -> SqliteStore {
        SqliteStore::new_in_memory().expect("in-memory store")
    }

    fn appeal(content_id: &str, submitter: &str) -> Appeal {
        new_appeal(
            ContentRef::new(ContentKind::Post, content_id),
            UserId::from("owner"),
            UserId::from(submitter),
            AppealKind::ContextMissing,
            "missing context here".to_string(),
            "the post reads badly out of context but is a quote".to_string(),
            Some("preview text".to_string()),
            3,
            Utc::now(),
            &VotingConfig::default(),
        )
    }

    fn vote(appeal_id: &AppealId, voter: &str, choice: VoteChoice) -> Vote {
        Vote {
            id: VoteId::generate(),
            appeal_id: appeal_id.clone(),
            content_id: "p1".into(),
            voter_id: UserId::from(voter),
            choice,
            reason: None,
            voter_reputation: 42,
            voter_account_age_days: 200,
            cast_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_appeal_round_trips_through_json_column() {
        let store = store();
        let a = appeal("p1", "u1");
        AppealRepository::insert(&store, &a).await.unwrap();
        let loaded = AppealRepository::get(&store, &a.id).await.unwrap().unwrap();
        assert_eq!(loaded.value, a);
        assert_eq!(loaded.version, Version(1));
    }

    #[tokio::test]
    async fn test_version_guard_on_update() {
        let store = store();
        let mut a = appeal("p1", "u1");
        AppealRepository::insert(&store, &a).await.unwrap();

        a.total_votes = 1;
        assert_eq!(store.update(&a, Version(1)).await.unwrap(), Version(2));
        assert!(matches!(
            store.update(&a, Version(1)).await,
            Err(RepositoryError::VersionMismatch(_))
        ));

        let missing = appeal("p2", "u1");
        assert!(matches!(
            store.update(&missing, Version(1)).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unique_vote_constraint() {
        let store = store();
        let appeal_id = AppealId::generate();
        VoteRepository::insert(&store, &vote(&appeal_id, "u1", VoteChoice::Approve))
            .await
            .unwrap();
        assert!(matches!(
            VoteRepository::insert(&store, &vote(&appeal_id, "u1", VoteChoice::Reject)).await,
            Err(RepositoryError::DuplicateVote { .. })
        ));
        assert_eq!(store.list_for_appeal(&appeal_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_open_listing_excludes_terminal_statuses() {
        let store = store();
        let mut a = appeal("p1", "u1");
        let b = appeal("p2", "u2");
        AppealRepository::insert(&store, &a).await.unwrap();
        AppealRepository::insert(&store, &b).await.unwrap();

        a.status = AppealStatus::Overridden;
        store.update(&a, Version(1)).await.unwrap();

        let open = store.list_open(ReviewQueue::Community).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].value.id, b.id);
    }

    #[tokio::test]
    async fn test_status_filter_and_pagination() {
        let store = store();
        for i in 0..4 {
            AppealRepository::insert(&store, &appeal(&format!("p{i}"), "u1"))
                .await
                .unwrap();
        }
        let pending = store
            .list(Some(AppealStatus::Pending), 0, 10)
            .await
            .unwrap();
        assert_eq!(pending.len(), 4);
        let page = store.list(None, 3, 10).await.unwrap();
        assert_eq!(page.len(), 1);
        let none = store
            .list(Some(AppealStatus::Expired), 0, 10)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_audit_records_ordered_by_time() {
        let store = store();
        for i in 0..3 {
            let record = AuditRecord {
                id: format!("audit_{i}"),
                action: crate::audit::AuditAction::VoteCast,
                actor_id: "u1".to_string(),
                actor_role: tribunal_core::ActorRole::Community,
                subject_id: "appeal_x".to_string(),
                target: "post:p1".to_string(),
                reason_code: None,
                note: None,
                before: serde_json::Value::Null,
                after: serde_json::Value::Null,
                correlation_id: "corr_1".to_string(),
                recorded_at: Utc::now() + chrono::Duration::seconds(i),
            };
            AuditRepository::append(&store, &record).await.unwrap();
        }
        let records = store.list_for_subject("appeal_x").await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, "audit_0");
        assert_eq!(records[2].id, "audit_2");
    }
}
