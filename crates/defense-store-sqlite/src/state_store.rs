// defense-store-sqlite/src/state_store.rs
// ============================================================================
// Module: SQLite Deliberation State Store
// Description: Durable DeliberationStateStore backed by SQLite WAL.
// Purpose: Persist resumable run state with hash-verified snapshots.
// Dependencies: defense-core, rusqlite, serde_json, sha2, thiserror
// ============================================================================

//! ## Overview
//! Each save writes a canonical JSON snapshot plus its SHA-256 digest in a
//! single transaction; loads recompute the digest and fail closed on
//! mismatch, the same write-then-verify discipline a deterministic
//! control-plane store applies to its own run state.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use defense_core::CompanyId;
use defense_core::DeliberationState;
use defense_core::DeliberationStateStore;
use defense_core::ProjectId;
use defense_core::StateStoreError;
use rusqlite::params;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

/// `SQLite` schema version for the deliberation state table.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout for `SQLite` connections.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Configuration for the `SQLite` deliberation state store.
#[derive(Debug, Clone)]
pub struct SqliteStateStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
}

impl SqliteStateStoreConfig {
    /// Builds a config pointing at `path` with the default busy timeout.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS }
    }
}

/// Errors opening or initializing the `SQLite` state store.
#[derive(Debug, Error)]
pub enum SqliteStateStoreError {
    /// The database could not be opened or a pragma failed.
    #[error("sqlite state store io error: {0}")]
    Io(String),
    /// The schema version on disk does not match the one this build expects.
    #[error("sqlite state store version mismatch: {0}")]
    VersionMismatch(String),
}

/// `SQLite`-backed [`DeliberationStateStore`].
#[derive(Clone)]
pub struct SqliteDeliberationStateStore {
    /// Shared connection, guarded by a blocking mutex (short critical
    /// sections only; all access happens inside `spawn_blocking`).
    connection: Arc<Mutex<Connection>>,
}

impl SqliteDeliberationStateStore {
    /// Opens (creating if necessary) a `SQLite`-backed deliberation state
    /// store at `config.path`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStateStoreError`] when the database cannot be opened
    /// or its schema is an unsupported version.
    pub fn open(config: &SqliteStateStoreConfig) -> Result<Self, SqliteStateStoreError> {
        ensure_parent_dir(&config.path)?;
        let connection = open_connection(config)?;
        initialize_schema(&connection)?;
        Ok(Self { connection: Arc::new(Mutex::new(connection)) })
    }
}

#[async_trait]
impl DeliberationStateStore for SqliteDeliberationStateStore {
    async fn load(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
    ) -> Result<Option<DeliberationState>, StateStoreError> {
        let connection = Arc::clone(&self.connection);
        let company_id = company_id.clone();
        let project_id = project_id.clone();
        tokio::task::spawn_blocking(move || load_blocking(&connection, &company_id, &project_id))
            .await
            .map_err(|err| StateStoreError::Io(err.to_string()))?
    }

    async fn save(&self, state: &DeliberationState) -> Result<(), StateStoreError> {
        let connection = Arc::clone(&self.connection);
        let state = state.clone();
        tokio::task::spawn_blocking(move || save_blocking(&connection, &state))
            .await
            .map_err(|err| StateStoreError::Io(err.to_string()))?
    }
}

/// Ensures the parent directory of the database file exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStateStoreError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStateStoreError::Io(err.to_string()))
}

/// Opens a `SQLite` connection with WAL and a busy timeout configured.
fn open_connection(config: &SqliteStateStoreConfig) -> Result<Connection, SqliteStateStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStateStoreError::Io(err.to_string()))?;
    connection
        .execute_batch("PRAGMA journal_mode = wal; PRAGMA foreign_keys = ON;")
        .map_err(|err| SqliteStateStoreError::Io(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStateStoreError::Io(err.to_string()))?;
    Ok(connection)
}

/// Creates the schema if absent, or validates the stored version.
fn initialize_schema(connection: &Connection) -> Result<(), SqliteStateStoreError> {
    connection
        .execute_batch("CREATE TABLE IF NOT EXISTS state_store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStateStoreError::Io(err.to_string()))?;
    let version: Option<i64> = connection
        .query_row("SELECT version FROM state_store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStateStoreError::Io(err.to_string()))?;
    match version {
        None => {
            connection
                .execute(
                    "INSERT INTO state_store_meta (version) VALUES (?1)",
                    params![SCHEMA_VERSION],
                )
                .map_err(|err| SqliteStateStoreError::Io(err.to_string()))?;
            connection
                .execute_batch(
                    "CREATE TABLE IF NOT EXISTS deliberation_state (
                        company_id TEXT NOT NULL,
                        project_id TEXT NOT NULL,
                        state_json BLOB NOT NULL,
                        state_hash TEXT NOT NULL,
                        PRIMARY KEY (company_id, project_id)
                    );",
                )
                .map_err(|err| SqliteStateStoreError::Io(err.to_string()))?;
            Ok(())
        }
        Some(value) if value == SCHEMA_VERSION => Ok(()),
        Some(value) => {
            Err(SqliteStateStoreError::VersionMismatch(format!("unsupported schema version: {value}")))
        }
    }
}

/// Loads and hash-verifies a deliberation state row.
fn load_blocking(
    connection: &Mutex<Connection>,
    company_id: &CompanyId,
    project_id: &ProjectId,
) -> Result<Option<DeliberationState>, StateStoreError> {
    let guard = connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let row: Option<(Vec<u8>, String)> = guard
        .query_row(
            "SELECT state_json, state_hash FROM deliberation_state WHERE company_id = ?1 AND project_id = ?2",
            params![company_id.as_str(), project_id.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|err| StateStoreError::Io(err.to_string()))?;
    let Some((bytes, expected_hash)) = row else {
        return Ok(None);
    };
    let actual_hash = hex_sha256(&bytes);
    if actual_hash != expected_hash {
        return Err(StateStoreError::Corrupt(format!(
            "state hash mismatch for project {}",
            project_id.as_str()
        )));
    }
    let state: DeliberationState =
        serde_json::from_slice(&bytes).map_err(|err| StateStoreError::Corrupt(err.to_string()))?;
    Ok(Some(state))
}

/// Writes a deliberation state row, overwriting any prior snapshot.
fn save_blocking(connection: &Mutex<Connection>, state: &DeliberationState) -> Result<(), StateStoreError> {
    let bytes = serde_json::to_vec(state).map_err(|err| StateStoreError::Io(err.to_string()))?;
    let hash = hex_sha256(&bytes);
    let guard = connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    guard
        .execute(
            "INSERT INTO deliberation_state (company_id, project_id, state_json, state_hash)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(company_id, project_id) DO UPDATE SET
                state_json = excluded.state_json,
                state_hash = excluded.state_hash",
            params![state.company_id.as_str(), state.project_id.as_str(), bytes, hash],
        )
        .map_err(|err| StateStoreError::Io(err.to_string()))?;
    Ok(())
}

/// Returns the lower-hex SHA-256 digest of `bytes`.
fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}
