// defense-store-sqlite/src/usage_store.rs
// ============================================================================
// Module: SQLite Usage Counter Store
// Description: Durable, atomic per-company-per-day quota counters.
// Purpose: Back QuotaGate's check-and-increment with a single conflicting
//          upsert inside an exclusive transaction, so no two concurrent
//          admissions ever observe the same pre-increment counter value.
// Dependencies: defense-core, rusqlite, time, thiserror
// ============================================================================

//! ## Overview
//! The admission algorithm (spec §4.2) requires reading the current
//! counter, checking it against the plan's limit, and incrementing in one
//! atomic step. `SQLite`'s `BEGIN IMMEDIATE` acquires the write lock before
//! the read, so a second connection attempting the same company+day blocks
//! until the first transaction commits or rolls back — there is no window
//! in which both transactions can observe capacity and both be admitted.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use defense_core::CompanyId;
use defense_core::QuotaAdmission;
use defense_core::Timestamp;
use defense_core::UsageCounterStore;
use defense_core::UsageStoreError;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use thiserror::Error;

/// `SQLite` schema version for the usage counter table.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout for `SQLite` connections.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Configuration for the `SQLite` usage counter store.
#[derive(Debug, Clone)]
pub struct SqliteUsageStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
}

impl SqliteUsageStoreConfig {
    /// Builds a config pointing at `path` with the default busy timeout.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS }
    }
}

/// Errors opening or initializing the `SQLite` usage counter store.
#[derive(Debug, Error)]
pub enum SqliteUsageStoreError {
    /// The database could not be opened or a pragma failed.
    #[error("sqlite usage store io error: {0}")]
    Io(String),
    /// The schema version on disk does not match the one this build expects.
    #[error("sqlite usage store version mismatch: {0}")]
    VersionMismatch(String),
}

/// `SQLite`-backed [`UsageCounterStore`], keyed by `(company_id, date_utc)`.
#[derive(Clone)]
pub struct SqliteUsageCounterStore {
    /// Shared connection, guarded by a blocking mutex (short critical
    /// sections only; all access happens inside `spawn_blocking`).
    connection: Arc<Mutex<Connection>>,
}

impl SqliteUsageCounterStore {
    /// Opens (creating if necessary) a `SQLite`-backed usage counter store
    /// at `config.path`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteUsageStoreError`] when the database cannot be opened
    /// or its schema is an unsupported version.
    pub fn open(config: &SqliteUsageStoreConfig) -> Result<Self, SqliteUsageStoreError> {
        ensure_parent_dir(&config.path)?;
        let connection = open_connection(config)?;
        initialize_schema(&connection)?;
        Ok(Self { connection: Arc::new(Mutex::new(connection)) })
    }
}

#[async_trait]
impl UsageCounterStore for SqliteUsageCounterStore {
    async fn check_and_increment(
        &self,
        company_id: &CompanyId,
        requested_tokens: u64,
        limits_requests_per_day: u64,
        limits_tokens_per_day: u64,
        now: Timestamp,
    ) -> Result<QuotaAdmission, UsageStoreError> {
        let connection = Arc::clone(&self.connection);
        let company_id = company_id.clone();
        tokio::task::spawn_blocking(move || {
            check_and_increment_blocking(
                &connection,
                &company_id,
                requested_tokens,
                limits_requests_per_day,
                limits_tokens_per_day,
                now,
            )
        })
        .await
        .map_err(|err| UsageStoreError::Io(err.to_string()))?
    }
}

/// Ensures the parent directory of the database file exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteUsageStoreError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteUsageStoreError::Io(err.to_string()))
}

/// Opens a `SQLite` connection with WAL and a busy timeout configured.
fn open_connection(config: &SqliteUsageStoreConfig) -> Result<Connection, SqliteUsageStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteUsageStoreError::Io(err.to_string()))?;
    connection
        .execute_batch("PRAGMA journal_mode = wal; PRAGMA foreign_keys = ON;")
        .map_err(|err| SqliteUsageStoreError::Io(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteUsageStoreError::Io(err.to_string()))?;
    Ok(connection)
}

/// Creates the schema if absent, or validates the stored version.
fn initialize_schema(connection: &Connection) -> Result<(), SqliteUsageStoreError> {
    connection
        .execute_batch("CREATE TABLE IF NOT EXISTS usage_store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteUsageStoreError::Io(err.to_string()))?;
    let version: Option<i64> = connection
        .query_row("SELECT version FROM usage_store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteUsageStoreError::Io(err.to_string()))?;
    match version {
        None => {
            connection
                .execute("INSERT INTO usage_store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteUsageStoreError::Io(err.to_string()))?;
            connection
                .execute_batch(
                    "CREATE TABLE IF NOT EXISTS usage_counter (
                        company_id TEXT NOT NULL,
                        date_utc TEXT NOT NULL,
                        requests INTEGER NOT NULL CHECK (requests >= 0),
                        tokens INTEGER NOT NULL CHECK (tokens >= 0),
                        updated_at INTEGER NOT NULL,
                        PRIMARY KEY (company_id, date_utc)
                    );",
                )
                .map_err(|err| SqliteUsageStoreError::Io(err.to_string()))?;
            Ok(())
        }
        Some(value) if value == SCHEMA_VERSION => Ok(()),
        Some(value) => Err(SqliteUsageStoreError::VersionMismatch(format!(
            "unsupported schema version: {value}"
        ))),
    }
}

/// Performs the atomic check-and-increment inside an immediate transaction.
///
/// `BEGIN IMMEDIATE` takes the write lock up front, so a concurrent caller
/// for the same `(company_id, date_utc)` blocks until this transaction
/// commits; no two callers can both read the pre-increment counter and
/// both be admitted when only one fits under the limit.
fn check_and_increment_blocking(
    connection: &Mutex<Connection>,
    company_id: &CompanyId,
    requested_tokens: u64,
    limits_requests_per_day: u64,
    limits_tokens_per_day: u64,
    now: Timestamp,
) -> Result<QuotaAdmission, UsageStoreError> {
    let date_utc = utc_date_key(now);
    let mut guard = connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let tx = guard.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
        .map_err(|err| UsageStoreError::Io(err.to_string()))?;

    let existing: Option<(i64, i64)> = tx
        .query_row(
            "SELECT requests, tokens FROM usage_counter WHERE company_id = ?1 AND date_utc = ?2",
            params![company_id.as_str(), date_utc],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|err| UsageStoreError::Io(err.to_string()))?;
    let (requests, tokens) = existing.unwrap_or((0, 0));
    let requests = u64::try_from(requests).unwrap_or(0);
    let tokens = u64::try_from(tokens).unwrap_or(0);

    let would_admit =
        requests + 1 <= limits_requests_per_day && tokens + requested_tokens <= limits_tokens_per_day;

    if !would_admit {
        tx.commit().map_err(|err| UsageStoreError::Io(err.to_string()))?;
        return Ok(QuotaAdmission { admitted: false, requests_used: requests, tokens_used: tokens });
    }

    let new_requests = requests + 1;
    let new_tokens = tokens + requested_tokens;
    tx.execute(
        "INSERT INTO usage_counter (company_id, date_utc, requests, tokens, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(company_id, date_utc) DO UPDATE SET
            requests = excluded.requests,
            tokens = excluded.tokens,
            updated_at = excluded.updated_at",
        params![
            company_id.as_str(),
            date_utc,
            i64::try_from(new_requests).unwrap_or(i64::MAX),
            i64::try_from(new_tokens).unwrap_or(i64::MAX),
            now.as_unix_millis(),
        ],
    )
    .map_err(|err| UsageStoreError::Io(err.to_string()))?;
    tx.commit().map_err(|err| UsageStoreError::Io(err.to_string()))?;

    Ok(QuotaAdmission { admitted: true, requests_used: new_requests, tokens_used: new_tokens })
}

/// Renders the UTC calendar date `now` falls on as `YYYY-MM-DD`, the key a
/// day-scoped counter resets against at UTC midnight.
fn utc_date_key(now: Timestamp) -> String {
    let seconds = now.as_unix_millis().div_euclid(1000);
    let date = time::OffsetDateTime::from_unix_timestamp(seconds)
        .map(time::OffsetDateTime::date)
        .unwrap_or(time::Date::MIN);
    let format = time::macros::format_description!("[year]-[month]-[day]");
    date.format(&format).unwrap_or_else(|_| date.to_string())
}
