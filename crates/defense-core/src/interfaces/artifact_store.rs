// defense-core/src/interfaces/artifact_store.rs
// ============================================================================
// Module: DefenseFileStore
// Description: Durable persistence interface for Defense Files.
// Purpose: Let the orchestrator append decisions and read back the audit
//          trail without depending on a specific storage backend.
// Dependencies: async-trait, thiserror, crate::identifiers, crate::model
// ============================================================================

use async_trait::async_trait;
use thiserror::Error;

use crate::identifiers::CompanyId;
use crate::identifiers::DecisionLabel;
use crate::identifiers::ProjectId;
use crate::model::defense_file::NotificationRecord;
use crate::model::project::Project;
use crate::model::AgentDecision;
use crate::model::DefenseFile;
use crate::time::Timestamp;

/// Errors a [`DefenseFileStore`] may return.
#[derive(Debug, Error)]
pub enum DefenseFileStoreError {
    /// Underlying I/O failure.
    #[error("defense file store io error: {0}")]
    Io(String),
    /// Stored data failed to parse or its hash/version did not match.
    #[error("defense file store corruption: {0}")]
    Corrupt(String),
}

/// Durable storage port for Defense Files.
///
/// # Invariants
/// - `append_decision` is the only way to add a decision; implementations
///   must never allow overwriting or removing a previously appended one.
/// - Concurrent appends to the same `(company_id, project_id)` must be
///   serialized by the implementation (per-project locking), since the
///   orchestrator may run one stage per project but several projects at
///   once.
#[async_trait]
pub trait DefenseFileStore: Send + Sync {
    /// Loads the Defense File for a project, creating an empty one in
    /// memory (but not yet persisting it) if none exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`DefenseFileStoreError`] when the store cannot be read.
    async fn load(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
    ) -> Result<DefenseFile, DefenseFileStoreError>;

    /// Records the project snapshot and creation time for a project's
    /// Defense File, once, per spec.md §4.3's `recordProject`.
    ///
    /// # Errors
    ///
    /// Returns [`DefenseFileStoreError`] when the store cannot be written.
    async fn record_project(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
        project: Project,
        recorded_at: Timestamp,
    ) -> Result<DefenseFile, DefenseFileStoreError>;

    /// Appends a decision to the project's Defense File and persists it.
    ///
    /// # Errors
    ///
    /// Returns [`DefenseFileStoreError`] when the store cannot be written.
    async fn append_decision(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
        decision: AgentDecision,
    ) -> Result<DefenseFile, DefenseFileStoreError>;

    /// Sets the project's terminal decision and rationale. A no-op if the
    /// Defense File already has a terminal decision recorded, preserving
    /// the "set at most once" invariant across retries of the terminal
    /// stage boundary.
    ///
    /// # Errors
    ///
    /// Returns [`DefenseFileStoreError`] when the store cannot be written.
    async fn set_final(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
        decision: DecisionLabel,
        rationale: String,
        recorded_at: Timestamp,
    ) -> Result<DefenseFile, DefenseFileStoreError>;

    /// Appends an outbound-notification record to the project's Defense
    /// File, per spec.md §4.3's `appendNotification`.
    ///
    /// # Errors
    ///
    /// Returns [`DefenseFileStoreError`] when the store cannot be written.
    async fn append_notification(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
        notification: NotificationRecord,
    ) -> Result<DefenseFile, DefenseFileStoreError>;
}
