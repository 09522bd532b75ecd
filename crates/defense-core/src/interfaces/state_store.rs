// defense-core/src/interfaces/state_store.rs
// ============================================================================
// Module: DeliberationStateStore
// Description: Durable persistence interface for deliberation run state.
// Purpose: Let the orchestrator save/resume progress without depending on a
//          specific storage backend.
// Dependencies: async-trait, thiserror, crate::identifiers, crate::model
// ============================================================================

use async_trait::async_trait;
use thiserror::Error;

use crate::identifiers::CompanyId;
use crate::identifiers::ProjectId;
use crate::model::DeliberationState;

/// Errors a [`DeliberationStateStore`] may return.
#[derive(Debug, Error)]
pub enum StateStoreError {
    /// Underlying I/O failure.
    #[error("state store io error: {0}")]
    Io(String),
    /// Stored data failed to parse or its hash/version did not match.
    #[error("state store corruption: {0}")]
    Corrupt(String),
}

/// Durable storage port for [`DeliberationState`].
#[async_trait]
pub trait DeliberationStateStore: Send + Sync {
    /// Loads the state for a project, if a deliberation has ever started.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError`] when the store cannot be read.
    async fn load(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
    ) -> Result<Option<DeliberationState>, StateStoreError>;

    /// Persists the current state, overwriting any prior snapshot for the
    /// same project.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError`] when the store cannot be written.
    async fn save(&self, state: &DeliberationState) -> Result<(), StateStoreError>;
}
