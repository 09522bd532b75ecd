// defense-core/src/interfaces/artifact_port.rs
// ============================================================================
// Module: ArtifactStore
// Description: Storage interface for opaque uploaded-artifact pointers.
// Purpose: Let a deliberation record a reference to a blob stored outside
//          the Defense File (an uploaded invoice, a rendered PDF) without
//          the core depending on any specific object-storage backend.
// Dependencies: async-trait, thiserror, crate::identifiers
// ============================================================================

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::identifiers::CompanyId;
use crate::identifiers::ProjectId;

/// An opaque pointer to a blob stored outside the Defense File itself,
/// recorded in `DefenseFile.artifact_refs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPointer {
    /// Stable identifier for the stored blob.
    pub artifact_id: String,
    /// Human-readable description of what the artifact is.
    pub description: String,
    /// Opaque location the backend can resolve back into bytes.
    pub uri: String,
}

/// Errors an [`ArtifactStore`] may return.
#[derive(Debug, Error)]
pub enum ArtifactStoreError {
    /// Underlying I/O failure writing or reading the artifact.
    #[error("artifact store io error: {0}")]
    Io(String),
}

/// Storage port for opaque uploaded artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores `bytes` under the given project and returns a pointer the
    /// Defense File can retain.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError`] when the backend cannot accept the
    /// write.
    async fn put(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
        description: &str,
        bytes: &[u8],
    ) -> Result<ArtifactPointer, ArtifactStoreError>;
}
