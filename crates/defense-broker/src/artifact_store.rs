// defense-broker/src/artifact_store.rs
// ============================================================================
// Module: Filesystem Artifact Store
// Description: ArtifactStore backed by a tenant-partitioned directory tree.
// Purpose: Persist uploaded artifacts (invoices, rendered PDFs) to local
//          disk without the core depending on any specific object-storage
//          backend.
// Dependencies: defense-core, tokio, base64
// ============================================================================

//! ## Overview
//! Artifacts are written under `{root}/{company_id}/{project_id}/{artifact_id}`.
//! Every write goes to a sibling temp file first and is renamed into place,
//! the write-to-temp-then-rename discipline the teacher's store crates use
//! for whole-document writes, so a crash mid-write never leaves a partial
//! artifact visible under its final name.

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use defense_core::ArtifactPointer;
use defense_core::ArtifactStoreError;
use defense_core::CompanyId;
use defense_core::ProjectId;

/// Configuration for [`FilesystemArtifactStore`].
#[derive(Debug, Clone)]
pub struct FilesystemArtifactStoreConfig {
    /// Root directory artifacts are written under.
    pub root: PathBuf,
}

/// [`defense_core::ArtifactStore`] backed by a tenant-partitioned directory
/// tree.
pub struct FilesystemArtifactStore {
    root: PathBuf,
}

impl FilesystemArtifactStore {
    /// Creates a store rooted at `config.root`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError::Io`] when the root cannot be created.
    pub async fn new(config: FilesystemArtifactStoreConfig) -> Result<Self, ArtifactStoreError> {
        tokio::fs::create_dir_all(&config.root)
            .await
            .map_err(|err| ArtifactStoreError::Io(err.to_string()))?;
        Ok(Self { root: config.root })
    }

    /// The project directory an artifact for `company_id`/`project_id`
    /// would be stored under.
    fn project_dir(&self, company_id: &CompanyId, project_id: &ProjectId) -> PathBuf {
        self.root.join(company_id.as_str()).join(project_id.as_str())
    }
}

#[async_trait]
impl defense_core::ArtifactStore for FilesystemArtifactStore {
    async fn put(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
        description: &str,
        bytes: &[u8],
    ) -> Result<ArtifactPointer, ArtifactStoreError> {
        let dir = self.project_dir(company_id, project_id);
        tokio::fs::create_dir_all(&dir).await.map_err(|err| ArtifactStoreError::Io(err.to_string()))?;

        let artifact_id = URL_SAFE_NO_PAD.encode(content_fingerprint(bytes, description));
        let final_path = dir.join(&artifact_id);
        let temp_path = dir.join(format!("{artifact_id}.tmp"));

        tokio::fs::write(&temp_path, bytes).await.map_err(|err| ArtifactStoreError::Io(err.to_string()))?;
        tokio::fs::rename(&temp_path, &final_path)
            .await
            .map_err(|err| ArtifactStoreError::Io(err.to_string()))?;

        Ok(ArtifactPointer {
            artifact_id: artifact_id.clone(),
            description: description.to_string(),
            uri: file_uri(&final_path),
        })
    }
}

/// Derives a deterministic artifact id from the artifact's content and
/// description, so storing the same bytes twice under the same
/// description reuses the same filename instead of duplicating it.
fn content_fingerprint(bytes: &[u8], description: &str) -> [u8; 16] {
    use std::hash::Hash;
    use std::hash::Hasher;

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    bytes.hash(&mut hasher);
    description.hash(&mut hasher);
    let digest = hasher.finish();
    let mut id = [0u8; 16];
    id[..8].copy_from_slice(&digest.to_be_bytes());
    id[8..].copy_from_slice(&(bytes.len() as u64).to_be_bytes());
    id
}

/// Renders a local path as a `file://` URI.
fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}
