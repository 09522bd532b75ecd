// defense-broker/src/defense_file_store.rs
// ============================================================================
// Module: Filesystem Defense File Store
// Description: DefenseFileStore backed by one JSON file per project.
// Purpose: Persist the append-only audit trail at
//          `{root}/{companyId}/{projectId}.json`, per spec.md §6, without
//          requiring a SQLite dependency for a document the core only ever
//          reads and appends to wholesale.
// Dependencies: defense-core, tokio, serde_json
// ============================================================================

//! ## Overview
//! Every append is a full read-modify-write of the project's Defense File:
//! load the current file (or start an empty one), push the new decision,
//! serialize, write to a sibling temp file, and rename it into place. A
//! per-`(company_id, project_id)` async mutex serializes concurrent appends
//! to the same project, since the orchestrator may run one stage per
//! project but several projects at once.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use defense_core::AgentDecision;
use defense_core::CompanyId;
use defense_core::DecisionLabel;
use defense_core::DefenseFile;
use defense_core::DefenseFileStore;
use defense_core::DefenseFileStoreError;
use defense_core::NotificationRecord;
use defense_core::Project;
use defense_core::ProjectId;
use defense_core::Timestamp;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Configuration for [`FilesystemDefenseFileStore`].
#[derive(Debug, Clone)]
pub struct FilesystemDefenseFileStoreConfig {
    /// Root directory Defense Files are written under.
    pub root: PathBuf,
}

/// [`DefenseFileStore`] backed by one JSON file per project.
pub struct FilesystemDefenseFileStore {
    root: PathBuf,
    locks: Mutex<HashMap<(CompanyId, ProjectId), Arc<Mutex<()>>>>,
}

impl FilesystemDefenseFileStore {
    /// Creates a store rooted at `config.root`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`DefenseFileStoreError::Io`] when the root cannot be
    /// created.
    pub async fn new(config: FilesystemDefenseFileStoreConfig) -> Result<Self, DefenseFileStoreError> {
        tokio::fs::create_dir_all(&config.root)
            .await
            .map_err(|err| DefenseFileStoreError::Io(err.to_string()))?;
        Ok(Self { root: config.root, locks: Mutex::new(HashMap::new()) })
    }

    fn file_path(&self, company_id: &CompanyId, project_id: &ProjectId) -> PathBuf {
        self.root.join(company_id.as_str()).join(format!("{}.json", project_id.as_str()))
    }

    async fn project_lock(&self, company_id: &CompanyId, project_id: &ProjectId) -> Arc<Mutex<()>> {
        let mut guard = self.locks.lock().await;
        Arc::clone(
            guard
                .entry((company_id.clone(), project_id.clone()))
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    async fn read_file(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
    ) -> Result<DefenseFile, DefenseFileStoreError> {
        let path = self.file_path(company_id, project_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|err| DefenseFileStoreError::Corrupt(format!("{}: {err}", path.display()))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(DefenseFile::new(company_id.clone(), project_id.clone()))
            }
            Err(err) => Err(DefenseFileStoreError::Io(err.to_string())),
        }
    }

    async fn write_file(&self, file: &DefenseFile) -> Result<(), DefenseFileStoreError> {
        let path = self.file_path(&file.company_id, &file.project_id);
        let parent = path.parent().map(Path::to_path_buf);
        if let Some(parent) = &parent {
            tokio::fs::create_dir_all(parent).await.map_err(|err| DefenseFileStoreError::Io(err.to_string()))?;
        }
        let bytes = serde_json::to_vec_pretty(file)
            .map_err(|err| DefenseFileStoreError::Corrupt(format!("encode failed: {err}")))?;
        let temp_path = temp_path_for(&path);

        let mut temp_file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|err| DefenseFileStoreError::Io(err.to_string()))?;
        temp_file.write_all(&bytes).await.map_err(|err| DefenseFileStoreError::Io(err.to_string()))?;
        temp_file.sync_all().await.map_err(|err| DefenseFileStoreError::Io(err.to_string()))?;
        drop(temp_file);

        tokio::fs::rename(&temp_path, &path).await.map_err(|err| DefenseFileStoreError::Io(err.to_string()))?;

        if let Some(parent) = parent {
            let dir = tokio::fs::File::open(&parent).await.map_err(|err| DefenseFileStoreError::Io(err.to_string()))?;
            dir.sync_all().await.map_err(|err| DefenseFileStoreError::Io(err.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl DefenseFileStore for FilesystemDefenseFileStore {
    async fn load(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
    ) -> Result<DefenseFile, DefenseFileStoreError> {
        self.read_file(company_id, project_id).await
    }

    async fn record_project(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
        project: Project,
        recorded_at: Timestamp,
    ) -> Result<DefenseFile, DefenseFileStoreError> {
        let lock = self.project_lock(company_id, project_id).await;
        let _guard = lock.lock().await;
        let mut file = self.read_file(company_id, project_id).await?;
        file.record_project(project, recorded_at);
        self.write_file(&file).await?;
        Ok(file)
    }

    async fn append_decision(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
        decision: AgentDecision,
    ) -> Result<DefenseFile, DefenseFileStoreError> {
        let lock = self.project_lock(company_id, project_id).await;
        let _guard = lock.lock().await;
        let mut file = self.read_file(company_id, project_id).await?;
        file.record_decision(decision);
        self.write_file(&file).await?;
        Ok(file)
    }

    async fn set_final(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
        decision: DecisionLabel,
        rationale: String,
        recorded_at: Timestamp,
    ) -> Result<DefenseFile, DefenseFileStoreError> {
        let lock = self.project_lock(company_id, project_id).await;
        let _guard = lock.lock().await;
        let mut file = self.read_file(company_id, project_id).await?;
        file.set_final(decision, rationale, recorded_at);
        self.write_file(&file).await?;
        Ok(file)
    }

    async fn append_notification(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
        notification: NotificationRecord,
    ) -> Result<DefenseFile, DefenseFileStoreError> {
        let lock = self.project_lock(company_id, project_id).await;
        let _guard = lock.lock().await;
        let mut file = self.read_file(company_id, project_id).await?;
        file.record_notification(notification);
        self.write_file(&file).await?;
        Ok(file)
    }
}

/// A sibling temp path for `path`, used as the write-then-rename target.
fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path.file_name().map_or_else(|| "defense_file".to_string(), |name| name.to_string_lossy().to_string());
    path.with_file_name(format!("{file_name}.tmp"))
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test assertions use expect/unwrap for clarity."
    )]

    use defense_core::AgentId;
    use defense_core::DecisionId;
    use defense_core::DecisionLabel;
    use defense_core::StageId;
    use tempfile::TempDir;

    use super::*;

    fn sample_decision() -> AgentDecision {
        AgentDecision {
            id: DecisionId::new("d1"),
            stage: StageId::E1Strategy,
            agent: AgentId::new("a1_sponsor"),
            agent_name: "Test Agent".to_string(),
            version: 1,
            label: DecisionLabel::Approve,
            rationale: "ok".to_string(),
            confidence: None,
            retrieval_refs: vec![],
            prompt_tokens: 0,
            completion_tokens: 0,
            elapsed_ms: 0,
            recorded_at: defense_core::Timestamp::from_unix_millis(0),
        }
    }

    #[tokio::test]
    async fn load_on_a_fresh_store_returns_an_empty_defense_file() {
        let root = TempDir::new().expect("tempdir");
        let store = FilesystemDefenseFileStore::new(FilesystemDefenseFileStoreConfig {
            root: root.path().to_path_buf(),
        })
        .await
        .expect("store");

        let file = store.load(&CompanyId::new("acme"), &ProjectId::new("p1")).await.expect("load");
        assert!(file.decisions.is_empty());
    }

    #[tokio::test]
    async fn append_decision_persists_across_a_fresh_store_instance() {
        let root = TempDir::new().expect("tempdir");
        let config = FilesystemDefenseFileStoreConfig { root: root.path().to_path_buf() };
        let store = FilesystemDefenseFileStore::new(config.clone()).await.expect("store");

        let company = CompanyId::new("acme");
        let project = ProjectId::new("p1");
        store.append_decision(&company, &project, sample_decision()).await.expect("append");

        let reopened = FilesystemDefenseFileStore::new(config).await.expect("reopen");
        let file = reopened.load(&company, &project).await.expect("load");
        assert_eq!(file.decisions.len(), 1);
    }

    #[tokio::test]
    async fn never_leaves_a_temp_file_behind_after_a_successful_append() {
        let root = TempDir::new().expect("tempdir");
        let store = FilesystemDefenseFileStore::new(FilesystemDefenseFileStoreConfig {
            root: root.path().to_path_buf(),
        })
        .await
        .expect("store");

        store.append_decision(&CompanyId::new("acme"), &ProjectId::new("p1"), sample_decision()).await.expect("append");

        let mut entries = tokio::fs::read_dir(root.path().join("acme")).await.expect("read_dir");
        while let Some(entry) = entries.next_entry().await.expect("next entry") {
            assert!(!entry.file_name().to_string_lossy().ends_with(".tmp"));
        }
    }
}
