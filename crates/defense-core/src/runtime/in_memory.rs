// defense-core/src/runtime/in_memory.rs
// ============================================================================
// Module: In-memory store fakes
// Description: Process-local implementations of the three store traits.
// Purpose: Exercise the orchestrator in tests without a SQLite/filesystem
//          dependency, mirroring the teacher's InMemoryRunStateStore.
// Dependencies: std::sync::Mutex, crate::interfaces, crate::model
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::identifiers::CompanyId;
use crate::identifiers::DecisionLabel;
use crate::identifiers::ProjectId;
use crate::interfaces::artifact_store::DefenseFileStore;
use crate::interfaces::artifact_store::DefenseFileStoreError;
use crate::interfaces::state_store::DeliberationStateStore;
use crate::interfaces::state_store::StateStoreError;
use crate::interfaces::usage_store::QuotaAdmission;
use crate::interfaces::usage_store::UsageCounterStore;
use crate::interfaces::usage_store::UsageStoreError;
use crate::model::defense_file::NotificationRecord;
use crate::model::project::Project;
use crate::model::AgentDecision;
use crate::model::DefenseFile;
use crate::model::DeliberationState;
use crate::model::UsageCounter;
use crate::time::Timestamp;

/// An in-memory [`DefenseFileStore`], keyed by `(company_id, project_id)`.
#[derive(Debug, Default)]
pub struct InMemoryDefenseFileStore {
    files: Mutex<HashMap<(CompanyId, ProjectId), DefenseFile>>,
}

impl InMemoryDefenseFileStore {
    /// Builds an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DefenseFileStore for InMemoryDefenseFileStore {
    async fn load(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
    ) -> Result<DefenseFile, DefenseFileStoreError> {
        let guard = self.files.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(guard
            .get(&(company_id.clone(), project_id.clone()))
            .cloned()
            .unwrap_or_else(|| DefenseFile::new(company_id.clone(), project_id.clone())))
    }

    async fn record_project(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
        project: Project,
        recorded_at: Timestamp,
    ) -> Result<DefenseFile, DefenseFileStoreError> {
        let mut guard = self.files.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let key = (company_id.clone(), project_id.clone());
        let mut file = guard
            .get(&key)
            .cloned()
            .unwrap_or_else(|| DefenseFile::new(company_id.clone(), project_id.clone()));
        file.record_project(project, recorded_at);
        guard.insert(key, file.clone());
        Ok(file)
    }

    async fn append_decision(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
        decision: AgentDecision,
    ) -> Result<DefenseFile, DefenseFileStoreError> {
        let mut guard = self.files.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let key = (company_id.clone(), project_id.clone());
        let mut file = guard
            .get(&key)
            .cloned()
            .unwrap_or_else(|| DefenseFile::new(company_id.clone(), project_id.clone()));
        file.record_decision(decision);
        guard.insert(key, file.clone());
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
        let mut guard = self.files.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let key = (company_id.clone(), project_id.clone());
        let mut file = guard
            .get(&key)
            .cloned()
            .unwrap_or_else(|| DefenseFile::new(company_id.clone(), project_id.clone()));
        file.set_final(decision, rationale, recorded_at);
        guard.insert(key, file.clone());
        Ok(file)
    }

    async fn append_notification(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
        notification: NotificationRecord,
    ) -> Result<DefenseFile, DefenseFileStoreError> {
        let mut guard = self.files.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let key = (company_id.clone(), project_id.clone());
        let mut file = guard
            .get(&key)
            .cloned()
            .unwrap_or_else(|| DefenseFile::new(company_id.clone(), project_id.clone()));
        file.record_notification(notification);
        guard.insert(key, file.clone());
        Ok(file)
    }
}

/// An in-memory [`DeliberationStateStore`], keyed by `(company_id, project_id)`.
#[derive(Debug, Default)]
pub struct InMemoryDeliberationStateStore {
    states: Mutex<HashMap<(CompanyId, ProjectId), DeliberationState>>,
}

impl InMemoryDeliberationStateStore {
    /// Builds an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeliberationStateStore for InMemoryDeliberationStateStore {
    async fn load(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
    ) -> Result<Option<DeliberationState>, StateStoreError> {
        let guard = self.states.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(guard.get(&(company_id.clone(), project_id.clone())).cloned())
    }

    async fn save(&self, state: &DeliberationState) -> Result<(), StateStoreError> {
        let mut guard = self.states.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.insert((state.company_id.clone(), state.project_id.clone()), state.clone());
        Ok(())
    }
}

/// An in-memory [`UsageCounterStore`], one UTC-calendar-day counter per
/// company.
#[derive(Debug, Default)]
pub struct InMemoryUsageCounterStore {
    counters: Mutex<HashMap<CompanyId, UsageCounter>>,
}

impl InMemoryUsageCounterStore {
    /// Builds an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageCounterStore for InMemoryUsageCounterStore {
    async fn check_and_increment(
        &self,
        company_id: &CompanyId,
        requested_tokens: u64,
        limits_requests_per_day: u64,
        limits_tokens_per_day: u64,
        now: Timestamp,
    ) -> Result<QuotaAdmission, UsageStoreError> {
        let mut guard = self.counters.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let counter = guard
            .entry(company_id.clone())
            .or_insert_with(|| UsageCounter::new(company_id.clone(), now));
        if !counter.is_same_utc_day(now) {
            *counter = UsageCounter::new(company_id.clone(), now);
        }
        let would_admit = counter.requests + 1 <= limits_requests_per_day
            && counter.tokens + requested_tokens <= limits_tokens_per_day;
        if would_admit {
            counter.requests += 1;
            counter.tokens += requested_tokens;
            counter.updated_at = now;
        }
        Ok(QuotaAdmission { admitted: would_admit, requests_used: counter.requests, tokens_used: counter.tokens })
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test assertions use expect/unwrap for clarity."
    )]

    use super::*;
    use crate::identifiers::AgentId;
    use crate::identifiers::DecisionId;
    use crate::identifiers::DecisionLabel;
    use crate::identifiers::StageId;

    #[tokio::test]
    async fn defense_file_store_starts_empty_and_accumulates_decisions() {
        let store = InMemoryDefenseFileStore::new();
        let company = CompanyId::new("acme");
        let project = ProjectId::new("p1");
        let loaded = store.load(&company, &project).await.expect("load");
        assert!(loaded.decisions.is_empty());

        let decision = AgentDecision {
            id: DecisionId::new("d1"),
            stage: StageId::E1Strategy,
            agent: AgentId::new("a1"),
            agent_name: "Test Agent".to_string(),
            version: 1,
            label: DecisionLabel::Approve,
            rationale: "ok".to_string(),
            confidence: None,
            retrieval_refs: vec![],
            prompt_tokens: 0,
            completion_tokens: 0,
            elapsed_ms: 0,
            recorded_at: Timestamp::from_unix_millis(0),
        };
        let file = store.append_decision(&company, &project, decision).await.expect("append");
        assert_eq!(file.decisions.len(), 1);
    }

    #[tokio::test]
    async fn usage_store_denies_once_the_request_limit_is_reached() {
        let store = InMemoryUsageCounterStore::new();
        let company = CompanyId::new("acme");
        let now = Timestamp::from_unix_millis(0);
        let first = store.check_and_increment(&company, 10, 1, 1000, now).await.expect("first");
        assert!(first.admitted);
        let second = store.check_and_increment(&company, 10, 1, 1000, now).await.expect("second");
        assert!(!second.admitted);
    }
}
