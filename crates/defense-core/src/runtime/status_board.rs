// defense-core/src/runtime/status_board.rs
// ============================================================================
// Module: StatusBoard
// Description: Sharded, in-memory progress tracker for active deliberations.
// Purpose: Let callers poll a project's progress without contending on a
//          single global lock across every project in flight.
// Dependencies: std::sync::Mutex, crate::identifiers
// ============================================================================

use std::collections::HashMap;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Mutex;

use crate::identifiers::AgentId;
use crate::identifiers::CompanyId;
use crate::identifiers::ProjectId;
use crate::identifiers::RunStatus;
use crate::identifiers::StageId;
use crate::time::Timestamp;

/// Where one agent stands relative to the deliberation's current stage,
/// reported per-agent inside [`ProgressRecord::per_agent_statuses`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentProgressStatus {
    /// The agent's stage has not been reached yet.
    Pending,
    /// The agent's stage is the one currently executing.
    Running,
    /// The agent's stage has a recorded decision.
    Done,
    /// The agent's stage is the one the run failed on.
    Failed,
}

/// A snapshot of one project's deliberation progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    /// Stage currently executing, or the terminal stage reached.
    pub stage: StageId,
    /// Lifecycle status of the run.
    pub status: RunStatus,
    /// `(completedStages / totalStages) * 100`, rounded to the nearest
    /// integer, per spec.md §4.8.
    pub progress_percent: u32,
    /// Every registered agent's status relative to `stage`.
    pub per_agent_statuses: HashMap<AgentId, AgentProgressStatus>,
    /// Human-readable summary of the last transition, e.g. "stage
    /// e1_strategy -> e2_fiscal" or "cancelled at stage boundary".
    pub message: String,
    /// When this record was last updated.
    pub updated_at: Timestamp,
    /// Sanitized failure description, set only when `status == Failed`.
    pub error: Option<String>,
}

/// Default shard count; projects are distributed across shards by a simple
/// hash of `(company_id, project_id)`, keeping lock contention proportional
/// to concurrent projects per shard rather than total projects in flight.
const DEFAULT_SHARD_COUNT: usize = 16;

/// Sharded, process-local progress board for active deliberations.
pub struct StatusBoard {
    /// Per-shard progress maps, each behind its own mutex.
    shards: Vec<Mutex<HashMap<(CompanyId, ProjectId), ProgressRecord>>>,
}

impl StatusBoard {
    /// Builds a status board with the default shard count.
    #[must_use]
    pub fn new() -> Self {
        Self::with_shard_count(DEFAULT_SHARD_COUNT)
    }

    /// Builds a status board with an explicit shard count (must be at
    /// least 1; tests may want a single shard for deterministic ordering).
    #[must_use]
    pub fn with_shard_count(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        let mut shards = Vec::with_capacity(shard_count);
        for _ in 0..shard_count {
            shards.push(Mutex::new(HashMap::new()));
        }
        Self { shards }
    }

    /// Records or replaces the progress record for a project.
    ///
    /// # Panics
    ///
    /// Panics if the shard's mutex is poisoned by another panicked holder.
    pub fn update(&self, company_id: &CompanyId, project_id: &ProjectId, record: ProgressRecord) {
        let shard = self.shard_for(company_id, project_id);
        let mut guard = shard.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.insert((company_id.clone(), project_id.clone()), record);
    }

    /// Reads the progress record for a project, if any has been recorded.
    ///
    /// # Panics
    ///
    /// Panics if the shard's mutex is poisoned by another panicked holder.
    #[must_use]
    pub fn get(&self, company_id: &CompanyId, project_id: &ProjectId) -> Option<ProgressRecord> {
        let shard = self.shard_for(company_id, project_id);
        let guard = shard.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.get(&(company_id.clone(), project_id.clone())).cloned()
    }

    /// Selects the shard a `(company_id, project_id)` pair maps to.
    fn shard_for(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
    ) -> &Mutex<HashMap<(CompanyId, ProjectId), ProgressRecord>> {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        company_id.hash(&mut hasher);
        project_id.hash(&mut hasher);
        let shard_count = u64::try_from(self.shards.len()).unwrap_or(1);
        let index = usize::try_from(hasher.finish() % shard_count).unwrap_or(0);
        &self.shards[index]
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
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

    #[test]
    fn records_round_trip_through_the_board() {
        let board = StatusBoard::with_shard_count(4);
        let company = CompanyId::new("acme");
        let project = ProjectId::new("p1");
        board.update(
            &company,
            &project,
            ProgressRecord {
                stage: StageId::E1Strategy,
                status: RunStatus::InProgress,
                progress_percent: 0,
                per_agent_statuses: HashMap::new(),
                message: "deliberation started".to_string(),
                updated_at: Timestamp::from_unix_millis(1),
                error: None,
            },
        );
        let record = board.get(&company, &project).expect("record present");
        assert_eq!(record.stage, StageId::E1Strategy);
    }

    #[test]
    fn unknown_project_has_no_record() {
        let board = StatusBoard::new();
        assert!(board.get(&CompanyId::new("acme"), &ProjectId::new("missing")).is_none());
    }
}
