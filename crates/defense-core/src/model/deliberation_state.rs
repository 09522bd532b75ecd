// defense-core/src/model/deliberation_state.rs
// ============================================================================
// Module: DeliberationState
// Description: The resumable execution state of one project's deliberation.
// Purpose: Let the orchestrator persist and reload where a run left off.
// Dependencies: serde, crate::identifiers, crate::time
// ============================================================================

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::AgentId;
use crate::identifiers::CompanyId;
use crate::identifiers::DecisionLabel;
use crate::identifiers::ProjectId;
use crate::identifiers::RunStatus;
use crate::identifiers::StageId;
use crate::identifiers::TriggerId;
use crate::model::project::Project;
use crate::time::Timestamp;

/// A condensed record of the last [`crate::model::AgentDecision`] rendered
/// for one stage, kept in [`DeliberationState::stage_results`] so a caller
/// can see per-stage progress without reading the full Defense File.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResultSummary {
    /// Agent that rendered the decision.
    pub agent: AgentId,
    /// Decision version this summary reflects, mirroring
    /// [`crate::model::AgentDecision::version`].
    pub version: u32,
    /// The decision label the agent returned.
    pub label: DecisionLabel,
    /// Free-text rationale the agent produced.
    pub rationale: String,
    /// When the decision was recorded.
    pub recorded_at: Timestamp,
}

/// The resumable execution state of a single project's deliberation run.
///
/// # Invariants
/// - `current_stage` is always a stage present in the active stage graph.
/// - `status == Failed` implies `last_error.is_some()`.
/// - `last_trigger_id` is recorded on every `start`/`resume` admission so
///   the orchestrator can detect duplicate triggers and treat them
///   idempotently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliberationState {
    /// Company that owns this deliberation.
    pub company_id: CompanyId,
    /// Project under deliberation.
    pub project_id: ProjectId,
    /// Stage currently executing, or the terminal stage reached.
    pub current_stage: StageId,
    /// Lifecycle status of the run.
    pub status: RunStatus,
    /// Snapshot of the project as submitted, so a `resume` can reconstruct
    /// the in-memory run without the caller re-supplying it.
    pub project_snapshot: Project,
    /// The last recorded decision for every non-terminal stage actually
    /// visited so far, keyed by stage.
    #[serde(default)]
    pub stage_results: HashMap<StageId, StageResultSummary>,
    /// Sanitized, user-visible failure description, set only when
    /// `status == Failed`.
    pub last_error: Option<String>,
    /// Identifier of the most recently admitted trigger, used to make
    /// `start`/`resume` idempotent under retry.
    pub last_trigger_id: Option<TriggerId>,
    /// When this state was first created.
    pub created_at: Timestamp,
    /// When this state was last persisted.
    pub updated_at: Timestamp,
}

impl DeliberationState {
    /// Builds the initial state for a freshly admitted deliberation.
    #[must_use]
    pub fn new(
        company_id: CompanyId,
        project_id: ProjectId,
        project_snapshot: Project,
        entry_stage: StageId,
        trigger_id: TriggerId,
        now: Timestamp,
    ) -> Self {
        Self {
            company_id,
            project_id,
            current_stage: entry_stage,
            status: RunStatus::InProgress,
            project_snapshot,
            stage_results: HashMap::new(),
            last_error: None,
            last_trigger_id: Some(trigger_id),
            created_at: now,
            updated_at: now,
        }
    }

    /// Records the last decision rendered for `stage`, overwriting any
    /// earlier summary for the same stage (only the latest is kept, per
    /// spec.md §3's "last AgentDecision summary").
    pub fn record_stage_result(&mut self, stage: StageId, summary: StageResultSummary) {
        self.stage_results.insert(stage, summary);
    }

    /// Returns the version the next decision rendered for `stage` should
    /// carry: 1 if `stage` has no recorded result yet, or one more than
    /// the last recorded version otherwise.
    #[must_use]
    pub fn next_version_for(&self, stage: StageId) -> u32 {
        self.stage_results.get(&stage).map_or(1, |summary| summary.version + 1)
    }

    /// Returns `true` when the run can accept a `resume` call: it is
    /// `Paused`, or `InProgress` (a resume on an already-running
    /// deliberation is a harmless idempotent no-op), but not `Completed`
    /// or `Failed`.
    #[must_use]
    pub fn is_resumable(&self) -> bool {
        matches!(self.status, RunStatus::Paused | RunStatus::InProgress)
    }
}
