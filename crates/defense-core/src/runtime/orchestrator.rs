// defense-core/src/runtime/orchestrator.rs
// ============================================================================
// Module: Orchestrator
// Description: Drives a project through the stage graph to a terminal state.
// Purpose: The top-level engine tying together tenant isolation, quota
//          admission, agent execution, Defense File persistence, resumable
//          state, and status reporting.
// Dependencies: tokio, crate::interfaces, crate::model, crate::runtime
// ============================================================================

//! ## Overview
//! `start`/`resume` admit a trigger, spawn one supervised `tokio::task` per
//! deliberation, and return immediately; the task advances the project one
//! stage at a time until it reaches a terminal stage, is paused on
//! `request_info`, is cancelled at a stage boundary, or fails. A panic
//! inside the task is caught via the `JoinHandle` and recorded as a failed
//! run rather than propagated to the caller, matching the teacher's
//! "task lifetime is bounded by the unit of work it serves" discipline.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use thiserror::Error;

use crate::identifiers::AgentId;
use crate::identifiers::CompanyId;
use crate::identifiers::DecisionId;
use crate::identifiers::DecisionLabel;
use crate::identifiers::ProjectId;
use crate::identifiers::RunStatus;
use crate::identifiers::StageId;
use crate::identifiers::TriggerId;
use crate::interfaces::artifact_store::DefenseFileStore;
use crate::interfaces::artifact_store::DefenseFileStoreError;
use crate::interfaces::model_port::ModelPort;
use crate::interfaces::notifier::Notifier;
use crate::interfaces::notifier::StatusEvent;
use crate::interfaces::retrieval_port::RetrievalPort;
use crate::interfaces::state_store::DeliberationStateStore;
use crate::interfaces::state_store::StateStoreError;
use crate::model::defense_file::NotificationRecord;
use crate::model::project::Project;
use crate::model::DeliberationState;
use crate::model::StageResultSummary;
use crate::model::TenantContext;
use crate::model::TenantError;
use crate::runtime::agent_registry::AgentRegistry;
use crate::runtime::agent_registry::AgentRegistryError;
use crate::runtime::agent_runner::AgentRunner;
use crate::runtime::agent_runner::AgentRunnerError;
use crate::runtime::metrics::OrchestratorMetrics;
use crate::runtime::metrics::StageOutcome;
use crate::runtime::quota_gate::QuotaGate;
use crate::runtime::stage_graph::StageGraph;
use crate::runtime::stage_graph::StageGraphError;
use crate::runtime::status_board::AgentProgressStatus;
use crate::runtime::status_board::ProgressRecord;
use crate::runtime::status_board::StatusBoard;
use crate::time::Clock;
use crate::time::Timestamp;

/// Errors the orchestrator's admission and control surface may return.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The caller's tenant context is invalid for this company, per
    /// spec.md §4.1's distinct `NotAuthenticated`/`TenantNotAuthorized`
    /// conditions.
    #[error(transparent)]
    Tenant(#[from] TenantError),
    /// No deliberation exists for the requested project.
    #[error("no deliberation found for this project")]
    NotFound,
    /// The deliberation exists but is not in a resumable state.
    #[error("deliberation is not resumable from its current state")]
    NotResumable,
    /// The state store could not be read or written.
    #[error(transparent)]
    State(#[from] StateStoreError),
    /// The Defense File store could not be read or written.
    #[error(transparent)]
    DefenseFile(#[from] DefenseFileStoreError),
    /// The agent registry rejected a lookup.
    #[error(transparent)]
    Registry(#[from] AgentRegistryError),
    /// The stage graph rejected a transition.
    #[error(transparent)]
    Graph(#[from] StageGraphError),
    /// A stage's agent run failed.
    #[error(transparent)]
    AgentRun(#[from] AgentRunnerError),
    /// The deliberation task panicked; its failure has been recorded.
    #[error("deliberation task failed unexpectedly: {0}")]
    Fatal(String),
}

/// Outcome of a `start` or `resume` admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new deliberation task was spawned.
    Started,
    /// The trigger id matched the deliberation's last admitted trigger; the
    /// call was treated as an idempotent no-op rather than starting a
    /// second concurrent run.
    DuplicateTrigger,
    /// An existing paused or in-progress deliberation was resumed.
    Resumed,
}

/// Tracks the cancellation flag for each deliberation task currently
/// spawned by this orchestrator instance.
type CancellationRegistry = Mutex<HashMap<(CompanyId, ProjectId), Arc<AtomicBool>>>;

/// Drives projects through the stage graph, enforcing tenant isolation on
/// every entry point. Quota is admitted once per stage, inside
/// `run_one_stage`, using that stage's own model-call token cost; the
/// token count is only known once the model call has returned, so
/// admission happens immediately after the call and before the decision is
/// persisted, per spec.md §4.2.
pub struct Orchestrator<R, M, C> {
    /// Static agent metadata, validated at startup.
    registry: Arc<AgentRegistry>,
    /// Static stage transition table, validated at startup.
    graph: Arc<StageGraph>,
    /// Per-tenant admission control.
    quota: Arc<QuotaGate>,
    /// Executes one stage's reviewer agent.
    runner: Arc<AgentRunner<R, M, C>>,
    /// Durable Defense File storage.
    defense_files: Arc<dyn DefenseFileStore>,
    /// Durable deliberation run-state storage.
    states: Arc<dyn DeliberationStateStore>,
    /// In-process progress snapshots for polling callers.
    status_board: Arc<StatusBoard>,
    /// Outbound status-change notifications.
    notifier: Arc<dyn Notifier>,
    /// Metrics sink for stage outcomes and quota denials.
    metrics: Arc<dyn OrchestratorMetrics>,
    /// Clock used to timestamp state transitions.
    clock: Arc<C>,
    /// Cancellation flags for deliberation tasks spawned by this instance.
    cancellations: CancellationRegistry,
}

impl<R, M, C> Orchestrator<R, M, C>
where
    R: RetrievalPort + 'static,
    M: ModelPort + 'static,
    C: Clock + 'static,
{
    /// Builds an orchestrator over its collaborators. The registry and
    /// graph should already have been validated against each other via
    /// [`StageGraph::build`].
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<AgentRegistry>,
        graph: Arc<StageGraph>,
        quota: Arc<QuotaGate>,
        runner: Arc<AgentRunner<R, M, C>>,
        defense_files: Arc<dyn DefenseFileStore>,
        states: Arc<dyn DeliberationStateStore>,
        status_board: Arc<StatusBoard>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<dyn OrchestratorMetrics>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            registry,
            graph,
            quota,
            runner,
            defense_files,
            states,
            status_board,
            notifier,
            metrics,
            clock,
            cancellations: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a new deliberation for `project`, or idempotently no-ops if
    /// `trigger_id` matches the last trigger admitted for this project.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Tenant`] when `tenant` does not own
    /// `project.company_id`, or a store/registry/graph error from
    /// admission-time validation. Quota is checked per stage once the
    /// deliberation is running, not here.
    pub async fn start(
        &self,
        tenant: &TenantContext,
        project: Project,
        trigger_id: TriggerId,
    ) -> Result<StartOutcome, OrchestratorError> {
        tenant.authorize(&project.company_id)?;
        let company_id = project.company_id.clone();
        let project_id = project.id.clone();

        if let Some(existing) = self.states.load(&company_id, &project_id).await? {
            if existing.last_trigger_id.as_ref() == Some(&trigger_id) {
                return Ok(StartOutcome::DuplicateTrigger);
            }
        }

        let now = self.clock.now();
        let entry_stage = self.graph.entry_stage();

        let state = DeliberationState::new(
            company_id.clone(),
            project_id.clone(),
            project.clone(),
            entry_stage,
            trigger_id,
            now,
        );
        self.states.save(&state).await?;
        self.defense_files.record_project(&company_id, &project_id, project.clone(), now).await?;
        self.status_board.update(
            &company_id,
            &project_id,
            progress_record_for(
                &self.registry,
                &self.graph,
                &state,
                RunStatus::InProgress,
                "deliberation started".to_string(),
                None,
                now,
            ),
        );

        self.spawn_run(company_id, project_id, project);
        Ok(StartOutcome::Started)
    }

    /// Resumes a paused or in-progress deliberation for `project_id`,
    /// reconstructing the in-memory run from the persisted
    /// [`DeliberationState::project_snapshot`] rather than requiring the
    /// caller to re-supply the project.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::NotFound`] when no state exists,
    /// [`OrchestratorError::NotResumable`] when the run is `Completed` or
    /// `Failed`, or [`OrchestratorError::Tenant`] for a tenant mismatch.
    pub async fn resume(
        &self,
        tenant: &TenantContext,
        company_id: &CompanyId,
        project_id: &ProjectId,
    ) -> Result<StartOutcome, OrchestratorError> {
        tenant.authorize(company_id)?;
        let state = self.states.load(company_id, project_id).await?.ok_or(OrchestratorError::NotFound)?;
        if !state.is_resumable() {
            return Err(OrchestratorError::NotResumable);
        }
        let project = state.project_snapshot.clone();
        self.spawn_run(company_id.clone(), project_id.clone(), project);
        Ok(StartOutcome::Resumed)
    }

    /// Requests cancellation of an in-flight deliberation. Cancellation is
    /// observed at the next stage boundary, not mid-call; a deliberation
    /// that has already finished is a harmless no-op.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Tenant`] when `tenant` does not own
    /// `company_id`. Per spec.md §8's tenant-leakage prevention, this
    /// check is performed before the cancellation registry is consulted,
    /// so a mismatched tenant learns nothing about whether the project
    /// exists.
    pub fn cancel(
        &self,
        tenant: &TenantContext,
        company_id: &CompanyId,
        project_id: &ProjectId,
    ) -> Result<(), OrchestratorError> {
        tenant.authorize(company_id)?;
        let guard = self.cancellations.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(flag) = guard.get(&(company_id.clone(), project_id.clone())) {
            flag.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Reads the current progress snapshot for a project, tenant-scoped.
    ///
    /// Falls back to the persisted [`DeliberationState`] (rendered as a
    /// [`ProgressRecord`]) when no in-memory record exists, e.g. right
    /// after a process restart before the task has reported its first
    /// stage completion, per spec.md §4.8.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Tenant`] when `tenant` does not own
    /// `company_id`; a tenant mismatch never reveals whether the project
    /// exists under another company (spec.md §8).
    pub async fn status(
        &self,
        tenant: &TenantContext,
        company_id: &CompanyId,
        project_id: &ProjectId,
    ) -> Result<Option<ProgressRecord>, OrchestratorError> {
        tenant.authorize(company_id)?;
        if let Some(record) = self.status_board.get(company_id, project_id) {
            return Ok(Some(record));
        }
        let state = self.states.load(company_id, project_id).await?;
        Ok(state.map(|state| {
            let updated_at = state.updated_at;
            let status = state.status;
            let message = "restored from persisted state".to_string();
            let error = state.last_error.clone();
            progress_record_for(&self.registry, &self.graph, &state, status, message, error, updated_at)
        }))
    }

    /// Reads the persisted deliberation state for a project, tenant-scoped.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Tenant`] when `tenant` does not own
    /// `company_id`, or [`OrchestratorError::NotFound`] when no
    /// deliberation exists for `project_id` under that company — the same
    /// response whether the project truly does not exist or merely exists
    /// under a different tenant (spec.md §7 `NotFound`, tenant-leakage
    /// prevention).
    pub async fn get_state(
        &self,
        tenant: &TenantContext,
        company_id: &CompanyId,
        project_id: &ProjectId,
    ) -> Result<DeliberationState, OrchestratorError> {
        tenant.authorize(company_id)?;
        self.states.load(company_id, project_id).await?.ok_or(OrchestratorError::NotFound)
    }

    /// Spawns the supervised task that advances one project's deliberation.
    fn spawn_run(&self, company_id: CompanyId, project_id: ProjectId, project: Project) {
        let cancel_flag = Arc::new(AtomicBool::new(false));
        {
            let mut guard = self.cancellations.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            guard.insert((company_id.clone(), project_id.clone()), Arc::clone(&cancel_flag));
        }

        let registry = Arc::clone(&self.registry);
        let graph = Arc::clone(&self.graph);
        let quota = Arc::clone(&self.quota);
        let runner = Arc::clone(&self.runner);
        let defense_files = Arc::clone(&self.defense_files);
        let states = Arc::clone(&self.states);
        let status_board = Arc::clone(&self.status_board);
        let notifier = Arc::clone(&self.notifier);
        let metrics = Arc::clone(&self.metrics);
        let clock = Arc::clone(&self.clock);

        let handle = tokio::spawn(async move {
            drive_deliberation(
                DriveContext {
                    registry,
                    graph,
                    quota,
                    runner,
                    defense_files,
                    states,
                    status_board,
                    notifier,
                    metrics,
                    clock,
                    cancel_flag,
                },
                company_id,
                project_id,
                project,
            )
            .await;
        });
        // Detach: the task reports its own terminal/failed status through
        // the state store and status board, so the caller does not need to
        // hold the handle. Dropping it does not cancel the task.
        drop(handle);
    }
}

/// Collaborators a single deliberation-driving task needs, bundled so
/// `spawn_run` stays readable.
struct DriveContext<R, M, C> {
    /// Static agent metadata, validated at startup.
    registry: Arc<AgentRegistry>,
    /// Static stage transition table, validated at startup.
    graph: Arc<StageGraph>,
    /// Per-tenant admission control, checked once per stage with that
    /// stage's own token cost.
    quota: Arc<QuotaGate>,
    /// Executes one stage's reviewer agent.
    runner: Arc<AgentRunner<R, M, C>>,
    /// Durable Defense File storage.
    defense_files: Arc<dyn DefenseFileStore>,
    /// Durable deliberation run-state storage.
    states: Arc<dyn DeliberationStateStore>,
    /// In-process progress snapshots for polling callers.
    status_board: Arc<StatusBoard>,
    /// Outbound status-change notifications.
    notifier: Arc<dyn Notifier>,
    /// Metrics sink for stage outcomes and quota denials.
    metrics: Arc<dyn OrchestratorMetrics>,
    /// Clock used to timestamp state transitions.
    clock: Arc<C>,
    /// Set by [`Orchestrator::cancel`]; polled at stage boundaries.
    cancel_flag: Arc<AtomicBool>,
}

/// Drives a single project through the stage graph until it reaches a
/// terminal stage, pauses on `request_info`, is cancelled, or fails.
///
/// Failures are absorbed here rather than propagated: this function runs
/// inside a detached `tokio::task`, so the only way its outcome reaches the
/// rest of the system is through the state store, status board, and
/// notifier it is given.
async fn drive_deliberation<R, M, C>(
    ctx: DriveContext<R, M, C>,
    company_id: CompanyId,
    project_id: ProjectId,
    project: Project,
) where
    R: RetrievalPort,
    M: ModelPort,
    C: Clock,
{
    loop {
        if ctx.cancel_flag.load(Ordering::SeqCst) {
            let now = ctx.clock.now();
            if let Ok(Some(mut state)) = ctx.states.load(&company_id, &project_id).await {
                state.status = RunStatus::Paused;
                state.updated_at = now;
                let _ignored = ctx.states.save(&state).await;
                ctx.status_board.update(
                    &company_id,
                    &project_id,
                    progress_record_for(
                        &ctx.registry,
                        &ctx.graph,
                        &state,
                        RunStatus::Paused,
                        "cancelled at stage boundary".to_string(),
                        None,
                        now,
                    ),
                );
            }
            return;
        }

        let mut state = match ctx.states.load(&company_id, &project_id).await {
            Ok(Some(state)) => state,
            _ => return,
        };

        if state.current_stage.is_terminal() {
            return;
        }

        let version = state.next_version_for(state.current_stage);
        let outcome = run_one_stage(&ctx, &company_id, &project_id, &project, state.current_stage, version).await;
        let now = ctx.clock.now();

        match outcome {
            Ok(StageRunOutcome { next_stage, agent, version, decision_label, rationale }) => {
                let previous_stage = state.current_stage;
                let advanced = next_stage != previous_stage;
                state.record_stage_result(
                    previous_stage,
                    StageResultSummary { agent, version, label: decision_label, rationale: rationale.clone(), recorded_at: now },
                );
                state.current_stage = next_stage;
                state.status = if next_stage.is_terminal() { RunStatus::Completed } else { RunStatus::InProgress };
                state.last_error = None;
                state.updated_at = now;
                let _ignored = ctx.states.save(&state).await;
                let summary = format!("stage {previous_stage} -> {next_stage}");
                ctx.status_board.update(
                    &company_id,
                    &project_id,
                    progress_record_for(&ctx.registry, &ctx.graph, &state, state.status, summary.clone(), None, now),
                );
                let _ignored = ctx
                    .notifier
                    .notify(&StatusEvent {
                        company_id: company_id.clone(),
                        project_id: project_id.clone(),
                        stage: next_stage,
                        status: state.status,
                        summary: summary.clone(),
                    })
                    .await;
                let _ignored = ctx
                    .defense_files
                    .append_notification(
                        &company_id,
                        &project_id,
                        NotificationRecord { stage: next_stage, summary, recorded_at: now },
                    )
                    .await;
                if next_stage.is_terminal() {
                    let _ignored = ctx
                        .defense_files
                        .set_final(&company_id, &project_id, decision_label, rationale, now)
                        .await;
                }
                let stage_outcome = if next_stage == StageId::Rejected {
                    StageOutcome::Rejected
                } else if advanced {
                    StageOutcome::Advanced
                } else {
                    StageOutcome::Paused
                };
                ctx.metrics.record_stage(previous_stage, stage_outcome, 0);

                if !advanced {
                    // request_info with no destination: pause for more input.
                    state.status = RunStatus::Paused;
                    let _ignored = ctx.states.save(&state).await;
                    return;
                }
                if next_stage.is_terminal() {
                    return;
                }
            }
            Err(reason) => {
                state.status = RunStatus::Failed;
                state.last_error = Some(reason);
                state.updated_at = now;
                let _ignored = ctx.states.save(&state).await;
                ctx.status_board.update(
                    &company_id,
                    &project_id,
                    progress_record_for(
                        &ctx.registry,
                        &ctx.graph,
                        &state,
                        RunStatus::Failed,
                        "stage failed".to_string(),
                        state.last_error.clone(),
                        now,
                    ),
                );
                ctx.metrics.record_stage(state.current_stage, StageOutcome::Failed, 0);
                return;
            }
        }
    }
}

/// Builds the [`ProgressRecord`] published to the [`StatusBoard`] after
/// every state transition, per spec.md §4.8's
/// `{status, stage, progressPercent, perAgentStatuses, message, updatedAt, error?}`.
fn progress_record_for(
    registry: &AgentRegistry,
    graph: &StageGraph,
    state: &DeliberationState,
    status: RunStatus,
    message: String,
    error: Option<String>,
    now: Timestamp,
) -> ProgressRecord {
    let total_stages = u32::try_from(graph.stage_count()).unwrap_or(u32::MAX).max(1);
    let completed_stages = u32::try_from(state.stage_results.len()).unwrap_or(u32::MAX);
    let progress_percent = (completed_stages.saturating_mul(100) + total_stages / 2) / total_stages;
    let per_agent_statuses = registry
        .all()
        .map(|agent| {
            let agent_status = if state.stage_results.contains_key(&agent.stage) {
                AgentProgressStatus::Done
            } else if agent.stage == state.current_stage {
                if matches!(status, RunStatus::Failed) {
                    AgentProgressStatus::Failed
                } else {
                    AgentProgressStatus::Running
                }
            } else {
                AgentProgressStatus::Pending
            };
            (agent.id.clone(), agent_status)
        })
        .collect();
    ProgressRecord { stage: state.current_stage, status, progress_percent, per_agent_statuses, message, updated_at: now, error }
}

/// The resolved next stage plus the decision that justified it, so the
/// caller can record a terminal decision on the Defense File without a
/// second lookup.
struct StageRunOutcome {
    /// The stage the graph transitions to after this decision.
    next_stage: StageId,
    /// The agent that rendered the decision.
    agent: AgentId,
    /// The decision version this outcome reflects.
    version: u32,
    /// The label the agent returned for this stage.
    decision_label: DecisionLabel,
    /// The rationale the agent returned for this stage.
    rationale: String,
}

/// Runs the agent registered for `stage`, records its decision, and
/// resolves the next stage. Returns a sanitized error string (no internal
/// detail) on failure, per the Defense File's user-visible failure
/// contract.
async fn run_one_stage<R, M, C>(
    ctx: &DriveContext<R, M, C>,
    company_id: &CompanyId,
    project_id: &ProjectId,
    project: &Project,
    stage: StageId,
    version: u32,
) -> Result<StageRunOutcome, String>
where
    R: RetrievalPort,
    M: ModelPort,
    C: Clock,
{
    let agent = ctx.registry.get_for_stage(stage).map_err(|_| "no agent registered for this stage".to_string())?;

    let decision_id = DecisionId::new(format!("{project_id}-{stage}"));
    let run_outcome = ctx
        .runner
        .run_stage(agent, company_id, project, project_id, decision_id, version)
        .await
        .map_err(|_| "agent review failed".to_string())?;

    let now = ctx.clock.now();
    if ctx.quota.admit(company_id, run_outcome.tokens_consumed, now).await.is_err() {
        ctx.metrics.record_quota_denied();
        return Err("quota exceeded for this company".to_string());
    }

    ctx.defense_files
        .append_decision(company_id, project_id, run_outcome.decision.clone())
        .await
        .map_err(|_| "could not persist decision".to_string())?;

    let next_stage = ctx
        .graph
        .next_stage(stage, run_outcome.decision.label)
        .map_err(|_| "invalid stage transition".to_string())?;

    Ok(StageRunOutcome {
        next_stage,
        agent: run_outcome.decision.agent.clone(),
        version: run_outcome.decision.version,
        decision_label: run_outcome.decision.label,
        rationale: run_outcome.decision.rationale.clone(),
    })
}
