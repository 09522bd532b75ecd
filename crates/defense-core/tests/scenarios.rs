// defense-core/tests/scenarios.rs
// ============================================================================
// Test: Deliberation scenarios
// Description: End-to-end runs of the orchestrator over its in-memory
//              collaborators, covering the happy path, rejection, crash
//              resume, quota exhaustion, tenant isolation, and retrieval
//              degradation.
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use defense_core::identifiers::AgentId;
use defense_core::identifiers::CompanyId;
use defense_core::identifiers::DecisionLabel;
use defense_core::identifiers::ProjectId;
use defense_core::identifiers::RunStatus;
use defense_core::identifiers::StageId;
use defense_core::identifiers::TriggerId;
use defense_core::identifiers::UserId;
use defense_core::runtime::AgentDescriptor;
use defense_core::runtime::AgentRegistry;
use defense_core::runtime::AgentRunner;
use defense_core::runtime::InMemoryDefenseFileStore;
use defense_core::runtime::InMemoryDeliberationStateStore;
use defense_core::runtime::InMemoryUsageCounterStore;
use defense_core::runtime::NoopOrchestratorMetrics;
use defense_core::runtime::Orchestrator;
use defense_core::runtime::OrchestratorError;
use defense_core::Plan;
use defense_core::runtime::QuotaGate;
use defense_core::runtime::QuotaGateError;
use defense_core::runtime::StageGraph;
use defense_core::runtime::StageTransition;
use defense_core::runtime::StartOutcome;
use defense_core::runtime::StaticPlanDirectory;
use defense_core::runtime::StatusBoard;
use defense_core::time::FixedClock;
use defense_core::time::Timestamp;
use defense_core::DefenseFileStore;
use defense_core::DeliberationStateStore;
use defense_core::ModelError;
use defense_core::ModelPort;
use defense_core::ModelRequest;
use defense_core::ModelResponse;
use defense_core::NoopNotifier;
use defense_core::Project;
use defense_core::RetrievalError;
use defense_core::RetrievalPort;
use defense_core::RetrievalQuery;
use defense_core::RetrievalResult;
use defense_core::TenantContext;

/// A [`ModelPort`] scripted per stage: each call pops the next queued
/// response for `request.stage` and records how many times that stage was
/// called, so tests can assert a stage ran exactly once across a resume.
struct ScriptedStageModel {
    queued: Mutex<HashMap<StageId, VecDeque<ModelResponse>>>,
    calls: Mutex<HashMap<StageId, u32>>,
}

impl ScriptedStageModel {
    fn new(scripts: Vec<(StageId, &str)>) -> Self {
        let mut queued: HashMap<StageId, VecDeque<ModelResponse>> = HashMap::new();
        for (stage, text) in scripts {
            queued.entry(stage).or_default().push_back(ModelResponse {
                text: text.to_string(),
                tool_calls: Vec::new(),
                prompt_tokens: 32,
                completion_tokens: 32,
            });
        }
        Self { queued: Mutex::new(queued), calls: Mutex::new(HashMap::new()) }
    }

    fn call_count(&self, stage: StageId) -> u32 {
        *self.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner).get(&stage).unwrap_or(&0)
    }
}

#[async_trait]
impl ModelPort for ScriptedStageModel {
    async fn call(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        *self.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner).entry(request.stage).or_insert(0) += 1;
        let mut guard = self.queued.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard
            .get_mut(&request.stage)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| ModelError::BackendFailure(format!("no scripted response for stage {}", request.stage)))
    }
}

/// A [`RetrievalPort`] that never finds evidence, without failing.
struct EmptyRetrieval;

#[async_trait]
impl RetrievalPort for EmptyRetrieval {
    async fn query(&self, _query: &RetrievalQuery) -> Result<Vec<RetrievalResult>, RetrievalError> {
        Ok(Vec::new())
    }
}

/// A [`RetrievalPort`] that is always degraded, simulating an evidence
/// backend outage; the agent runner must absorb this and proceed.
struct DegradedRetrieval;

#[async_trait]
impl RetrievalPort for DegradedRetrieval {
    async fn query(&self, _query: &RetrievalQuery) -> Result<Vec<RetrievalResult>, RetrievalError> {
        Err(RetrievalError::Unavailable("evidence index is down".to_string()))
    }
}

/// Two-stage registry/graph shared by most scenarios: `E1Strategy` then
/// `E2Fiscal`, either of which may reject straight to `Rejected`.
fn two_stage_registry_and_graph() -> (Arc<AgentRegistry>, Arc<StageGraph>) {
    let registry = AgentRegistry::build(vec![
        AgentDescriptor {
            id: AgentId::new("a1_strategy"),
            stage: StageId::E1Strategy,
            display_name: "Strategy reviewer".to_string(),
            system_prompt: "Review the business case.".to_string(),
            max_output_tokens: 256,
            temperature: 0.2,
            permitted_tools: Vec::new(),
            retrieval_hint: None,
        },
        AgentDescriptor {
            id: AgentId::new("a2_fiscal"),
            stage: StageId::E2Fiscal,
            display_name: "Fiscal reviewer".to_string(),
            system_prompt: "Review fiscal compliance.".to_string(),
            max_output_tokens: 256,
            temperature: 0.2,
            permitted_tools: Vec::new(),
            retrieval_hint: None,
        },
    ])
    .expect("valid registry");

    let graph = StageGraph::build(
        StageId::E1Strategy,
        vec![
            StageTransition {
                stage: StageId::E1Strategy,
                on_approve: StageId::E2Fiscal,
                on_reject: StageId::Rejected,
                on_request_info: None,
            },
            StageTransition {
                stage: StageId::E2Fiscal,
                on_approve: StageId::E5Approved,
                on_reject: StageId::Rejected,
                on_request_info: None,
            },
        ],
        &registry,
    )
    .expect("valid graph");

    (Arc::new(registry), Arc::new(graph))
}

fn sample_project(company: &CompanyId, project: &ProjectId) -> Project {
    Project {
        id: project.clone(),
        company_id: company.clone(),
        created_by: UserId::new("u1"),
        name: "Consulting engagement".to_string(),
        client_name: "Acme Client".to_string(),
        description: "Strategic advisory services for Q3 expansion".to_string(),
        amount: bigdecimal::BigDecimal::from(5000),
        currency: "USD".to_string(),
        service_type: "consulting".to_string(),
        sponsor_name: "Jane Sponsor".to_string(),
        sponsor_email: "jane@example.com".to_string(),
        submitted_at: Timestamp::from_unix_millis(0),
        supporting_context: Vec::new(),
        metadata: serde_json::Map::new(),
    }
}

/// Builds an orchestrator wired with in-memory stores, a model scripted per
/// stage, and an arbitrary plan, over the shared two-stage graph.
fn build_orchestrator<Ret>(
    model: ScriptedStageModel,
    retrieval: Ret,
    plan_assignments: HashMap<CompanyId, Plan>,
) -> (
    Orchestrator<Ret, ScriptedStageModel, FixedClock>,
    Arc<InMemoryDefenseFileStore>,
    Arc<InMemoryDeliberationStateStore>,
    Arc<ScriptedStageModel>,
)
where
    Ret: RetrievalPort + 'static,
{
    let (registry, graph) = two_stage_registry_and_graph();
    let clock = Arc::new(FixedClock(Timestamp::from_unix_millis(0)));
    let quota = Arc::new(QuotaGate::new(
        Arc::new(StaticPlanDirectory::new(plan_assignments)),
        Arc::new(InMemoryUsageCounterStore::new()),
    ));
    let model = Arc::new(model);
    let runner = Arc::new(AgentRunner::new(Arc::new(retrieval), Arc::clone(&model), Arc::clone(&clock)));
    let defense_files = Arc::new(InMemoryDefenseFileStore::new());
    let states = Arc::new(InMemoryDeliberationStateStore::new());
    let status_board = Arc::new(StatusBoard::new());

    let orchestrator = Orchestrator::new(
        registry,
        graph,
        quota,
        runner,
        Arc::clone(&defense_files),
        Arc::clone(&states),
        status_board,
        Arc::new(NoopNotifier),
        Arc::new(NoopOrchestratorMetrics),
        clock,
    );
    (orchestrator, defense_files, states, model)
}

/// Polls `status` until the run reaches a terminal stage or `attempts` is
/// exhausted, yielding briefly between polls so the spawned deliberation
/// task gets a turn to make progress.
async fn wait_for_terminal<R, M, C>(
    orchestrator: &Orchestrator<R, M, C>,
    tenant: &TenantContext,
    company: &CompanyId,
    project: &ProjectId,
) -> defense_core::runtime::ProgressRecord
where
    R: RetrievalPort + 'static,
    M: ModelPort + 'static,
    C: defense_core::time::Clock + 'static,
{
    for _ in 0..200 {
        if let Some(record) = orchestrator.status(tenant, company, project).await.expect("status") {
            if record.stage.is_terminal() || record.status == RunStatus::Failed {
                return record;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("deliberation did not reach a terminal state in time");
}

/// S1: happy path. Both stages approve; the run reaches `E5Approved` with
/// two recorded decisions.
#[tokio::test]
async fn s1_happy_path_reaches_approval_after_both_stages_approve() {
    let company = CompanyId::new("acme");
    let project_id = ProjectId::new("p1");
    let model = ScriptedStageModel::new(vec![
        (StageId::E1Strategy, "DECISION: approve\nDocuments a clear razon de negocios."),
        (StageId::E2Fiscal, "DECISION: approve\nFiscally sound, shows real materialidad."),
    ]);
    let (orchestrator, defense_files, _states, _model) =
        build_orchestrator(model, EmptyRetrieval, HashMap::new());
    let tenant = TenantContext::scoped(UserId::new("u1"), company.clone());

    let outcome = orchestrator
        .start(&tenant, sample_project(&company, &project_id), TriggerId::new("t1"))
        .await
        .expect("start");
    assert_eq!(outcome, StartOutcome::Started);

    let record = wait_for_terminal(&orchestrator, &tenant, &company, &project_id).await;
    assert_eq!(record.stage, StageId::E5Approved);
    assert_eq!(record.status, RunStatus::Completed);

    let file = defense_files.load(&company, &project_id).await.expect("load");
    assert_eq!(file.decisions.len(), 2);
    assert_eq!(file.final_decision, Some(DecisionLabel::Approve));
    assert!(file.compliance_checklist.trazabilidad);
}

/// S2: rejection at the first stage. Only one decision is ever recorded and
/// the run reaches `Rejected` without invoking the second stage's agent.
#[tokio::test]
async fn s2_rejection_at_first_stage_stops_the_run() {
    let company = CompanyId::new("acme");
    let project_id = ProjectId::new("p2");
    let model = ScriptedStageModel::new(vec![(
        StageId::E1Strategy,
        "DECISION: reject\nNo genuine business rationale documented.",
    )]);
    let (orchestrator, defense_files, _states, model) =
        build_orchestrator(model, EmptyRetrieval, HashMap::new());
    let tenant = TenantContext::scoped(UserId::new("u1"), company.clone());

    orchestrator.start(&tenant, sample_project(&company, &project_id), TriggerId::new("t1")).await.expect("start");
    let record = wait_for_terminal(&orchestrator, &tenant, &company, &project_id).await;

    assert_eq!(record.stage, StageId::Rejected);
    let file = defense_files.load(&company, &project_id).await.expect("load");
    assert_eq!(file.decisions.len(), 1);
    assert_eq!(model.call_count(StageId::E2Fiscal), 0);
    assert_eq!(file.final_decision, Some(DecisionLabel::Reject));
    assert_eq!(file.final_rationale.as_deref(), Some("No genuine business rationale documented."));
}

/// S3: resume after a crash. The first stage's decision is already
/// persisted and the state left `InProgress` at `E2Fiscal`, as if the
/// process died after the append but before the task reached the next
/// loop iteration; `resume` picks up from there and the second stage's
/// agent runs exactly once.
#[tokio::test]
async fn s3_resume_runs_the_remaining_stage_exactly_once() {
    let company = CompanyId::new("acme");
    let project_id = ProjectId::new("p3");
    let model = ScriptedStageModel::new(vec![(
        StageId::E2Fiscal,
        "DECISION: approve\nLooks proportionate, clear materialidad.",
    )]);
    let (orchestrator, defense_files, states, model) = build_orchestrator(model, EmptyRetrieval, HashMap::new());
    let tenant = TenantContext::scoped(UserId::new("u1"), company.clone());

    // Seed a Defense File decision and an in-progress state at E2Fiscal, as
    // if E1Strategy had already run before the crash.
    let prior_decision = defense_core::AgentDecision {
        id: defense_core::identifiers::DecisionId::new("p3-e1_strategy"),
        stage: StageId::E1Strategy,
        agent: AgentId::new("a1_strategy"),
        agent_name: "Test Agent".to_string(),
        version: 1,
        label: defense_core::identifiers::DecisionLabel::Approve,
        rationale: "Approved before the crash, documents razon de negocios.".to_string(),
        confidence: None,
        retrieval_refs: vec![],
        prompt_tokens: 0,
        completion_tokens: 0,
        elapsed_ms: 0,
        recorded_at: Timestamp::from_unix_millis(0),
    };
    defense_files.append_decision(&company, &project_id, prior_decision).await.expect("seed decision");

    let seeded_state = defense_core::DeliberationState {
        company_id: company.clone(),
        project_id: project_id.clone(),
        current_stage: StageId::E2Fiscal,
        status: RunStatus::InProgress,
        project_snapshot: sample_project(&company, &project_id),
        stage_results: std::collections::HashMap::new(),
        last_error: None,
        last_trigger_id: Some(TriggerId::new("t1")),
        created_at: Timestamp::from_unix_millis(0),
        updated_at: Timestamp::from_unix_millis(0),
    };
    states.save(&seeded_state).await.expect("seed state");

    let outcome = orchestrator.resume(&tenant, &company, &project_id).await.expect("resume");
    assert_eq!(outcome, StartOutcome::Resumed);

    let record = wait_for_terminal(&orchestrator, &tenant, &company, &project_id).await;
    assert_eq!(record.stage, StageId::E5Approved);

    let file = defense_files.load(&company, &project_id).await.expect("load");
    assert_eq!(file.decisions.len(), 2);
    assert_eq!(model.call_count(StageId::E2Fiscal), 1);

    let final_state = orchestrator.get_state(&tenant, &company, &project_id).await.expect("get_state");
    assert_eq!(final_state.stage_results.len(), 2);
    assert!(final_state.stage_results.contains_key(&StageId::E2Fiscal));
}

/// S4: quota exhaustion. A company on the `free` plan (50 requests/day) is
/// admitted for its first 50 stage runs' worth of admission checks and
/// denied on the 51st.
#[tokio::test]
async fn s4_quota_denies_admission_once_the_free_plans_daily_requests_are_spent() {
    let company = CompanyId::new("acme");
    let quota = QuotaGate::new(
        Arc::new(StaticPlanDirectory::new(HashMap::from([(company.clone(), Plan::Free)]))),
        Arc::new(InMemoryUsageCounterStore::new()),
    );
    let now = Timestamp::from_unix_millis(0);

    for _ in 0..50 {
        quota.admit(&company, 10, now).await.expect("within budget");
    }

    let result = quota.admit(&company, 10, now).await;
    assert!(matches!(result, Err(QuotaGateError::Exceeded { .. })));
}

/// S5: tenant isolation. A caller scoped to a different company than the
/// project gets the same denial whether or not the project exists, and
/// `status`/`get_state`/`cancel` all refuse before touching any state.
#[tokio::test]
async fn s5_a_caller_outside_the_company_is_denied_on_every_entry_point() {
    let company = CompanyId::new("acme");
    let other_company = CompanyId::new("globex");
    let project_id = ProjectId::new("p5");
    let model = ScriptedStageModel::new(vec![(StageId::E1Strategy, "DECISION: approve\nFine.")]);
    let (orchestrator, _defense_files, _states, _model) =
        build_orchestrator(model, EmptyRetrieval, HashMap::new());

    let owner = TenantContext::scoped(UserId::new("u1"), company.clone());
    let intruder = TenantContext::scoped(UserId::new("u2"), other_company);

    orchestrator.start(&owner, sample_project(&company, &project_id), TriggerId::new("t1")).await.expect("start");

    assert!(matches!(
        orchestrator.status(&intruder, &company, &project_id).await,
        Err(OrchestratorError::Tenant(_))
    ));
    assert!(matches!(
        orchestrator.get_state(&intruder, &company, &project_id).await,
        Err(OrchestratorError::Tenant(_))
    ));
    assert!(matches!(orchestrator.cancel(&intruder, &company, &project_id), Err(OrchestratorError::Tenant(_))));

    // An unrelated project the intruder's own company has never touched
    // produces the identical error variant, so a denial reveals nothing
    // about whether the project exists.
    assert!(matches!(
        orchestrator.status(&intruder, &company, &ProjectId::new("does-not-exist")).await,
        Err(OrchestratorError::Tenant(_))
    ));
}

/// S6: retrieval degradation. With the retrieval backend entirely
/// unavailable, the deliberation still completes using no evidence at all.
#[tokio::test]
async fn s6_deliberation_completes_despite_retrieval_outage() {
    let company = CompanyId::new("acme");
    let project_id = ProjectId::new("p6");
    let model = ScriptedStageModel::new(vec![
        (StageId::E1Strategy, "DECISION: approve\nNo evidence needed here."),
        (StageId::E2Fiscal, "DECISION: approve\nStill fine without citations."),
    ]);
    let (orchestrator, defense_files, _states, _model) =
        build_orchestrator(model, DegradedRetrieval, HashMap::new());
    let tenant = TenantContext::scoped(UserId::new("u1"), company.clone());

    orchestrator.start(&tenant, sample_project(&company, &project_id), TriggerId::new("t1")).await.expect("start");
    let record = wait_for_terminal(&orchestrator, &tenant, &company, &project_id).await;

    assert_eq!(record.stage, StageId::E5Approved);
    let file = defense_files.load(&company, &project_id).await.expect("load");
    assert_eq!(file.decisions.len(), 2);
}

/// A caller with an empty `allowed_companies` set and no admin bit is
/// denied even for a company it has never been scoped to, confirming
/// `multi_scoped` contexts degrade to `anonymous`-like denial rather than
/// silently defaulting to allow-all.
#[tokio::test]
async fn an_authenticated_caller_outside_every_scoped_company_is_denied() {
    let caller = TenantContext::multi_scoped(UserId::new("u1"), HashSet::new());
    assert!(!caller.may_access(&CompanyId::new("acme")));
}
