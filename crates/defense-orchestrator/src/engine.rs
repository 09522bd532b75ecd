// defense-orchestrator/src/engine.rs
// ============================================================================
// Module: Engine
// Description: Composition root wiring a validated config plus caller-
//              supplied collaborators into a runnable `Orchestrator`.
// Purpose: Give callers one constructor (`build_engine`) instead of forcing
//          them to know the orchestrator's internal collaborator wiring.
// Dependencies: defense-core, defense-config
// ============================================================================

//! ## Overview
//! [`EngineCollaborators`] holds everything a deployment supplies (retrieval,
//! model, clock, the three durable stores, the notifier, the metrics sink);
//! [`build_engine`] combines it with a validated [`defense_config::Wiring`]
//! to produce an [`Engine`], a thin facade over `defense_core::Orchestrator`
//! that validates the incoming project before admission, per the teacher's
//! "validate at the boundary, trust it everywhere after" discipline.

use std::sync::Arc;

use defense_core::AgentRunner;
use defense_core::ArtifactStore;
use defense_core::DefenseFileStore;
use defense_core::DeliberationStateStore;
use defense_core::ModelPort;
use defense_core::Notifier;
use defense_core::Orchestrator;
use defense_core::OrchestratorError;
use defense_core::OrchestratorMetrics;
use defense_core::Project;
use defense_core::ProjectId;
use defense_core::ProjectError;
use defense_core::QuotaGate;
use defense_core::RetrievalPort;
use defense_core::StageTimeouts;
use defense_core::StartOutcome;
use defense_core::StatusBoard;
use defense_core::TenantContext;
use defense_core::ToolRegistry;
use defense_core::TriggerId;
use defense_core::UsageCounterStore;
use defense_core::identifiers::CompanyId;
use defense_core::runtime::ProgressRecord;
use defense_core::time::Clock;
use defense_config::Wiring;
use thiserror::Error;

/// Backends a deployment supplies to complete the wiring `Wiring` cannot
/// describe: ports to the outside world and durable storage.
pub struct EngineCollaborators<R, M, C> {
    /// Retrieval backend reviewer agents query for supporting evidence.
    pub retrieval: Arc<R>,
    /// Model backend that renders each stage's agent decision.
    pub model: Arc<M>,
    /// Clock used to timestamp state transitions.
    pub clock: Arc<C>,
    /// Tool backend resolved against each agent's `permitted_tools`.
    pub tools: Arc<dyn ToolRegistry>,
    /// Durable Defense File storage.
    pub defense_files: Arc<dyn DefenseFileStore>,
    /// Durable deliberation run-state storage.
    pub states: Arc<dyn DeliberationStateStore>,
    /// Durable per-company usage counters backing quota admission.
    pub usage: Arc<dyn UsageCounterStore>,
    /// Outbound status-change notifications.
    pub notifier: Arc<dyn Notifier>,
    /// Metrics sink for stage outcomes and quota denials. Defaults to a
    /// no-op sink when a deployment does not wire one in.
    pub metrics: Arc<dyn OrchestratorMetrics>,
    /// Artifact store for uploaded supporting documents. Not consumed by
    /// the orchestrator itself; carried here so a caller can build both
    /// from the same deployment config and hand the pair to its own
    /// external-interfaces layer.
    pub artifacts: Arc<dyn ArtifactStore>,
}

/// Errors [`Engine::start`] and [`Engine::resume`] may return in addition
/// to the orchestrator's own admission errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The submitted project failed validation before admission.
    #[error(transparent)]
    InvalidProject(#[from] ProjectError),
    /// The orchestrator rejected admission or resumption.
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

/// A ready-to-use deliberation engine: a validated stage graph and agent
/// registry, wired to concrete storage and execution backends.
pub struct Engine<R, M, C> {
    orchestrator: Orchestrator<R, M, C>,
}

impl<R, M, C> Engine<R, M, C>
where
    R: RetrievalPort + 'static,
    M: ModelPort + 'static,
    C: Clock + 'static,
{
    /// Validates `project` and starts a new deliberation for it, or
    /// idempotently no-ops if `trigger_id` matches the last trigger
    /// admitted for this project.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidProject`] when `project` fails
    /// validation, or [`EngineError::Orchestrator`] when admission is
    /// denied.
    pub async fn start(
        &self,
        tenant: &TenantContext,
        project: Project,
        trigger_id: TriggerId,
    ) -> Result<StartOutcome, EngineError> {
        project.validate()?;
        Ok(self.orchestrator.start(tenant, project, trigger_id).await?)
    }

    /// Resumes a paused or in-progress deliberation for `project_id`,
    /// reconstructed from its persisted project snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Orchestrator`] when no resumable deliberation
    /// exists or the tenant does not own it.
    pub async fn resume(
        &self,
        tenant: &TenantContext,
        company_id: &CompanyId,
        project_id: &ProjectId,
    ) -> Result<StartOutcome, EngineError> {
        Ok(self.orchestrator.resume(tenant, company_id, project_id).await?)
    }

    /// Requests cancellation of an in-flight deliberation. Observed at the
    /// next stage boundary, not mid-call.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Orchestrator`] when `tenant` does not own
    /// `company_id`.
    pub fn cancel(
        &self,
        tenant: &TenantContext,
        company_id: &CompanyId,
        project_id: &ProjectId,
    ) -> Result<(), EngineError> {
        Ok(self.orchestrator.cancel(tenant, company_id, project_id)?)
    }

    /// Reads the current progress snapshot for a project, tenant-scoped.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Orchestrator`] when `tenant` does not own
    /// `company_id`.
    pub async fn status(
        &self,
        tenant: &TenantContext,
        company_id: &CompanyId,
        project_id: &ProjectId,
    ) -> Result<Option<ProgressRecord>, EngineError> {
        Ok(self.orchestrator.status(tenant, company_id, project_id).await?)
    }
}

/// Builds a runnable [`Engine`] from a validated config plus the
/// collaborators a deployment supplies.
#[must_use]
pub fn build_engine<R, M, C>(wiring: Wiring, collaborators: EngineCollaborators<R, M, C>) -> Engine<R, M, C>
where
    R: RetrievalPort + 'static,
    M: ModelPort + 'static,
    C: Clock + 'static,
{
    let timeouts: StageTimeouts = wiring.timeouts.into();
    let runner = Arc::new(AgentRunner::with_tools(
        collaborators.retrieval,
        collaborators.model,
        Arc::clone(&collaborators.clock),
        collaborators.tools,
        timeouts,
    ));
    let quota = Arc::new(QuotaGate::new(wiring.plans, collaborators.usage));
    let status_board = Arc::new(StatusBoard::new());

    let orchestrator = Orchestrator::new(
        wiring.registry,
        wiring.graph,
        quota,
        runner,
        collaborators.defense_files,
        collaborators.states,
        status_board,
        collaborators.notifier,
        collaborators.metrics,
        collaborators.clock,
    );

    Engine { orchestrator }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test assertions use expect/unwrap for clarity."
    )]

    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use async_trait::async_trait;
    use bigdecimal::BigDecimal;
    use defense_core::identifiers::StageId;
    use defense_core::identifiers::UserId;
    use defense_core::interfaces::ModelRequest;
    use defense_core::interfaces::ModelResponse;
    use defense_core::interfaces::RetrievalQuery;
    use defense_core::time::FixedClock;
    use defense_core::time::Timestamp;
    use defense_core::InMemoryDefenseFileStore;
    use defense_core::InMemoryDeliberationStateStore;
    use defense_core::InMemoryUsageCounterStore;
    use defense_core::ModelError;
    use defense_core::NoopNotifier;
    use defense_core::NoopOrchestratorMetrics;
    use defense_core::RetrievalError;
    use defense_core::RetrievalResult;
    use defense_config::AgentConfig;
    use defense_config::DeliberationConfig;

    use super::*;

    struct StubRetrieval;

    #[async_trait]
    impl RetrievalPort for StubRetrieval {
        async fn query(&self, _query: &RetrievalQuery) -> Result<Vec<RetrievalResult>, RetrievalError> {
            Ok(Vec::new())
        }
    }

    struct StubModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelPort for StubModel {
        async fn call(&self, _request: &ModelRequest) -> Result<ModelResponse, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ModelResponse {
                text: "DECISION: approve\nlooks fine".to_string(),
                tool_calls: Vec::new(),
                prompt_tokens: 8,
                completion_tokens: 4,
            })
        }
    }

    struct NoopArtifactStore;

    #[async_trait]
    impl ArtifactStore for NoopArtifactStore {
        async fn put(
            &self,
            _company_id: &CompanyId,
            _project_id: &ProjectId,
            _description: &str,
            _bytes: &[u8],
        ) -> Result<defense_core::ArtifactPointer, defense_core::ArtifactStoreError> {
            unreachable!("not exercised by this test")
        }
    }

    fn minimal_config() -> DeliberationConfig {
        DeliberationConfig {
            agents: vec![AgentConfig {
                id: defense_core::AgentId::new("a1_sponsor"),
                stage: StageId::E1Strategy,
                display_name: "Strategy reviewer".to_string(),
                system_prompt: "Review the business case.".to_string(),
                max_output_tokens: 256,
                temperature: 0.2,
                permitted_tools: Vec::new(),
                retrieval_hint: None,
            }],
            ..DeliberationConfig::default()
        }
        .with_single_stage_graph()
    }

    trait SingleStageGraph {
        fn with_single_stage_graph(self) -> DeliberationConfig;
    }

    impl SingleStageGraph for DeliberationConfig {
        fn with_single_stage_graph(mut self) -> DeliberationConfig {
            self.stage_graph.entry_stage = StageId::E1Strategy;
            self.stage_graph.transitions = vec![defense_config::StageTransitionConfig {
                stage: StageId::E1Strategy,
                on_approve: StageId::E5Approved,
                on_reject: StageId::Rejected,
                on_request_info: None,
            }];
            self
        }
    }

    fn build_test_engine() -> Engine<StubRetrieval, StubModel, FixedClock> {
        let wiring = minimal_config().build().expect("valid config");
        let clock = Arc::new(FixedClock(Timestamp::from_unix_millis(0)));
        let collaborators = EngineCollaborators {
            retrieval: Arc::new(StubRetrieval),
            model: Arc::new(StubModel { calls: AtomicUsize::new(0) }),
            clock,
            tools: Arc::new(defense_core::EmptyToolRegistry),
            defense_files: Arc::new(InMemoryDefenseFileStore::new()),
            states: Arc::new(InMemoryDeliberationStateStore::new()),
            usage: Arc::new(InMemoryUsageCounterStore::new()),
            notifier: Arc::new(NoopNotifier),
            metrics: Arc::new(NoopOrchestratorMetrics),
            artifacts: Arc::new(NoopArtifactStore),
        };
        build_engine(wiring, collaborators)
    }

    fn sample_project(project_id: ProjectId, company_id: CompanyId, amount: BigDecimal) -> Project {
        Project {
            id: project_id,
            company_id,
            created_by: UserId::new("u1"),
            name: "Consulting".to_string(),
            client_name: "Acme Client".to_string(),
            description: "Strategy review".to_string(),
            amount,
            currency: "USD".to_string(),
            service_type: "consulting".to_string(),
            sponsor_name: "Jane Sponsor".to_string(),
            sponsor_email: "jane@example.com".to_string(),
            submitted_at: Timestamp::from_unix_millis(0),
            supporting_context: Vec::new(),
            metadata: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn rejects_a_project_with_a_negative_amount_before_admission() {
        let engine = build_test_engine();
        let tenant = TenantContext::scoped(UserId::new("u1"), CompanyId::new("acme"));
        let project = sample_project(ProjectId::new("p1"), CompanyId::new("acme"), BigDecimal::from(-1));
        let trigger = TriggerId::new("t1");
        let result = engine.start(&tenant, project, trigger).await;
        assert!(matches!(result, Err(EngineError::InvalidProject(_))));
    }

    #[tokio::test]
    async fn starts_a_valid_project_and_reports_status() {
        let engine = build_test_engine();
        let tenant = TenantContext::scoped(UserId::new("u1"), CompanyId::new("acme"));
        let company_id = CompanyId::new("acme");
        let project_id = ProjectId::new("p1");
        let project = sample_project(project_id.clone(), company_id.clone(), BigDecimal::from(1000));
        let trigger = TriggerId::new("t1");
        let outcome = engine.start(&tenant, project, trigger).await.expect("start");
        assert_eq!(outcome, StartOutcome::Started);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(engine.status(&tenant, &company_id, &project_id).await.expect("status").is_some());
    }

    #[tokio::test]
    async fn status_denies_a_caller_from_another_company() {
        let engine = build_test_engine();
        let tenant = TenantContext::scoped(UserId::new("u1"), CompanyId::new("acme"));
        let other_tenant = TenantContext::scoped(UserId::new("u2"), CompanyId::new("globex"));
        let company_id = CompanyId::new("acme");
        let project_id = ProjectId::new("p1");
        let project = sample_project(project_id.clone(), company_id.clone(), BigDecimal::from(1000));
        engine.start(&tenant, project, TriggerId::new("t1")).await.expect("start");

        let result = engine.status(&other_tenant, &company_id, &project_id).await;
        assert!(matches!(result, Err(EngineError::Orchestrator(OrchestratorError::Tenant(_)))));
    }
}
