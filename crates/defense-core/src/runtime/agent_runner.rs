// defense-core/src/runtime/agent_runner.rs
// ============================================================================
// Module: AgentRunner
// Description: Executes a single reviewer agent against a project.
// Purpose: Assemble evidence, call the model (including one tool-use
//          round-trip), and parse its response into a structured
//          AgentDecision.
// Dependencies: crate::interfaces, crate::model, crate::runtime::agent_registry
// ============================================================================

//! ## Overview
//! A stage run has four steps: gather evidence (best-effort; a degraded
//! retrieval backend is logged and the run proceeds without it, per the
//! orchestrator's concurrency model), call the model, resolve at most one
//! round of tool calls the model requests, and parse the final response
//! into a label/rationale/confidence tuple. Parsing is deliberately
//! permissive: a response that cannot be parsed is treated as
//! `request_info` rather than failing the stage outright, since a reviewer
//! that could not make up its mind is exactly what that label means.
//!
//! Each retrieval call is bounded by its own timeout; a model call is
//! retried with exponential backoff up to `timeouts.model_retry_attempts`
//! times before the stage fails, and the whole sequence (all retries and
//! the tool round-trip included) is bounded by a single whole-stage
//! timeout, per spec.md §5.
//!
//! ### Tool use
//! An agent's first model call offers the tools named in its
//! `permitted_tools`, resolved against a [`ToolRegistry`]. If the model
//! responds with tool calls, each is resolved synchronously and appended
//! to the conversation as a `tool`-role message carrying the originating
//! call id, and the model is called exactly once more with the extended
//! transcript. Any tool calls the second response makes are discarded: the
//! round-trip is bounded to one hop, not a recursive agent loop, per
//! spec.md §4.5.

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use thiserror::Error;

use crate::identifiers::AgentId;
use crate::identifiers::CompanyId;
use crate::identifiers::DecisionId;
use crate::identifiers::DecisionLabel;
use crate::identifiers::ProjectId;
use crate::interfaces::model_port::ModelError;
use crate::interfaces::model_port::ModelMessage;
use crate::interfaces::model_port::ModelPort;
use crate::interfaces::model_port::ModelRequest;
use crate::interfaces::model_port::ModelResponse;
use crate::interfaces::retrieval_port::RetrievalError;
use crate::interfaces::retrieval_port::RetrievalPort;
use crate::interfaces::retrieval_port::RetrievalQuery;
use crate::interfaces::tool_registry::EmptyToolRegistry;
use crate::interfaces::tool_registry::ToolRegistry;
use crate::model::project::Project;
use crate::model::retrieval::RetrievalResult;
use crate::model::AgentDecision;
use crate::runtime::agent_registry::AgentDescriptor;
use crate::time::Clock;

/// Errors [`AgentRunner::run_stage`] may return.
#[derive(Debug, Error)]
pub enum AgentRunnerError {
    /// The model call failed or timed out on every retry attempt.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// The whole stage (including retries) exceeded its time budget.
    #[error("stage timed out before the model call could complete")]
    StageTimeout,
}

/// Timeout and retry budget governing a single stage's agent execution,
/// mirroring the three defaults spec.md §5 names: a per-call model
/// timeout, a per-call retrieval timeout, and a whole-stage timeout
/// bounding the sum including retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    /// Per-call `ModelPort` timeout.
    pub model_call: Duration,
    /// Per-call `RetrievalPort` timeout.
    pub retrieval_call: Duration,
    /// Whole-stage timeout, bounding every retry combined.
    pub stage: Duration,
    /// Maximum model-call attempts (1 initial + retries) before the stage
    /// fails.
    pub model_retry_attempts: u32,
}

impl Default for StageTimeouts {
    /// The spec.md §5 defaults: 60s model calls, 10s retrieval calls, a
    /// 120s whole-stage budget, and 3 model-call attempts.
    fn default() -> Self {
        Self {
            model_call: Duration::from_secs(60),
            retrieval_call: Duration::from_secs(10),
            stage: Duration::from_secs(120),
            model_retry_attempts: 3,
        }
    }
}

/// Outcome of running a single agent against a project.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRunOutcome {
    /// The decision record produced.
    pub decision: AgentDecision,
    /// Tokens consumed by the model calls this stage made, for quota
    /// metering by the caller.
    pub tokens_consumed: u64,
}

/// Executes reviewer agents against projects.
pub struct AgentRunner<R, M, C> {
    /// Evidence backend; retrieval failures degrade gracefully.
    retrieval: Arc<R>,
    /// Model backend; model failures propagate to the caller.
    model: Arc<M>,
    /// Clock used to timestamp the resulting decision.
    clock: Arc<C>,
    /// Tool backend resolved against each agent's `permitted_tools`.
    tools: Arc<dyn ToolRegistry>,
    /// Per-call and whole-stage timeout/retry budget.
    timeouts: StageTimeouts,
}

impl<R, M, C> AgentRunner<R, M, C>
where
    R: RetrievalPort,
    M: ModelPort,
    C: Clock,
{
    /// Builds an agent runner over the given retrieval backend, model
    /// backend, and clock, using the default [`StageTimeouts`] and no
    /// available tools.
    pub fn new(retrieval: Arc<R>, model: Arc<M>, clock: Arc<C>) -> Self {
        Self::with_timeouts(retrieval, model, clock, StageTimeouts::default())
    }

    /// Builds an agent runner with an explicit timeout/retry budget and no
    /// available tools.
    pub fn with_timeouts(retrieval: Arc<R>, model: Arc<M>, clock: Arc<C>, timeouts: StageTimeouts) -> Self {
        Self { retrieval, model, clock, tools: Arc::new(EmptyToolRegistry), timeouts }
    }

    /// Builds an agent runner with an explicit timeout/retry budget and
    /// tool registry.
    pub fn with_tools(
        retrieval: Arc<R>,
        model: Arc<M>,
        clock: Arc<C>,
        tools: Arc<dyn ToolRegistry>,
        timeouts: StageTimeouts,
    ) -> Self {
        Self { retrieval, model, clock, tools, timeouts }
    }

    /// Runs `agent` against `project`, returning the decision it rendered.
    ///
    /// The model call is retried with exponential backoff up to
    /// `timeouts.model_retry_attempts` times; the whole sequence (every
    /// retry and the tool round-trip included) is bounded by
    /// `timeouts.stage`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentRunnerError::Model`] when every model call attempt
    /// fails or times out, or [`AgentRunnerError::StageTimeout`] when the
    /// whole-stage budget elapses first. Retrieval failures are absorbed
    /// and the run proceeds without evidence.
    pub async fn run_stage(
        &self,
        agent: &AgentDescriptor,
        company_id: &CompanyId,
        project: &Project,
        project_id: &ProjectId,
        decision_id: DecisionId,
        version: u32,
    ) -> Result<AgentRunOutcome, AgentRunnerError> {
        tokio::time::timeout(
            self.timeouts.stage,
            self.run_stage_unbounded(agent, company_id, project, project_id, decision_id, version),
        )
        .await
        .map_err(|_elapsed| AgentRunnerError::StageTimeout)?
    }

    /// The stage body, without the whole-stage timeout wrapper, so the
    /// timeout can be applied once around retrieval, every model attempt,
    /// the tool round-trip, and parsing together.
    async fn run_stage_unbounded(
        &self,
        agent: &AgentDescriptor,
        company_id: &CompanyId,
        project: &Project,
        project_id: &ProjectId,
        decision_id: DecisionId,
        version: u32,
    ) -> Result<AgentRunOutcome, AgentRunnerError> {
        let started_at = Instant::now();
        let evidence =
            self.gather_evidence(company_id, project_id, &agent.id, project, agent.retrieval_hint.as_deref()).await;
        let tool_specs = self.tools.specs_for(&agent.permitted_tools);
        let mut messages = vec![ModelMessage::user(render_user_prompt(project, &evidence))];

        let request = ModelRequest {
            agent: agent.id.clone(),
            stage: agent.stage,
            system_prompt: agent.system_prompt.clone(),
            messages: messages.clone(),
            tools: tool_specs.clone(),
            max_output_tokens: agent.max_output_tokens,
            temperature: agent.temperature,
        };
        let first = self.call_model_with_retry(&request).await?;
        let mut prompt_tokens = first.prompt_tokens;
        let mut completion_tokens = first.completion_tokens;

        let final_text = if first.tool_calls.is_empty() {
            first.text
        } else {
            messages.push(ModelMessage::assistant(first.text));
            for call in &first.tool_calls {
                let output = match self.tools.resolve(call) {
                    Ok(output) => output,
                    Err(err) => format!("tool call failed: {err}"),
                };
                messages.push(ModelMessage::tool_output(call.id.clone(), output));
            }
            let follow_up = ModelRequest {
                agent: agent.id.clone(),
                stage: agent.stage,
                system_prompt: agent.system_prompt.clone(),
                messages,
                tools: tool_specs,
                max_output_tokens: agent.max_output_tokens,
                temperature: agent.temperature,
            };
            let second = self.call_model_with_retry(&follow_up).await?;
            prompt_tokens += second.prompt_tokens;
            completion_tokens += second.completion_tokens;
            // The second round's own tool calls are discarded: the
            // round-trip is bounded to one hop.
            second.text
        };

        let parsed = parse_response(&final_text);
        let elapsed_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        let decision = AgentDecision {
            id: decision_id,
            stage: agent.stage,
            agent: agent.id.clone(),
            agent_name: agent.display_name.clone(),
            version,
            label: parsed.label,
            rationale: parsed.rationale,
            confidence: parsed.confidence,
            retrieval_refs: evidence,
            prompt_tokens,
            completion_tokens,
            elapsed_ms,
            recorded_at: self.clock.now(),
        };
        let tokens_consumed = prompt_tokens + completion_tokens;
        Ok(AgentRunOutcome { decision, tokens_consumed })
    }

    /// Calls the model port, retrying on timeout or backend failure with
    /// exponential backoff (100ms, 200ms, 400ms, ...) up to
    /// `timeouts.model_retry_attempts` attempts total.
    async fn call_model_with_retry(&self, request: &ModelRequest) -> Result<ModelResponse, AgentRunnerError> {
        let attempts = self.timeouts.model_retry_attempts.max(1);
        let mut last_error = ModelError::Timeout;
        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = Duration::from_millis(100u64.saturating_mul(1u64 << (attempt - 1).min(16)));
                tokio::time::sleep(backoff).await;
            }
            match tokio::time::timeout(self.timeouts.model_call, self.model.call(request)).await {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(err)) => last_error = err,
                Err(_elapsed) => last_error = ModelError::Timeout,
            }
        }
        Err(AgentRunnerError::Model(last_error))
    }

    /// Best-effort evidence gathering: a degraded or unavailable retrieval
    /// backend, or one that does not answer within its own timeout, yields
    /// no evidence rather than failing the stage. `hint`, when present, is
    /// appended to the query text to narrow the search.
    async fn gather_evidence(
        &self,
        company_id: &CompanyId,
        project_id: &ProjectId,
        agent_id: &AgentId,
        project: &Project,
        hint: Option<&str>,
    ) -> Vec<RetrievalResult> {
        let text = hint.map_or_else(
            || project.description.clone(),
            |hint| format!("{} {hint}", project.description),
        );
        let query = RetrievalQuery {
            company_id: company_id.clone(),
            project_id: project_id.clone(),
            agent_id: agent_id.clone(),
            text,
            limit: 5,
        };
        match tokio::time::timeout(self.timeouts.retrieval_call, self.retrieval.query(&query)).await {
            Ok(Ok(results)) => results,
            Ok(Err(RetrievalError::Degraded(reason) | RetrievalError::Unavailable(reason))) => {
                tracing::warn!(project = %project_id, reason, "retrieval unavailable, proceeding without evidence");
                Vec::new()
            }
            Err(_elapsed) => {
                tracing::warn!(project = %project_id, "retrieval timed out, proceeding without evidence");
                Vec::new()
            }
        }
    }
}

/// Renders the user-turn prompt content from project facts plus evidence.
fn render_user_prompt(project: &Project, evidence: &[RetrievalResult]) -> String {
    let mut prompt = format!(
        "Project: {}\nClient: {}\nService type: {}\nSponsor: {} <{}>\nDescription: {}\nAmount: {} {}\n",
        project.name,
        project.client_name,
        project.service_type,
        project.sponsor_name,
        project.sponsor_email,
        project.description,
        project.amount,
        project.currency
    );
    if !evidence.is_empty() {
        prompt.push_str("Evidence:\n");
        for result in evidence {
            prompt.push_str("- ");
            prompt.push_str(&result.excerpt);
            prompt.push('\n');
        }
    }
    prompt
}

/// A parsed, structured form of a model's raw text response.
struct ParsedResponse {
    /// The decision label extracted from the response.
    label: DecisionLabel,
    /// The rationale text (the response minus its header line). This is
    /// the free text the compliance checklist later scans for its pillar
    /// substrings, per spec.md §4.3.
    rationale: String,
    /// Confidence score extracted from the response, if present.
    confidence: Option<f32>,
}

/// Parses a model response of the expected form:
///
/// ```text
/// DECISION: approve
/// CONFIDENCE: 0.82
/// <rationale text...>
/// ```
///
/// Any response that does not contain a recognizable `DECISION:` line is
/// treated as `request_info` with the whole response as rationale, since a
/// reviewer whose answer could not be understood has not, in effect,
/// reached a decision.
fn parse_response(text: &str) -> ParsedResponse {
    let mut label = None;
    let mut confidence = None;
    let mut rationale_lines = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(value) = trimmed.strip_prefix("DECISION:") {
            label = parse_label(value.trim());
        } else if let Some(value) = trimmed.strip_prefix("CONFIDENCE:") {
            confidence = value.trim().parse::<f32>().ok();
        } else {
            rationale_lines.push(line);
        }
    }

    ParsedResponse {
        label: label.unwrap_or(DecisionLabel::RequestInfo),
        rationale: rationale_lines.join("\n").trim().to_string(),
        confidence,
    }
}

/// Parses a `DECISION:` value into a [`DecisionLabel`].
fn parse_label(value: &str) -> Option<DecisionLabel> {
    match value.to_ascii_lowercase().as_str() {
        "approve" => Some(DecisionLabel::Approve),
        "reject" => Some(DecisionLabel::Reject),
        "request_info" | "request-info" => Some(DecisionLabel::RequestInfo),
        _ => None,
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
    fn parses_a_well_formed_response() {
        let parsed = parse_response("DECISION: approve\nCONFIDENCE: 0.9\nLooks solid.");
        assert_eq!(parsed.label, DecisionLabel::Approve);
        assert_eq!(parsed.confidence, Some(0.9));
        assert_eq!(parsed.rationale, "Looks solid.");
    }

    #[test]
    fn unrecognized_response_becomes_request_info() {
        let parsed = parse_response("I am not sure what format you want.");
        assert_eq!(parsed.label, DecisionLabel::RequestInfo);
    }

    use crate::identifiers::StageId;
    use crate::interfaces::model_port::ToolCall;
    use crate::interfaces::tool_registry::ToolError;
    use crate::model::project::Project;
    use crate::time::FixedClock;
    use crate::time::Timestamp;

    /// A [`ModelPort`] that fails `failures_before_success` times, then
    /// succeeds, counting how many calls it received.
    struct FlakyModelPort {
        failures_before_success: usize,
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ModelPort for FlakyModelPort {
        async fn call(&self, _request: &ModelRequest) -> Result<ModelResponse, ModelError> {
            let count = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if count < self.failures_before_success {
                return Err(ModelError::BackendFailure("transient".to_string()));
            }
            Ok(ModelResponse {
                text: "DECISION: approve\nok".to_string(),
                tool_calls: Vec::new(),
                prompt_tokens: 4,
                completion_tokens: 1,
            })
        }
    }

    struct EmptyRetrievalPort;

    #[async_trait::async_trait]
    impl RetrievalPort for EmptyRetrievalPort {
        async fn query(&self, _query: &RetrievalQuery) -> Result<Vec<RetrievalResult>, RetrievalError> {
            Ok(Vec::new())
        }
    }

    /// A [`ModelPort`] that requests one tool call on its first response,
    /// then returns a decision once the tool's output is fed back.
    struct ToolCallingModelPort {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ModelPort for ToolCallingModelPort {
        async fn call(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
            let count = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if count == 0 {
                return Ok(ModelResponse {
                    text: "checking the ledger".to_string(),
                    tool_calls: vec![ToolCall {
                        id: "call-1".to_string(),
                        name: "ledger_lookup".to_string(),
                        arguments: "{}".to_string(),
                    }],
                    prompt_tokens: 10,
                    completion_tokens: 2,
                });
            }
            let saw_tool_output = request.messages.iter().any(|message| message.tool_call_id.as_deref() == Some("call-1"));
            assert!(saw_tool_output, "second call should see the resolved tool output");
            Ok(ModelResponse {
                text: "DECISION: approve\nledger checks out".to_string(),
                tool_calls: Vec::new(),
                prompt_tokens: 12,
                completion_tokens: 3,
            })
        }
    }

    /// A [`ToolRegistry`] offering a single `ledger_lookup` tool.
    struct LedgerToolRegistry;

    impl ToolRegistry for LedgerToolRegistry {
        fn specs_for(&self, names: &[String]) -> Vec<crate::interfaces::model_port::ToolSpec> {
            names
                .iter()
                .filter(|name| name.as_str() == "ledger_lookup")
                .map(|name| crate::interfaces::model_port::ToolSpec {
                    name: name.clone(),
                    description: "Looks up ledger entries.".to_string(),
                })
                .collect()
        }

        fn resolve(&self, call: &ToolCall) -> Result<String, ToolError> {
            if call.name == "ledger_lookup" {
                Ok("ledger: 3 entries, all reconciled".to_string())
            } else {
                Err(ToolError::UnknownTool(call.name.clone()))
            }
        }
    }

    fn sample_agent() -> AgentDescriptor {
        AgentDescriptor {
            id: AgentId::new("a1"),
            stage: StageId::E1Strategy,
            display_name: "Strategy".to_string(),
            system_prompt: "review".to_string(),
            max_output_tokens: 128,
            temperature: 0.2,
            permitted_tools: Vec::new(),
            retrieval_hint: None,
        }
    }

    fn sample_project() -> Project {
        Project {
            id: crate::identifiers::ProjectId::new("p1"),
            company_id: CompanyId::new("acme"),
            created_by: crate::identifiers::UserId::new("u1"),
            name: "Consulting".to_string(),
            client_name: "Acme Client".to_string(),
            description: "Strategic consulting".to_string(),
            amount: bigdecimal::BigDecimal::from(100),
            currency: "USD".to_string(),
            service_type: "consulting".to_string(),
            sponsor_name: "Jane Sponsor".to_string(),
            sponsor_email: "jane@example.com".to_string(),
            submitted_at: crate::time::Timestamp::from_unix_millis(0),
            supporting_context: Vec::new(),
            metadata: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn retries_a_failing_model_call_and_eventually_succeeds() {
        let runner = AgentRunner::with_timeouts(
            Arc::new(EmptyRetrievalPort),
            Arc::new(FlakyModelPort { failures_before_success: 2, calls: std::sync::atomic::AtomicUsize::new(0) }),
            Arc::new(FixedClock(Timestamp::from_unix_millis(0))),
            StageTimeouts {
                model_call: Duration::from_millis(50),
                retrieval_call: Duration::from_millis(50),
                stage: Duration::from_secs(5),
                model_retry_attempts: 3,
            },
        );
        let outcome = runner
            .run_stage(&sample_agent(), &CompanyId::new("acme"), &sample_project(), &crate::identifiers::ProjectId::new("p1"), DecisionId::new("d1"), 1)
            .await
            .expect("eventually succeeds");
        assert_eq!(outcome.decision.label, DecisionLabel::Approve);
        assert_eq!(outcome.tokens_consumed, outcome.decision.prompt_tokens + outcome.decision.completion_tokens);
    }

    #[tokio::test]
    async fn exhausting_retries_surfaces_a_model_error() {
        let runner = AgentRunner::with_timeouts(
            Arc::new(EmptyRetrievalPort),
            Arc::new(FlakyModelPort { failures_before_success: 10, calls: std::sync::atomic::AtomicUsize::new(0) }),
            Arc::new(FixedClock(Timestamp::from_unix_millis(0))),
            StageTimeouts {
                model_call: Duration::from_millis(50),
                retrieval_call: Duration::from_millis(50),
                stage: Duration::from_secs(5),
                model_retry_attempts: 3,
            },
        );
        let result = runner
            .run_stage(&sample_agent(), &CompanyId::new("acme"), &sample_project(), &crate::identifiers::ProjectId::new("p1"), DecisionId::new("d1"), 1)
            .await;
        assert!(matches!(result, Err(AgentRunnerError::Model(_))));
    }

    #[tokio::test]
    async fn a_requested_tool_call_is_resolved_and_fed_back_within_one_extra_round() {
        let agent = AgentDescriptor { permitted_tools: vec!["ledger_lookup".to_string()], ..sample_agent() };
        let runner = AgentRunner::with_tools(
            Arc::new(EmptyRetrievalPort),
            Arc::new(ToolCallingModelPort { calls: std::sync::atomic::AtomicUsize::new(0) }),
            Arc::new(FixedClock(Timestamp::from_unix_millis(0))),
            Arc::new(LedgerToolRegistry),
            StageTimeouts {
                model_call: Duration::from_millis(200),
                retrieval_call: Duration::from_millis(50),
                stage: Duration::from_secs(5),
                model_retry_attempts: 1,
            },
        );
        let outcome = runner
            .run_stage(&agent, &CompanyId::new("acme"), &sample_project(), &crate::identifiers::ProjectId::new("p1"), DecisionId::new("d1"), 1)
            .await
            .expect("tool round-trip succeeds");
        assert_eq!(outcome.decision.label, DecisionLabel::Approve);
        assert_eq!(outcome.decision.prompt_tokens, 22);
        assert_eq!(outcome.decision.completion_tokens, 5);
    }
}
