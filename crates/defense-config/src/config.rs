// defense-config/src/config.rs
// ============================================================================
// Module: DeliberationConfig
// Description: The deployment-level configuration for a deliberation core:
//              agent descriptors, the stage graph, plan assignments, timeouts
//              and the Defense File root directory.
// Purpose: Load and validate a TOML file into the concrete `defense-core`
//          runtime values, failing fast at load time rather than at first
//          deliberation.
// Dependencies: defense-core, serde, toml, std::fs
// ============================================================================

//! ## Overview
//! `defense-config` mirrors the teacher's "strict, fail-closed config
//! parsing" discipline: every field has a sane default via `#[serde(default)]`,
//! and [`DeliberationConfig::build`] validates the whole document once —
//! duplicate agents, a stage graph that references an unregistered agent,
//! an empty Defense File root — and turns it into the runtime values
//! `defense-orchestrator`'s composition root wires together.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use defense_core::AgentDescriptor;
use defense_core::AgentId;
use defense_core::AgentRegistry;
use defense_core::CompanyId;
use defense_core::Plan;
use defense_core::StageGraph;
use defense_core::StageId;
use defense_core::StageTransition;
use defense_core::StaticPlanDirectory;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigError;
use crate::timeouts::Timeouts;

/// Static metadata for one reviewer agent, as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Identifier of this agent (e.g. `"A1_SPONSOR"`).
    pub id: AgentId,
    /// Stage this agent reviews.
    pub stage: StageId,
    /// Human-readable name shown in the Defense File and status reports.
    pub display_name: String,
    /// System prompt describing the agent's role and required decision
    /// format.
    pub system_prompt: String,
    /// Maximum tokens the agent's model call may generate.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Sampling temperature passed to every model call this agent makes.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Names of tools this agent may call during its stage.
    #[serde(default)]
    pub permitted_tools: Vec<String>,
    /// Hint appended to the retrieval query this agent's stage issues.
    #[serde(default)]
    pub retrieval_hint: Option<String>,
}

/// Default completion budget for an agent whose config omits one.
const fn default_max_output_tokens() -> u32 {
    768
}

const fn default_temperature() -> f32 {
    0.2
}

/// One stage's transition rule, as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransitionConfig {
    /// The stage this transition applies to.
    pub stage: StageId,
    /// Next stage on `approve`.
    pub on_approve: StageId,
    /// Next stage on `reject`.
    pub on_reject: StageId,
    /// Next stage on `request_info`; absent means "stay on this stage."
    #[serde(default)]
    pub on_request_info: Option<StageId>,
}

impl From<StageTransitionConfig> for StageTransition {
    fn from(value: StageTransitionConfig) -> Self {
        Self {
            stage: value.stage,
            on_approve: value.on_approve,
            on_reject: value.on_reject,
            on_request_info: value.on_request_info,
        }
    }
}

/// A single company's assigned subscription tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanAssignment {
    /// Company the assignment applies to.
    pub company: String,
    /// Plan tier assigned to the company.
    pub plan: Plan,
}

/// The full stage graph section of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageGraphConfig {
    /// The stage a new deliberation enters at.
    pub entry_stage: StageId,
    /// Transition table, one entry per non-terminal stage.
    pub transitions: Vec<StageTransitionConfig>,
}

impl Default for StageGraphConfig {
    /// The reference pipeline named in spec.md §3:
    /// `E1_STRATEGY -> E2_FISCAL -> E3_FINANCE -> E4_LEGAL -> E5_APPROVED`.
    fn default() -> Self {
        Self {
            entry_stage: StageId::E1Strategy,
            transitions: vec![
                StageTransitionConfig {
                    stage: StageId::E1Strategy,
                    on_approve: StageId::E2Fiscal,
                    on_reject: StageId::Rejected,
                    on_request_info: None,
                },
                StageTransitionConfig {
                    stage: StageId::E2Fiscal,
                    on_approve: StageId::E3Finance,
                    on_reject: StageId::Rejected,
                    on_request_info: None,
                },
                StageTransitionConfig {
                    stage: StageId::E3Finance,
                    on_approve: StageId::E4Legal,
                    on_reject: StageId::Rejected,
                    on_request_info: None,
                },
                StageTransitionConfig {
                    stage: StageId::E4Legal,
                    on_approve: StageId::E5Approved,
                    on_reject: StageId::Rejected,
                    on_request_info: None,
                },
            ],
        }
    }
}

/// The deployment-level configuration for a deliberation core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliberationConfig {
    /// Reviewer agent descriptors.
    pub agents: Vec<AgentConfig>,
    /// Stage graph: entry stage plus the transition table.
    pub stage_graph: StageGraphConfig,
    /// Explicit per-company plan assignments; a company absent here gets
    /// [`Plan::DEFAULT`].
    pub plan_assignments: Vec<PlanAssignment>,
    /// Timeout/retry budget for stage execution.
    pub timeouts: Timeouts,
    /// Root directory under which Defense Files are persisted
    /// (`{defense_file_root}/{companyId}/{projectId}.json`, per spec.md §6).
    pub defense_file_root: PathBuf,
}

impl Default for DeliberationConfig {
    fn default() -> Self {
        Self {
            agents: Vec::new(),
            stage_graph: StageGraphConfig::default(),
            plan_assignments: Vec::new(),
            timeouts: Timeouts::default(),
            defense_file_root: PathBuf::from("defense_files"),
        }
    }
}

/// The concrete `defense-core` runtime values built from a validated
/// [`DeliberationConfig`].
pub struct Wiring {
    /// Validated, immutable agent registry.
    pub registry: Arc<AgentRegistry>,
    /// Validated, immutable stage graph.
    pub graph: Arc<StageGraph>,
    /// Plan directory built from `plan_assignments`.
    pub plans: Arc<StaticPlanDirectory>,
    /// Timeout/retry budget for stage execution.
    pub timeouts: Timeouts,
    /// Root directory for Defense File persistence.
    pub defense_file_root: PathBuf,
}

impl DeliberationConfig {
    /// Loads a [`DeliberationConfig`] from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, or
    /// [`ConfigError::Parse`] when its contents are not valid TOML matching
    /// this shape.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        Self::from_toml_str(&raw)
    }

    /// Parses a [`DeliberationConfig`] from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when `raw` is not valid TOML matching
    /// this shape.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Validates the configuration and builds the concrete `defense-core`
    /// runtime values it describes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoAgents`] when `agents` is empty,
    /// [`ConfigError::EmptyDefenseFileRoot`] when `defense_file_root` has no
    /// path components, or a registry/graph validation error when the agent
    /// set and stage graph are mutually inconsistent.
    pub fn build(self) -> Result<Wiring, ConfigError> {
        if self.agents.is_empty() {
            return Err(ConfigError::NoAgents);
        }
        if self.defense_file_root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDefenseFileRoot);
        }

        let descriptors = self
            .agents
            .iter()
            .map(|agent| AgentDescriptor {
                id: agent.id.clone(),
                stage: agent.stage,
                display_name: agent.display_name.clone(),
                system_prompt: agent.system_prompt.clone(),
                max_output_tokens: agent.max_output_tokens,
                temperature: agent.temperature,
                permitted_tools: agent.permitted_tools.clone(),
                retrieval_hint: agent.retrieval_hint.clone(),
            })
            .collect();
        let registry = AgentRegistry::build(descriptors)?;

        let transitions =
            self.stage_graph.transitions.iter().copied().map(StageTransition::from).collect();
        let graph = StageGraph::build(self.stage_graph.entry_stage, transitions, &registry)?;

        let mut assignments = HashMap::with_capacity(self.plan_assignments.len());
        for assignment in &self.plan_assignments {
            assignments.insert(CompanyId::new(assignment.company.clone()), assignment.plan);
        }
        let plans = StaticPlanDirectory::new(assignments);

        Ok(Wiring {
            registry: Arc::new(registry),
            graph: Arc::new(graph),
            plans: Arc::new(plans),
            timeouts: self.timeouts,
            defense_file_root: self.defense_file_root,
        })
    }
}
