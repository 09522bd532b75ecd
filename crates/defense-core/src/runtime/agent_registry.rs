// defense-core/src/runtime/agent_registry.rs
// ============================================================================
// Module: AgentRegistry
// Description: Static, read-only registry of reviewer agent descriptors.
// Purpose: Populate agent prompts/metadata once at startup rather than
//          carrying a dynamic configuration dictionary through the runtime.
// Dependencies: std::collections::HashMap, crate::identifiers
// ============================================================================

//! ## Overview
//! Agent identifiers are a dynamic string-keyed set (a deployment can add a
//! new agent without a code change), but once built the registry is
//! immutable: agents do not come and go during a deliberation's lifetime.
//! This mirrors the stage graph's own "validate once at startup, fail fast"
//! discipline.

use std::collections::HashMap;

use thiserror::Error;

use crate::identifiers::AgentId;
use crate::identifiers::StageId;

/// Static metadata describing a single reviewer agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDescriptor {
    /// Identifier of this agent.
    pub id: AgentId,
    /// Stage this agent reviews.
    pub stage: StageId,
    /// Human-readable name shown in the Defense File and status reports.
    pub display_name: String,
    /// System prompt describing the agent's role and required decision
    /// format; rendered verbatim ahead of project facts.
    pub system_prompt: String,
    /// Maximum tokens the agent's model call may generate.
    pub max_output_tokens: u32,
    /// Sampling temperature passed to every model call this agent makes.
    pub temperature: f32,
    /// Names of tools this agent is permitted to call, resolved against a
    /// `ToolRegistry` at stage-run time. Empty for agents that only ever
    /// see the evidence the orchestrator gathers up front.
    pub permitted_tools: Vec<String>,
    /// An optional hint appended to the retrieval query this agent's stage
    /// issues, narrowing the evidence search beyond the project description.
    pub retrieval_hint: Option<String>,
}

/// Errors building or looking up entries in an [`AgentRegistry`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AgentRegistryError {
    /// Two descriptors were registered for the same agent id.
    #[error("duplicate agent id: {0}")]
    DuplicateAgent(String),
    /// No agent is registered for the requested id.
    #[error("unknown agent id: {0}")]
    UnknownAgent(String),
    /// No agent is registered for the requested stage.
    #[error("no agent registered for stage: {0}")]
    UnknownStage(StageId),
}

/// Immutable, read-only registry of reviewer agent descriptors, built once
/// at startup from configuration.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    /// Descriptors keyed by agent id.
    by_id: HashMap<AgentId, AgentDescriptor>,
    /// Agent id keyed by the stage it reviews (one agent per stage).
    by_stage: HashMap<StageId, AgentId>,
}

impl AgentRegistry {
    /// Builds a registry from a list of descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`AgentRegistryError::DuplicateAgent`] when two descriptors
    /// share an id, or when two descriptors share a stage (each stage has
    /// exactly one reviewing agent).
    pub fn build(descriptors: Vec<AgentDescriptor>) -> Result<Self, AgentRegistryError> {
        let mut by_id = HashMap::with_capacity(descriptors.len());
        let mut by_stage = HashMap::with_capacity(descriptors.len());
        for descriptor in descriptors {
            if by_id.contains_key(&descriptor.id) {
                return Err(AgentRegistryError::DuplicateAgent(descriptor.id.to_string()));
            }
            if by_stage.contains_key(&descriptor.stage) {
                return Err(AgentRegistryError::DuplicateAgent(format!(
                    "stage {} already has a registered agent",
                    descriptor.stage
                )));
            }
            by_stage.insert(descriptor.stage, descriptor.id.clone());
            by_id.insert(descriptor.id.clone(), descriptor);
        }
        Ok(Self { by_id, by_stage })
    }

    /// Looks up a descriptor by agent id.
    ///
    /// # Errors
    ///
    /// Returns [`AgentRegistryError::UnknownAgent`] when no such agent is
    /// registered.
    pub fn get(&self, id: &AgentId) -> Result<&AgentDescriptor, AgentRegistryError> {
        self.by_id.get(id).ok_or_else(|| AgentRegistryError::UnknownAgent(id.to_string()))
    }

    /// Looks up the descriptor for the agent that reviews `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentRegistryError::UnknownStage`] when no agent reviews
    /// that stage.
    pub fn get_for_stage(&self, stage: StageId) -> Result<&AgentDescriptor, AgentRegistryError> {
        let id = self.by_stage.get(&stage).ok_or(AgentRegistryError::UnknownStage(stage))?;
        self.get(id)
    }

    /// Iterates over every registered descriptor, for progress reporting
    /// that needs to enumerate all agents rather than look one up.
    pub fn all(&self) -> impl Iterator<Item = &AgentDescriptor> {
        self.by_id.values()
    }
}
