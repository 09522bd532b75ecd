// defense-core/src/model/decision.rs
// ============================================================================
// Module: AgentDecision
// Description: A single reviewer agent's recorded decision for one stage.
// Purpose: Capture the append-only unit the Defense File is built from.
// Dependencies: serde, crate::identifiers, crate::time
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::AgentId;
use crate::identifiers::DecisionId;
use crate::identifiers::DecisionLabel;
use crate::identifiers::StageId;
use crate::model::retrieval::RetrievalResult;
use crate::time::Timestamp;

/// A single reviewer agent's recorded decision for one stage of one project.
///
/// # Invariants
/// - Once recorded, a decision is never mutated or removed: the Defense
///   File is an append-only log of these records.
/// - `confidence`, when present, is in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDecision {
    /// Identifier of this decision record.
    pub id: DecisionId,
    /// Stage this decision was rendered for.
    pub stage: StageId,
    /// Agent that rendered the decision.
    pub agent: AgentId,
    /// Human-readable display name of the agent, copied from its
    /// [`crate::runtime::AgentDescriptor`] at the time this decision was
    /// recorded so the Defense File reads cleanly even if the registry
    /// entry is later renamed.
    pub agent_name: String,
    /// Monotonic counter, starting at 1, of how many times this stage has
    /// been (re-)decided for this project — incremented whenever a stage
    /// is re-run after a `request_info` pause and resume.
    pub version: u32,
    /// The decision label.
    pub label: DecisionLabel,
    /// Free-text rationale the agent produced. Scanned verbatim by
    /// [`crate::model::defense_file::ComplianceChecklist::derive`] for the
    /// pillar-satisfying substrings spec.md §4.3 names.
    pub rationale: String,
    /// Confidence score extracted from the agent's response, if present.
    #[serde(default)]
    pub confidence: Option<f32>,
    /// Evidence the agent was shown before rendering this decision, already
    /// scoped and scored by the `RetrievalPort` call this stage made.
    #[serde(default)]
    pub retrieval_refs: Vec<RetrievalResult>,
    /// Tokens consumed by the prompt across every model call this stage made.
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Tokens consumed generating the rendered decision.
    #[serde(default)]
    pub completion_tokens: u64,
    /// Wall-clock milliseconds the stage's agent run took, from the first
    /// retrieval call through the final parsed response.
    #[serde(default)]
    pub elapsed_ms: u64,
    /// When this decision was recorded.
    pub recorded_at: Timestamp,
}

impl AgentDecision {
    /// Returns `true` if `confidence` is present and outside `0.0..=1.0`.
    #[must_use]
    pub fn has_invalid_confidence(&self) -> bool {
        self.confidence.is_some_and(|value| !(0.0..=1.0).contains(&value))
    }
}
