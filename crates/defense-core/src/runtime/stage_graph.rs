// defense-core/src/runtime/stage_graph.rs
// ============================================================================
// Module: StageGraph
// Description: The fixed transition table driving a project between stages.
// Purpose: Resolve a stage's decision label into the next stage, validated
//          once at construction rather than at first use.
// Dependencies: std::collections::HashMap, crate::identifiers, crate::runtime::agent_registry
// ============================================================================

use std::collections::HashMap;

use thiserror::Error;

use crate::identifiers::DecisionLabel;
use crate::identifiers::StageId;
use crate::runtime::agent_registry::AgentRegistry;

/// Where a stage goes next for each possible decision label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTransition {
    /// The stage this transition applies to.
    pub stage: StageId,
    /// Next stage on `approve`.
    pub on_approve: StageId,
    /// Next stage on `reject`.
    pub on_reject: StageId,
    /// Next stage on `request_info`; `None` means "stay on this stage and
    /// re-run it once more evidence is supplied" (the orchestrator pauses
    /// rather than looping immediately).
    pub on_request_info: Option<StageId>,
}

/// Errors building or traversing a [`StageGraph`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StageGraphError {
    /// Two transitions were registered for the same stage.
    #[error("duplicate transition for stage: {0}")]
    DuplicateStage(StageId),
    /// A transition named a stage that has no registered agent and is not
    /// one of the two terminal stages.
    #[error("stage {0} has no registered agent and is not terminal")]
    MissingAgent(StageId),
    /// A terminal stage had an outgoing transition, which is never valid.
    #[error("terminal stage {0} must not have a transition")]
    TerminalHasTransition(StageId),
    /// No transition is registered for the entry stage.
    #[error("entry stage {0} has no registered transition")]
    MissingEntryStage(StageId),
    /// The requested stage has no registered transition.
    #[error("no transition registered for stage: {0}")]
    UnknownStage(StageId),
}

/// The fixed, validated graph of stage transitions for a deployment.
#[derive(Debug, Clone)]
pub struct StageGraph {
    /// The stage a new deliberation enters at.
    entry_stage: StageId,
    /// Transitions keyed by stage.
    transitions: HashMap<StageId, StageTransition>,
}

impl StageGraph {
    /// Builds and validates a stage graph.
    ///
    /// Validates that every non-terminal stage named by a transition (as
    /// the transition's own stage, or as a destination) has a registered
    /// agent in `agents`, that no terminal stage carries an outgoing
    /// transition, and that `entry_stage` itself has a registered
    /// transition. Validation happens here, at construction, rather than
    /// lazily on first use, so a misconfigured graph fails at startup.
    ///
    /// # Errors
    ///
    /// Returns a [`StageGraphError`] variant describing the first
    /// inconsistency found.
    pub fn build(
        entry_stage: StageId,
        transitions: Vec<StageTransition>,
        agents: &AgentRegistry,
    ) -> Result<Self, StageGraphError> {
        let mut table = HashMap::with_capacity(transitions.len());
        for transition in transitions {
            if table.contains_key(&transition.stage) {
                return Err(StageGraphError::DuplicateStage(transition.stage));
            }
            if transition.stage.is_terminal() {
                return Err(StageGraphError::TerminalHasTransition(transition.stage));
            }
            if agents.get_for_stage(transition.stage).is_err() {
                return Err(StageGraphError::MissingAgent(transition.stage));
            }
            for destination in [
                Some(transition.on_approve),
                Some(transition.on_reject),
                transition.on_request_info,
            ]
            .into_iter()
            .flatten()
            {
                if !destination.is_terminal() && agents.get_for_stage(destination).is_err() {
                    return Err(StageGraphError::MissingAgent(destination));
                }
            }
            table.insert(transition.stage, transition);
        }
        if !entry_stage.is_terminal() && !table.contains_key(&entry_stage) {
            return Err(StageGraphError::MissingEntryStage(entry_stage));
        }
        Ok(Self { entry_stage, transitions: table })
    }

    /// Returns the stage a new deliberation enters at.
    #[must_use]
    pub const fn entry_stage(&self) -> StageId {
        self.entry_stage
    }

    /// Returns the number of non-terminal stages in the graph, the
    /// `totalStages` denominator spec.md §4.8's progress-percent formula
    /// divides by.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.transitions.len()
    }

    /// Resolves the next stage for `stage` given a rendered `label`.
    ///
    /// `request_info` resolution: when the transition declares
    /// `on_request_info: None`, the stage itself is returned, signaling the
    /// orchestrator to pause rather than advance.
    ///
    /// # Errors
    ///
    /// Returns [`StageGraphError::UnknownStage`] when `stage` is not
    /// registered (including when `stage` is already terminal).
    pub fn next_stage(
        &self,
        stage: StageId,
        label: DecisionLabel,
    ) -> Result<StageId, StageGraphError> {
        let transition =
            self.transitions.get(&stage).ok_or(StageGraphError::UnknownStage(stage))?;
        Ok(match label {
            DecisionLabel::Approve => transition.on_approve,
            DecisionLabel::Reject => transition.on_reject,
            DecisionLabel::RequestInfo => transition.on_request_info.unwrap_or(stage),
        })
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
    use crate::runtime::agent_registry::AgentDescriptor;

    fn agents() -> AgentRegistry {
        AgentRegistry::build(vec![
            AgentDescriptor {
                id: "a1".into(),
                stage: StageId::E1Strategy,
                display_name: "Strategy".to_string(),
                system_prompt: "review".to_string(),
                max_output_tokens: 512,
                temperature: 0.2,
                permitted_tools: Vec::new(),
                retrieval_hint: None,
            },
            AgentDescriptor {
                id: "a2".into(),
                stage: StageId::E2Fiscal,
                display_name: "Fiscal".to_string(),
                system_prompt: "review".to_string(),
                max_output_tokens: 512,
                temperature: 0.2,
                permitted_tools: Vec::new(),
                retrieval_hint: None,
            },
        ])
        .expect("valid registry")
    }

    fn graph() -> StageGraph {
        let transitions = vec![
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
        ];
        StageGraph::build(StageId::E1Strategy, transitions, &agents()).expect("valid graph")
    }

    #[test]
    fn approve_advances_to_the_next_stage() {
        let graph = graph();
        assert_eq!(
            graph.next_stage(StageId::E1Strategy, DecisionLabel::Approve).unwrap(),
            StageId::E2Fiscal
        );
    }

    #[test]
    fn request_info_without_a_destination_stays_on_the_same_stage() {
        let graph = graph();
        assert_eq!(
            graph.next_stage(StageId::E1Strategy, DecisionLabel::RequestInfo).unwrap(),
            StageId::E1Strategy
        );
    }

    #[test]
    fn building_with_a_missing_agent_fails() {
        let transitions = vec![StageTransition {
            stage: StageId::E3Finance,
            on_approve: StageId::E5Approved,
            on_reject: StageId::Rejected,
            on_request_info: None,
        }];
        let result = StageGraph::build(StageId::E3Finance, transitions, &agents());
        assert!(matches!(result, Err(StageGraphError::MissingAgent(StageId::E3Finance))));
    }
}
