// defense-core/src/interfaces/tool_registry.rs
// ============================================================================
// Module: ToolRegistry
// Description: Synchronous resolution of the tools a model is allowed to call.
// Purpose: Let an AgentRunner offer a manifest of permitted tools and
//          resolve the model's tool calls without depending on any specific
//          tool backend.
// Dependencies: thiserror, crate::interfaces::model_port
// ============================================================================

use thiserror::Error;

use crate::interfaces::model_port::ToolCall;
use crate::interfaces::model_port::ToolSpec;

/// Errors resolving a single [`ToolCall`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// No tool by this name is registered.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    /// The tool ran but failed.
    #[error("tool {name} failed: {reason}")]
    ExecutionFailed {
        /// Name of the failing tool.
        name: String,
        /// Failure reason, safe to feed back to the model as the tool's
        /// output.
        reason: String,
    },
}

/// Resolves the tools an agent is permitted to offer the model.
///
/// Resolution is synchronous and runs to completion within a single stage;
/// per spec §4.5 there is no recursive or parallel tool-call fan-out.
pub trait ToolRegistry: Send + Sync {
    /// Returns the manifest entries for the tool names an agent permits,
    /// silently dropping any name with no matching registration.
    fn specs_for(&self, names: &[String]) -> Vec<ToolSpec>;

    /// Resolves a single tool call into its textual output.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] when `call.name` has no
    /// registration, or [`ToolError::ExecutionFailed`] when the tool itself
    /// fails.
    fn resolve(&self, call: &ToolCall) -> Result<String, ToolError>;
}

/// A [`ToolRegistry`] with no registered tools; every agent offers an empty
/// manifest and every call resolves to [`ToolError::UnknownTool`]. The
/// default for deployments that permit no tool use.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyToolRegistry;

impl ToolRegistry for EmptyToolRegistry {
    fn specs_for(&self, _names: &[String]) -> Vec<ToolSpec> {
        Vec::new()
    }

    fn resolve(&self, call: &ToolCall) -> Result<String, ToolError> {
        Err(ToolError::UnknownTool(call.name.clone()))
    }
}
