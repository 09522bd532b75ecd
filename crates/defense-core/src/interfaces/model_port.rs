// defense-core/src/interfaces/model_port.rs
// ============================================================================
// Module: ModelPort
// Description: Backend-agnostic LLM call interface.
// Purpose: Let reviewer agents render a decision without the core depending
//          on any specific model backend.
// Dependencies: async-trait, thiserror, serde_json, crate::identifiers
// ============================================================================

use async_trait::async_trait;
use thiserror::Error;

use crate::identifiers::AgentId;
use crate::identifiers::StageId;

/// The role a single turn in a model conversation was spoken in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    /// Project facts plus any cited retrieval evidence.
    User,
    /// A prior completion from the model itself.
    Assistant,
    /// The result of resolving one of the model's tool calls.
    Tool,
}

/// One turn in a model conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMessage {
    /// Who spoke this turn.
    pub role: MessageRole,
    /// Turn content: prompt text, a prior completion, or a tool's output.
    pub content: String,
    /// For a `Tool` message, the id of the call this is the output of.
    pub tool_call_id: Option<String>,
}

impl ModelMessage {
    /// Builds a `User` turn.
    #[must_use]
    pub fn user(content: String) -> Self {
        Self { role: MessageRole::User, content, tool_call_id: None }
    }

    /// Builds an `Assistant` turn echoing a prior completion.
    #[must_use]
    pub fn assistant(content: String) -> Self {
        Self { role: MessageRole::Assistant, content, tool_call_id: None }
    }

    /// Builds a `Tool` turn carrying the output of resolving `tool_call_id`.
    #[must_use]
    pub fn tool_output(tool_call_id: String, content: String) -> Self {
        Self { role: MessageRole::Tool, content, tool_call_id: Some(tool_call_id) }
    }
}

/// A tool the model is permitted to call during this request, offered as
/// part of the tool manifest described in spec §4.5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    /// Stable tool name the model refers to in a [`ToolCall`].
    pub name: String,
    /// Human-readable description of what the tool does and when to call it.
    pub description: String,
}

/// A single tool-invocation request returned by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    /// Identifier correlating this call to its eventual tool-output message.
    pub id: String,
    /// Name of the tool the model wants invoked.
    pub name: String,
    /// Raw argument payload the model supplied, opaque to the core.
    pub arguments: String,
}

/// A fully-assembled prompt for one agent's stage review.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    /// Agent issuing the request.
    pub agent: AgentId,
    /// Stage this request is evaluating.
    pub stage: StageId,
    /// System prompt describing the agent's role and the decision format.
    pub system_prompt: String,
    /// The conversation so far: project facts, and (on a second round) the
    /// prior completion plus any resolved tool outputs.
    pub messages: Vec<ModelMessage>,
    /// Tools the model is permitted to call this turn; empty when the
    /// agent's descriptor permits none.
    pub tools: Vec<ToolSpec>,
    /// Maximum tokens the backend should generate.
    pub max_output_tokens: u32,
    /// Sampling temperature passed to the backend, per spec.md §4.5's
    /// `invoke(systemPrompt, messages, tools?, maxTokens, temperature)`.
    pub temperature: f32,
}

/// A model backend's raw response, before the agent runner parses it into
/// an [`crate::model::AgentDecision`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResponse {
    /// Raw text returned by the model.
    pub text: String,
    /// Tool calls the model requested, if any. The core resolves these and
    /// calls the model exactly one more time; any tool calls returned on
    /// that second round are discarded.
    pub tool_calls: Vec<ToolCall>,
    /// Tokens consumed by the prompt (system prompt, messages, tool manifest).
    pub prompt_tokens: u64,
    /// Tokens consumed generating `text`.
    pub completion_tokens: u64,
}

/// Errors a [`ModelPort`] may return.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The call exceeded its allotted time budget.
    #[error("model call timed out")]
    Timeout,
    /// The backend rejected the request or returned a hard failure.
    #[error("model backend failure: {0}")]
    BackendFailure(String),
}

/// Backend-agnostic model-call port.
#[async_trait]
pub trait ModelPort: Send + Sync {
    /// Issues a single model call and returns its raw response.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] when the call times out or the backend fails.
    async fn call(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError>;
}
