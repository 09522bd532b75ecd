// defense-providers/src/model.rs
// ============================================================================
// Module: Model Port implementations
// Description: A scripted test/demo fake and a thin HTTP stub for
//              ModelPort.
// Purpose: Let the orchestrator and CLI run end-to-end without a full LLM
//          backend integration, which is out of scope for this workspace.
// Dependencies: defense-core, reqwest, serde_json, tokio
// ============================================================================

//! ## Overview
//! [`ScriptedModelPort`] returns pre-programmed responses in call order,
//! for deterministic tests and demos. [`HttpModelPort`] forwards a
//! [`defense_core::ModelRequest`] to an HTTP endpoint and parses a
//! [`defense_core::ModelResponse`] back; it demonstrates the wire shape a
//! real backend integration would use without being one itself.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use defense_core::MessageRole;
use defense_core::ModelError;
use defense_core::ModelPort;
use defense_core::ModelRequest;
use defense_core::ModelResponse;
use defense_core::ToolCall;
use reqwest::Client;
use reqwest::Url;
use serde::Deserialize;
use serde::Serialize;

/// A [`ModelPort`] that replays a fixed sequence of responses, one per
/// call, looping back to the start once exhausted.
pub struct ScriptedModelPort {
    script: Vec<ModelResponse>,
    next: Mutex<usize>,
}

impl ScriptedModelPort {
    /// Creates a scripted port over a non-empty response sequence.
    ///
    /// # Panics
    ///
    /// Panics if `script` is empty; a scripted port with nothing to play
    /// back is a test-authoring bug, not a runtime condition to handle.
    #[must_use]
    pub fn new(script: Vec<ModelResponse>) -> Self {
        assert!(!script.is_empty(), "ScriptedModelPort requires at least one response");
        Self { script, next: Mutex::new(0) }
    }
}

#[async_trait]
impl ModelPort for ScriptedModelPort {
    async fn call(&self, _request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        let mut next = self.next.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let response = self.script[*next % self.script.len()].clone();
        *next += 1;
        Ok(response)
    }
}

/// Configuration for [`HttpModelPort`].
#[derive(Debug, Clone)]
pub struct HttpModelPortConfig {
    /// Endpoint model calls are `POST`ed to.
    pub endpoint: Url,
    /// Request timeout.
    pub timeout_ms: u64,
}

#[derive(Debug, Serialize)]
struct ModelMessagePayload<'a> {
    role: &'static str,
    content: &'a str,
    tool_call_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ToolSpecPayload<'a> {
    name: &'a str,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct ModelRequestPayload<'a> {
    agent: &'a str,
    stage: String,
    system_prompt: &'a str,
    messages: Vec<ModelMessagePayload<'a>>,
    tools: Vec<ToolSpecPayload<'a>>,
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ToolCallPayload {
    id: String,
    name: String,
    arguments: String,
}

impl From<ToolCallPayload> for ToolCall {
    fn from(value: ToolCallPayload) -> Self {
        Self { id: value.id, name: value.name, arguments: value.arguments }
    }
}

#[derive(Debug, Deserialize)]
struct ModelResponsePayload {
    text: String,
    #[serde(default)]
    tool_calls: Vec<ToolCallPayload>,
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// Maps a [`MessageRole`] to its wire-level name.
const fn role_name(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    }
}

/// A thin [`ModelPort`] stub demonstrating the wire shape an HTTP-backed
/// model integration would use.
pub struct HttpModelPort {
    endpoint: Url,
    client: Client,
}

impl HttpModelPort {
    /// Creates a port posting to `config.endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::BackendFailure`] when the HTTP client cannot
    /// be built.
    pub fn new(config: HttpModelPortConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| ModelError::BackendFailure(format!("http client build failed: {err}")))?;
        Ok(Self { endpoint: config.endpoint, client })
    }
}

#[async_trait]
impl ModelPort for HttpModelPort {
    async fn call(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        let payload = ModelRequestPayload {
            agent: request.agent.as_str(),
            stage: request.stage.to_string(),
            system_prompt: &request.system_prompt,
            messages: request
                .messages
                .iter()
                .map(|message| ModelMessagePayload {
                    role: role_name(message.role),
                    content: &message.content,
                    tool_call_id: message.tool_call_id.as_deref(),
                })
                .collect(),
            tools: request
                .tools
                .iter()
                .map(|tool| ToolSpecPayload { name: &tool.name, description: &tool.description })
                .collect(),
            max_output_tokens: request.max_output_tokens,
            temperature: request.temperature,
        };
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|err| ModelError::BackendFailure(format!("model request failed: {err}")))?;
        if response.status().as_u16() == 504 {
            return Err(ModelError::Timeout);
        }
        if !response.status().is_success() {
            return Err(ModelError::BackendFailure(format!("model backend returned {}", response.status())));
        }
        let parsed: ModelResponsePayload = response
            .json()
            .await
            .map_err(|err| ModelError::BackendFailure(format!("malformed model response: {err}")))?;
        Ok(ModelResponse {
            text: parsed.text,
            tool_calls: parsed.tool_calls.into_iter().map(ToolCall::from).collect(),
            prompt_tokens: parsed.prompt_tokens,
            completion_tokens: parsed.completion_tokens,
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

    use defense_core::AgentId;
    use defense_core::StageId;

    use super::*;

    fn sample_request() -> ModelRequest {
        ModelRequest {
            agent: AgentId::new("a1_sponsor"),
            stage: StageId::E1Strategy,
            system_prompt: "review".to_string(),
            messages: vec![defense_core::ModelMessage::user("project facts".to_string())],
            tools: Vec::new(),
            max_output_tokens: 256,
            temperature: 0.2,
        }
    }

    #[tokio::test]
    async fn scripted_port_replays_responses_in_order_then_loops() {
        let port = ScriptedModelPort::new(vec![
            ModelResponse { text: "first".to_string(), tool_calls: Vec::new(), prompt_tokens: 8, completion_tokens: 2 },
            ModelResponse { text: "second".to_string(), tool_calls: Vec::new(), prompt_tokens: 8, completion_tokens: 4 },
        ]);
        let first = port.call(&sample_request()).await.expect("call");
        let second = port.call(&sample_request()).await.expect("call");
        let third = port.call(&sample_request()).await.expect("call");
        assert_eq!(first.text, "first");
        assert_eq!(second.text, "second");
        assert_eq!(third.text, "first");
    }

    #[test]
    fn http_port_construction_succeeds_with_a_valid_config() {
        let config = HttpModelPortConfig {
            endpoint: Url::parse("https://models.example/call").expect("url"),
            timeout_ms: 60_000,
        };
        assert!(HttpModelPort::new(config).is_ok());
    }
}
