// defense-config/src/timeouts.rs
// ============================================================================
// Module: Timeouts
// Description: Per-call timeout budget for retrieval, model, and whole-stage
//              execution, per spec.md §5.
// Purpose: Give the orchestrator a single, overridable source for the three
//          timeout defaults "Timeouts" in §5 names.
// Dependencies: serde
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

/// Default `ModelPort` call timeout, in milliseconds (spec.md §5: 60s).
pub const DEFAULT_MODEL_TIMEOUT_MS: u64 = 60_000;
/// Default `RetrievalPort` call timeout, in milliseconds (spec.md §5: 10s).
pub const DEFAULT_RETRIEVAL_TIMEOUT_MS: u64 = 10_000;
/// Default whole-stage timeout, in milliseconds (spec.md §5: 120s).
pub const DEFAULT_STAGE_TIMEOUT_MS: u64 = 120_000;
/// Default number of model-call retry attempts before a stage fails.
pub const DEFAULT_MODEL_RETRY_ATTEMPTS: u32 = 3;

/// Timeout and retry budget for a single stage's agent execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Per-call `ModelPort` timeout, in milliseconds.
    pub model_call_ms: u64,
    /// Per-call `RetrievalPort` timeout, in milliseconds.
    pub retrieval_call_ms: u64,
    /// Whole-stage timeout (bounds the sum including retries), in
    /// milliseconds.
    pub stage_ms: u64,
    /// Maximum model-call attempts (1 initial + retries) before the stage
    /// is marked failed.
    pub model_retry_attempts: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            model_call_ms: DEFAULT_MODEL_TIMEOUT_MS,
            retrieval_call_ms: DEFAULT_RETRIEVAL_TIMEOUT_MS,
            stage_ms: DEFAULT_STAGE_TIMEOUT_MS,
            model_retry_attempts: DEFAULT_MODEL_RETRY_ATTEMPTS,
        }
    }
}

impl Timeouts {
    /// Returns the model call timeout as a [`std::time::Duration`].
    #[must_use]
    pub const fn model_call(self) -> std::time::Duration {
        std::time::Duration::from_millis(self.model_call_ms)
    }

    /// Returns the retrieval call timeout as a [`std::time::Duration`].
    #[must_use]
    pub const fn retrieval_call(self) -> std::time::Duration {
        std::time::Duration::from_millis(self.retrieval_call_ms)
    }

    /// Returns the whole-stage timeout as a [`std::time::Duration`].
    #[must_use]
    pub const fn stage(self) -> std::time::Duration {
        std::time::Duration::from_millis(self.stage_ms)
    }
}

impl From<Timeouts> for defense_core::StageTimeouts {
    fn from(value: Timeouts) -> Self {
        Self {
            model_call: value.model_call(),
            retrieval_call: value.retrieval_call(),
            stage: value.stage(),
            model_retry_attempts: value.model_retry_attempts,
        }
    }
}
