// defense-core/src/runtime/metrics.rs
// ============================================================================
// Module: OrchestratorMetrics
// Description: Trait-based metrics sink for orchestrator events.
// Purpose: Let hosts wire deliberation counters/latencies into whatever
//          metrics backend they run, without the orchestrator depending on
//          one directly.
// Dependencies: crate::identifiers
// ============================================================================

//! ## Overview
//! Mirrors the control-plane's own dependency-light, trait-based telemetry
//! seam: a small sink trait plus a no-op default, rather than a metrics
//! crate baked into the runtime. Structured operational logs (the kind an
//! operator tails, not a counter an operator graphs) are emitted directly
//! via `tracing` at the call sites that need them.

use crate::identifiers::StageId;

/// Classification of a stage outcome, for metrics labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage's agent call succeeded and the stage advanced.
    Advanced,
    /// The stage's agent call succeeded but requested more information.
    Paused,
    /// The project was rejected at this stage.
    Rejected,
    /// The stage failed (retrieval/model error, quota denial, panic).
    Failed,
}

/// Metrics sink for orchestrator events.
pub trait OrchestratorMetrics: Send + Sync {
    /// Records that a stage finished with the given outcome, after
    /// `duration_ms` milliseconds.
    fn record_stage(&self, stage: StageId, outcome: StageOutcome, duration_ms: u64);

    /// Records that a quota check denied a request for a company.
    fn record_quota_denied(&self);
}

/// A no-op [`OrchestratorMetrics`]; the default when no metrics backend is
/// configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOrchestratorMetrics;

impl OrchestratorMetrics for NoopOrchestratorMetrics {
    fn record_stage(&self, _stage: StageId, _outcome: StageOutcome, _duration_ms: u64) {}

    fn record_quota_denied(&self) {}
}
