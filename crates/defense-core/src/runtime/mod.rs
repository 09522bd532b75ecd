// defense-core/src/runtime/mod.rs
// ============================================================================
// Module: Defense Core Runtime
// Description: The deliberation engine: agent registry, stage graph, quota
//              gate, agent runner, orchestrator and status board.
// Purpose: Drive a project through its stage graph, enforcing tenant
//          isolation and quota at every admission point.
// Dependencies: tokio, crate::interfaces, crate::model
// ============================================================================

pub mod agent_registry;
pub mod agent_runner;
pub mod in_memory;
pub mod metrics;
pub mod orchestrator;
pub mod plan_directory;
pub mod quota_gate;
pub mod stage_graph;
pub mod status_board;

pub use agent_registry::AgentDescriptor;
pub use agent_registry::AgentRegistry;
pub use agent_registry::AgentRegistryError;
pub use agent_runner::AgentRunner;
pub use agent_runner::AgentRunnerError;
pub use agent_runner::StageTimeouts;
pub use in_memory::InMemoryDefenseFileStore;
pub use in_memory::InMemoryDeliberationStateStore;
pub use in_memory::InMemoryUsageCounterStore;
pub use metrics::NoopOrchestratorMetrics;
pub use metrics::OrchestratorMetrics;
pub use orchestrator::Orchestrator;
pub use orchestrator::OrchestratorError;
pub use orchestrator::StartOutcome;
pub use plan_directory::PlanDirectory;
pub use plan_directory::StaticPlanDirectory;
pub use quota_gate::QuotaExceededKind;
pub use quota_gate::QuotaGate;
pub use quota_gate::QuotaGateError;
pub use stage_graph::StageGraph;
pub use stage_graph::StageGraphError;
pub use stage_graph::StageTransition;
pub use status_board::AgentProgressStatus;
pub use status_board::ProgressRecord;
pub use status_board::StatusBoard;
