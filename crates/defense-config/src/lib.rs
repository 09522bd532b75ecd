// defense-config/src/lib.rs
// ============================================================================
// Module: Defense Config Library
// Description: Canonical TOML configuration model for the deliberation core.
// Purpose: Single source of truth for the environment configuration spec.md
//          §6 names: plan tier assignments, the stage graph, agent
//          descriptors, timeouts, and the Defense File root directory.
// Dependencies: defense-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file (or built in-process for tests)
//! into a [`DeliberationConfig`], then validated and turned into the
//! concrete `defense-core` runtime values (`AgentRegistry`, `StageGraph`,
//! `StaticPlanDirectory`) via [`DeliberationConfig::build`]. A misconfigured
//! file fails at load time, not at first deliberation.

pub mod config;
pub mod error;
pub mod timeouts;

pub use config::AgentConfig;
pub use config::DeliberationConfig;
pub use config::PlanAssignment;
pub use config::StageTransitionConfig;
pub use config::Wiring;
pub use error::ConfigError;
pub use timeouts::Timeouts;
