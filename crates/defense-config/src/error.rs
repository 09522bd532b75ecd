// defense-config/src/error.rs
// ============================================================================
// Module: ConfigError
// Description: Failure modes for loading and validating deliberation config.
// Purpose: Fail closed and with a specific reason when a deployment's
//          config file cannot be parsed into a valid runtime wiring.
// Dependencies: thiserror, defense-core
// ============================================================================

use thiserror::Error;

/// Errors loading or validating a [`crate::DeliberationConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read from disk.
    #[error("could not read config file: {0}")]
    Io(String),
    /// The config file's TOML syntax or shape did not parse.
    #[error("could not parse config: {0}")]
    Parse(String),
    /// The `defense_file_root` path was empty.
    #[error("defense_file_root must not be empty")]
    EmptyDefenseFileRoot,
    /// No agents were configured.
    #[error("at least one agent must be configured")]
    NoAgents,
    /// The agent registry rejected the configured agent set.
    #[error(transparent)]
    Registry(#[from] defense_core::AgentRegistryError),
    /// The stage graph rejected the configured transition table.
    #[error(transparent)]
    Graph(#[from] defense_core::StageGraphError),
}
