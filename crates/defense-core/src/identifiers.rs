// defense-core/src/identifiers.rs
// ============================================================================
// Module: Defense Core Identifiers
// Description: Canonical opaque identifiers and closed enums used throughout
//              the deliberation orchestrator.
// Purpose: Provide strongly typed, serializable IDs with stable string forms,
//          and closed enumerations for values the domain treats as fixed.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are opaque and serialize as strings; validation beyond "is a
//! non-empty string" happens at construction boundaries (tenant context,
//! config loading), not inside these wrappers. Stage names and decision
//! labels are closed enums rather than strings, since the stage graph and
//! the decision vocabulary are fixed by the deliberation design, not
//! supplied by callers at runtime.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Identifier for a contracted-service company (tenant).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(String);

impl CompanyId {
    /// Creates a new company identifier, trimmed and lower-cased so
    /// equality checks are stable regardless of how the caller supplied it.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_ascii_lowercase())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for CompanyId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CompanyId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Identifier for a single contracted-service project under review.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Creates a new project identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ProjectId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProjectId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Identifier for the user who requested or owns a deliberation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a new user identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Identifier for a reviewer agent registered in the agent registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Creates a new agent identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AgentId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Identifier for a single recorded agent decision, unique within a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionId(String);

impl DecisionId {
    /// Creates a new decision identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for DecisionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DecisionId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Identifier correlating a single trigger (start/resume call) for
/// idempotent admission, mirroring the control-plane's trigger-id pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerId(String);

impl TriggerId {
    /// Creates a new trigger identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TriggerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TriggerId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// The fixed sequence of review stages a project passes through.
///
/// Stage names are a closed enum rather than strings: the graph they form
/// is part of the deliberation's design, not something callers configure
/// per request. `E4Auditor` is an optional adversarial stage a deployment
/// may enable between `E4Legal` and `E5Approved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Business-strategy review: is there a genuine business rationale.
    E1Strategy,
    /// Fiscal/tax-compliance review.
    E2Fiscal,
    /// Financial materiality and economic-benefit review.
    E3Finance,
    /// Legal review of the contract and its deliverables.
    E4Legal,
    /// Optional adversarial/auditor review, simulating a tax-authority
    /// challenge to the documented defense.
    E4Auditor,
    /// Terminal stage: the project's defense file is complete and approved.
    E5Approved,
    /// Terminal stage: the project was rejected at some earlier stage.
    Rejected,
}

impl StageId {
    /// Returns `true` for the two terminal stages.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::E5Approved | Self::Rejected)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::E1Strategy => "e1_strategy",
            Self::E2Fiscal => "e2_fiscal",
            Self::E3Finance => "e3_finance",
            Self::E4Legal => "e4_legal",
            Self::E4Auditor => "e4_auditor",
            Self::E5Approved => "e5_approved",
            Self::Rejected => "rejected",
        };
        f.write_str(label)
    }
}

/// The three-way decision label a reviewer agent attaches to a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionLabel {
    /// The reviewer approves the project at this stage.
    Approve,
    /// The reviewer rejects the project outright.
    Reject,
    /// The reviewer cannot decide without additional evidence.
    RequestInfo,
}

impl fmt::Display for DecisionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::RequestInfo => "request_info",
        };
        f.write_str(label)
    }
}

/// Lifecycle status of a deliberation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// A stage is currently executing or queued to execute.
    InProgress,
    /// The deliberation reached a terminal stage successfully.
    Completed,
    /// The deliberation was cancelled at a stage boundary and can resume.
    Paused,
    /// The deliberation failed and is not resumable without intervention.
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Paused => "paused",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// The four compliance pillars a Defense File checklist tracks, matching
/// the audit-defense practice this system exists to support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompliancePillar {
    /// There is a documented, legitimate business reason for the contract.
    RazonDeNegocios,
    /// The contracted service produced a measurable economic benefit.
    BeneficioEconomico,
    /// The amount paid is proportionate to the service received.
    Materialidad,
    /// The engagement is traceable: deliverables, invoices, payments line up.
    Trazabilidad,
}

impl CompliancePillar {
    /// All four pillars, in the fixed order the checklist reports them.
    pub const ALL: [Self; 4] =
        [Self::RazonDeNegocios, Self::BeneficioEconomico, Self::Materialidad, Self::Trazabilidad];
}

impl fmt::Display for CompliancePillar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::RazonDeNegocios => "razon_de_negocios",
            Self::BeneficioEconomico => "beneficio_economico",
            Self::Materialidad => "materialidad",
            Self::Trazabilidad => "trazabilidad",
        };
        f.write_str(label)
    }
}
