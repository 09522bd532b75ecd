// defense-core/src/model/project.rs
// ============================================================================
// Module: Project
// Description: The contracted-service project record a deliberation reviews.
// Purpose: Carry the validated facts the reviewer agents reason over.
// Dependencies: bigdecimal, serde, serde_json, crate::identifiers, crate::time
// ============================================================================

use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::identifiers::CompanyId;
use crate::identifiers::ProjectId;
use crate::identifiers::UserId;
use crate::time::Timestamp;

/// Errors returned when constructing a [`Project`] from untrusted input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectError {
    /// `amount` was negative.
    #[error("project amount must be non-negative")]
    NegativeAmount,
    /// `name` or `description` was empty after trimming.
    #[error("project {field} must not be empty")]
    EmptyField {
        /// Name of the offending field.
        field: &'static str,
    },
}

/// A contracted-service project submitted for deliberation.
///
/// # Invariants
/// - `amount` is non-negative.
/// - `name` and `description` are non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Identifier of the project.
    pub id: ProjectId,
    /// Identifier of the owning company (tenant).
    pub company_id: CompanyId,
    /// Identifier of the user who submitted the project.
    pub created_by: UserId,
    /// Short project name.
    pub name: String,
    /// Name of the client the contracted service is for.
    pub client_name: String,
    /// Description of the contracted service, reviewed by the agents.
    pub description: String,
    /// Contracted amount, in the company's reporting currency.
    pub amount: BigDecimal,
    /// ISO 4217 currency code for `amount`.
    pub currency: String,
    /// Category of service being contracted (e.g. "consulting", "software").
    pub service_type: String,
    /// Name of the sponsoring individual on the client side.
    pub sponsor_name: String,
    /// Email address of the sponsoring individual.
    pub sponsor_email: String,
    /// When the project was submitted for deliberation.
    pub submitted_at: Timestamp,
    /// Free-form supporting context supplied by the caller (contract terms,
    /// prior correspondence, scope of work) that agents may cite.
    #[serde(default)]
    pub supporting_context: Vec<String>,
    /// Arbitrary additional metadata the caller attaches to the project.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Project {
    /// Validates a project record.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError`] when `amount` is negative or a required
    /// text field is empty.
    pub fn validate(&self) -> Result<(), ProjectError> {
        if self.amount < BigDecimal::from(0) {
            return Err(ProjectError::NegativeAmount);
        }
        if self.name.trim().is_empty() {
            return Err(ProjectError::EmptyField { field: "name" });
        }
        if self.description.trim().is_empty() {
            return Err(ProjectError::EmptyField { field: "description" });
        }
        Ok(())
    }
}
