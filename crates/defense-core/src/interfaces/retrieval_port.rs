// defense-core/src/interfaces/retrieval_port.rs
// ============================================================================
// Module: RetrievalPort
// Description: Backend-agnostic evidence retrieval interface.
// Purpose: Let reviewer agents cite supporting material without the core
//          depending on any specific retrieval/embedding backend.
// Dependencies: async-trait, thiserror, crate::model, crate::identifiers
// ============================================================================

use async_trait::async_trait;
use thiserror::Error;

use crate::identifiers::AgentId;
use crate::identifiers::CompanyId;
use crate::identifiers::ProjectId;
use crate::model::RetrievalResult;

/// A retrieval query scoped to one company's project and the agent asking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalQuery {
    /// Company the query is scoped to; every implementation must refuse to
    /// return evidence outside this scope.
    pub company_id: CompanyId,
    /// Project the query concerns.
    pub project_id: ProjectId,
    /// Agent asking for evidence; different reviewer agents may be
    /// entitled to see different evidence for the same project, per
    /// spec.md §4.4's `retrieve(companyId, agentId, query, k)`.
    pub agent_id: AgentId,
    /// Free-text query the reviewer stage wants evidence for.
    pub text: String,
    /// Maximum number of results to return.
    pub limit: usize,
}

/// Errors a [`RetrievalPort`] may return.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The backend is reachable but degraded (partial results, timeouts
    /// internal to the backend); callers may proceed without evidence.
    #[error("retrieval degraded: {0}")]
    Degraded(String),
    /// The backend could not be reached or returned a hard failure.
    #[error("retrieval unavailable: {0}")]
    Unavailable(String),
}

/// Backend-agnostic evidence retrieval port.
///
/// # Errors
///
/// Implementations must scope every query to `query.company_id` and must
/// never return evidence belonging to another company.
#[async_trait]
pub trait RetrievalPort: Send + Sync {
    /// Resolves a retrieval query into zero or more evidence results,
    /// ordered by descending relevance.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError`] when the backend is degraded or
    /// unavailable.
    async fn query(&self, query: &RetrievalQuery) -> Result<Vec<RetrievalResult>, RetrievalError>;
}
