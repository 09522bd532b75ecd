// defense-core/src/model/retrieval.rs
// ============================================================================
// Module: RetrievalResult
// Description: Evidence returned by a RetrievalPort query.
// Purpose: Give agent prompts a uniform shape for cited supporting material.
// Dependencies: serde
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

/// A single piece of evidence returned by a [`crate::interfaces::RetrievalPort`]
/// query, to be cited in an agent's prompt context.
///
/// # Invariants
/// - `relevance` is in `0.0..=1.0`, highest first when a port returns
///   multiple results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Stable identifier for the evidence source (document id, URL, etc).
    pub source_id: String,
    /// Evidence text, already extracted/cleaned for prompt inclusion.
    pub excerpt: String,
    /// Relevance score assigned by the retrieval backend.
    pub relevance: f32,
}

impl RetrievalResult {
    /// Returns `true` when `relevance` is outside the valid `0.0..=1.0` range.
    #[must_use]
    pub fn has_invalid_relevance(&self) -> bool {
        !(0.0..=1.0).contains(&self.relevance)
    }
}
