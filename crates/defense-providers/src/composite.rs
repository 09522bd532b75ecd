// defense-providers/src/composite.rs
// ============================================================================
// Module: Composite Retrieval Provider
// Description: Routes a retrieval query to a primary port, falling back to
//              a secondary port when the primary degrades or is
//              unavailable.
// Purpose: Let a deployment register more than one evidence backend without
//          the core or its agent runner knowing about the fallback policy.
// Dependencies: defense-core
// ============================================================================

//! ## Overview
//! Grounded in the teacher's provider registry, which routes an evidence
//! query by identifier and enforces an access policy before dispatching to
//! the matching provider. A deliberation core has exactly one retrieval
//! concern rather than a named set, so [`CompositeRetrievalProvider`]
//! collapses that routing to a simple primary/fallback chain: query the
//! primary port first, and only consult the fallback when the primary
//! reports [`defense_core::RetrievalError::Unavailable`] or
//! [`defense_core::RetrievalError::Degraded`].

use async_trait::async_trait;
use defense_core::RetrievalError;
use defense_core::RetrievalPort;
use defense_core::RetrievalQuery;
use defense_core::RetrievalResult;
use tracing::warn;

/// A [`RetrievalPort`] that falls back to a secondary port when the
/// primary one fails.
pub struct CompositeRetrievalProvider<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> CompositeRetrievalProvider<P, F>
where
    P: RetrievalPort,
    F: RetrievalPort,
{
    /// Creates a provider that prefers `primary` and falls back to
    /// `fallback` on failure.
    pub const fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl<P, F> RetrievalPort for CompositeRetrievalProvider<P, F>
where
    P: RetrievalPort,
    F: RetrievalPort,
{
    async fn query(&self, query: &RetrievalQuery) -> Result<Vec<RetrievalResult>, RetrievalError> {
        match self.primary.query(query).await {
            Ok(results) => Ok(results),
            Err(primary_err) => {
                warn!(
                    company_id = query.company_id.as_str(),
                    error = %primary_err,
                    "primary retrieval provider failed, trying fallback"
                );
                self.fallback.query(query).await.map_err(|fallback_err| {
                    RetrievalError::Unavailable(format!(
                        "primary failed ({primary_err}), fallback failed ({fallback_err})"
                    ))
                })
            }
        }
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
    use defense_core::CompanyId;
    use defense_core::ProjectId;

    use super::*;

    struct AlwaysOk(Vec<RetrievalResult>);

    #[async_trait]
    impl RetrievalPort for AlwaysOk {
        async fn query(&self, _query: &RetrievalQuery) -> Result<Vec<RetrievalResult>, RetrievalError> {
            Ok(self.0.clone())
        }
    }

    struct AlwaysDegraded;

    #[async_trait]
    impl RetrievalPort for AlwaysDegraded {
        async fn query(&self, _query: &RetrievalQuery) -> Result<Vec<RetrievalResult>, RetrievalError> {
            Err(RetrievalError::Degraded("simulated degradation".to_string()))
        }
    }

    struct AlwaysUnavailable;

    #[async_trait]
    impl RetrievalPort for AlwaysUnavailable {
        async fn query(&self, _query: &RetrievalQuery) -> Result<Vec<RetrievalResult>, RetrievalError> {
            Err(RetrievalError::Unavailable("simulated outage".to_string()))
        }
    }

    fn sample_query() -> RetrievalQuery {
        RetrievalQuery {
            company_id: CompanyId::new("acme"),
            project_id: ProjectId::new("p1"),
            agent_id: AgentId::new("a1"),
            text: "materiality".to_string(),
            limit: 5,
        }
    }

    #[tokio::test]
    async fn uses_the_primary_when_it_succeeds() {
        let fallback_results = vec![RetrievalResult {
            source_id: "fallback".to_string(),
            excerpt: "should not be used".to_string(),
            relevance: 1.0,
        }];
        let primary_results = vec![RetrievalResult {
            source_id: "primary".to_string(),
            excerpt: "primary evidence".to_string(),
            relevance: 0.9,
        }];
        let provider =
            CompositeRetrievalProvider::new(AlwaysOk(primary_results.clone()), AlwaysOk(fallback_results));
        let results = provider.query(&sample_query()).await.expect("query");
        assert_eq!(results, primary_results);
    }

    #[tokio::test]
    async fn falls_back_when_the_primary_degrades() {
        let fallback_results = vec![RetrievalResult {
            source_id: "fallback".to_string(),
            excerpt: "fallback evidence".to_string(),
            relevance: 0.5,
        }];
        let provider = CompositeRetrievalProvider::new(AlwaysDegraded, AlwaysOk(fallback_results.clone()));
        let results = provider.query(&sample_query()).await.expect("query");
        assert_eq!(results, fallback_results);
    }

    #[tokio::test]
    async fn reports_unavailable_when_both_ports_fail() {
        let provider = CompositeRetrievalProvider::new(AlwaysUnavailable, AlwaysDegraded);
        let outcome = provider.query(&sample_query()).await;
        assert!(matches!(outcome, Err(RetrievalError::Unavailable(_))));
    }
}
