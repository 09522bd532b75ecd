// defense-providers/src/http.rs
// ============================================================================
// Module: HTTP Retrieval Provider
// Description: RetrievalPort backed by an external HTTP retrieval backend.
// Purpose: Let a deployment delegate evidence retrieval to a separate
//          service without the core depending on its wire format.
// Dependencies: defense-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! Forwards a [`defense_core::RetrievalQuery`] as a JSON `POST` body to a
//! configured endpoint and parses a JSON array response back into
//! [`defense_core::RetrievalResult`]s. Redirects are disabled, only
//! `https` is allowed unless `allow_http` is set, and an optional host
//! allowlist can further restrict the endpoint, mirroring the host/scheme
//! checks the teacher's HTTP evidence provider applies before every
//! request.
//!
//! A `503` response is treated as [`defense_core::RetrievalError::Degraded`]
//! so a stalled retrieval backend degrades a deliberation rather than
//! failing it outright; every other non-success status or transport
//! failure is [`defense_core::RetrievalError::Unavailable`].

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use defense_core::RetrievalError;
use defense_core::RetrievalPort;
use defense_core::RetrievalQuery;
use defense_core::RetrievalResult;
use reqwest::Client;
use reqwest::Url;
use reqwest::redirect::Policy;
use serde::Serialize;

/// Configuration for [`HttpRetrievalProvider`].
#[derive(Debug, Clone)]
pub struct HttpRetrievalProviderConfig {
    /// Endpoint the provider sends retrieval requests to.
    pub endpoint: Url,
    /// Request timeout.
    pub timeout_ms: u64,
    /// Maximum response body size, in bytes.
    pub max_response_bytes: usize,
    /// Allow cleartext `http` endpoints (disabled by default).
    pub allow_http: bool,
    /// Optional host allowlist; `None` permits `endpoint`'s host
    /// unconditionally.
    pub allowed_hosts: Option<BTreeSet<String>>,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

/// Request body sent to the retrieval endpoint.
#[derive(Debug, Serialize)]
struct RetrievalRequest<'a> {
    company_id: &'a str,
    project_id: &'a str,
    text: &'a str,
    limit: usize,
}

/// [`RetrievalPort`] backed by an external HTTP retrieval backend.
pub struct HttpRetrievalProvider {
    config: HttpRetrievalProviderConfig,
    client: Client,
}

impl HttpRetrievalProvider {
    /// Creates a provider that sends retrieval requests to
    /// `config.endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Unavailable`] when the endpoint's scheme
    /// or host is not permitted, or the HTTP client cannot be built.
    pub fn new(config: HttpRetrievalProviderConfig) -> Result<Self, RetrievalError> {
        validate_endpoint(&config)?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|err| RetrievalError::Unavailable(format!("http client build failed: {err}")))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl RetrievalPort for HttpRetrievalProvider {
    async fn query(&self, query: &RetrievalQuery) -> Result<Vec<RetrievalResult>, RetrievalError> {
        let body = RetrievalRequest {
            company_id: query.company_id.as_str(),
            project_id: query.project_id.as_str(),
            text: &query.text,
            limit: query.limit,
        };

        let response = self
            .client
            .post(self.config.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|err| RetrievalError::Unavailable(format!("retrieval request failed: {err}")))?;

        let status = response.status();
        if status.as_u16() == 503 {
            return Err(RetrievalError::Degraded(format!("retrieval backend returned {status}")));
        }
        if !status.is_success() {
            return Err(RetrievalError::Unavailable(format!("retrieval backend returned {status}")));
        }

        if let Some(expected) = response.content_length() {
            let max_bytes = self.config.max_response_bytes as u64;
            if expected > max_bytes {
                return Err(RetrievalError::Unavailable(format!(
                    "retrieval response exceeds {max_bytes} bytes"
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| RetrievalError::Unavailable(format!("retrieval response read failed: {err}")))?;
        if bytes.len() > self.config.max_response_bytes {
            return Err(RetrievalError::Unavailable(format!(
                "retrieval response exceeds {} bytes",
                self.config.max_response_bytes
            )));
        }

        serde_json::from_slice::<Vec<RetrievalResult>>(&bytes)
            .map_err(|err| RetrievalError::Unavailable(format!("malformed retrieval response: {err}")))
    }
}

/// Validates scheme and host policy for `config.endpoint`.
fn validate_endpoint(config: &HttpRetrievalProviderConfig) -> Result<(), RetrievalError> {
    match config.endpoint.scheme() {
        "https" => {}
        "http" if config.allow_http => {}
        scheme => {
            return Err(RetrievalError::Unavailable(format!(
                "unsupported retrieval endpoint scheme: {scheme}"
            )));
        }
    }
    if let Some(allowlist) = &config.allowed_hosts {
        let host = config
            .endpoint
            .host_str()
            .ok_or_else(|| RetrievalError::Unavailable("retrieval endpoint has no host".to_string()))?;
        if !allowlist.contains(host) {
            return Err(RetrievalError::Unavailable(format!(
                "retrieval endpoint host not allowed: {host}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test assertions use expect/unwrap for clarity."
    )]

    use super::*;

    fn base_config(endpoint: &str) -> HttpRetrievalProviderConfig {
        HttpRetrievalProviderConfig {
            endpoint: Url::parse(endpoint).expect("url"),
            timeout_ms: 5_000,
            max_response_bytes: 1024 * 1024,
            allow_http: false,
            allowed_hosts: None,
            user_agent: "defense-gate/0.1".to_string(),
        }
    }

    #[test]
    fn rejects_plain_http_by_default() {
        let config = base_config("http://evidence.internal/retrieve");
        assert!(matches!(
            HttpRetrievalProvider::new(config),
            Err(RetrievalError::Unavailable(_))
        ));
    }

    #[test]
    fn allows_plain_http_when_explicitly_enabled() {
        let mut config = base_config("http://evidence.internal/retrieve");
        config.allow_http = true;
        assert!(HttpRetrievalProvider::new(config).is_ok());
    }

    #[test]
    fn rejects_a_host_outside_the_allowlist() {
        let mut config = base_config("https://evidence.internal/retrieve");
        config.allowed_hosts = Some(BTreeSet::from(["retrieval.trusted.example".to_string()]));
        assert!(matches!(
            HttpRetrievalProvider::new(config),
            Err(RetrievalError::Unavailable(_))
        ));
    }

    #[test]
    fn accepts_a_host_on_the_allowlist() {
        let mut config = base_config("https://retrieval.trusted.example/retrieve");
        config.allowed_hosts = Some(BTreeSet::from(["retrieval.trusted.example".to_string()]));
        assert!(HttpRetrievalProvider::new(config).is_ok());
    }
}
