// defense-broker/src/notifier.rs
// ============================================================================
// Module: HTTP and Log Notifiers
// Description: Notifier implementations delivering status events by HTTP
//              webhook or by structured log line.
// Purpose: Give a deployment an outbound notification channel without the
//          orchestrator depending on its wire format.
// Dependencies: defense-core, reqwest, serde_json, tracing
// ============================================================================

//! ## Overview
//! [`HttpNotifier`] `POST`s a [`defense_core::interfaces::notifier::StatusEvent`]
//! as JSON to a configured webhook, the same bounded, redirect-disabled
//! request shape the teacher's HTTP evidence provider uses for outbound
//! calls. [`LogNotifier`] writes a structured `tracing` event instead of
//! calling out, grounded in the teacher's `LogSink`, and is the default
//! when no webhook is configured.

use std::time::Duration;

use async_trait::async_trait;
use defense_core::NotifierError;
use defense_core::interfaces::notifier::StatusEvent;
use reqwest::Client;
use reqwest::Url;
use reqwest::redirect::Policy;
use serde::Serialize;
use tracing::info;

/// Configuration for [`HttpNotifier`].
#[derive(Debug, Clone)]
pub struct HttpNotifierConfig {
    /// Webhook endpoint notifications are `POST`ed to.
    pub endpoint: Url,
    /// Request timeout.
    pub timeout_ms: u64,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

/// Wire shape of a status event delivered over HTTP.
#[derive(Debug, Serialize)]
struct StatusEventPayload<'a> {
    company_id: &'a str,
    project_id: &'a str,
    stage: String,
    status: String,
    summary: &'a str,
}

impl<'a> From<&'a StatusEvent> for StatusEventPayload<'a> {
    fn from(event: &'a StatusEvent) -> Self {
        Self {
            company_id: event.company_id.as_str(),
            project_id: event.project_id.as_str(),
            stage: event.stage.to_string(),
            status: event.status.to_string(),
            summary: &event.summary,
        }
    }
}

/// [`defense_core::Notifier`] that delivers status events by HTTP webhook.
pub struct HttpNotifier {
    endpoint: Url,
    client: Client,
}

impl HttpNotifier {
    /// Creates a notifier posting to `config.endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError::DeliveryFailed`] when the HTTP client
    /// cannot be built.
    pub fn new(config: HttpNotifierConfig) -> Result<Self, NotifierError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent)
            .redirect(Policy::none())
            .build()
            .map_err(|err| NotifierError::DeliveryFailed(format!("http client build failed: {err}")))?;
        Ok(Self { endpoint: config.endpoint, client })
    }
}

#[async_trait]
impl defense_core::Notifier for HttpNotifier {
    async fn notify(&self, event: &StatusEvent) -> Result<(), NotifierError> {
        let payload = StatusEventPayload::from(event);
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|err| NotifierError::DeliveryFailed(format!("webhook request failed: {err}")))?;
        if !response.status().is_success() {
            return Err(NotifierError::DeliveryFailed(format!(
                "webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// [`defense_core::Notifier`] that records a structured `tracing` event
/// instead of calling out; the default when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl defense_core::Notifier for LogNotifier {
    async fn notify(&self, event: &StatusEvent) -> Result<(), NotifierError> {
        info!(
            company_id = event.company_id.as_str(),
            project_id = event.project_id.as_str(),
            stage = %event.stage,
            status = %event.status,
            summary = %event.summary,
            "deliberation status event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test assertions use expect/unwrap for clarity."
    )]

    use defense_core::CompanyId;
    use defense_core::Notifier;
    use defense_core::ProjectId;
    use defense_core::RunStatus;
    use defense_core::StageId;

    use super::*;

    fn sample_event() -> StatusEvent {
        StatusEvent {
            company_id: CompanyId::new("acme"),
            project_id: ProjectId::new("p1"),
            stage: StageId::E1Strategy,
            status: RunStatus::InProgress,
            summary: "stage advanced".to_string(),
        }
    }

    #[tokio::test]
    async fn log_notifier_never_fails() {
        let notifier = LogNotifier;
        assert!(notifier.notify(&sample_event()).await.is_ok());
    }

    #[test]
    fn http_notifier_construction_succeeds_with_a_valid_config() {
        let config = HttpNotifierConfig {
            endpoint: Url::parse("https://hooks.example/defense-gate").expect("url"),
            timeout_ms: 5_000,
            user_agent: "defense-gate/0.1".to_string(),
        };
        assert!(HttpNotifier::new(config).is_ok());
    }
}
