// defense-core/src/interfaces/notifier.rs
// ============================================================================
// Module: Notifier
// Description: Outbound notification interface for stage/run status changes.
// Purpose: Let the orchestrator announce progress without depending on any
//          specific delivery channel (email, webhook, chat).
// Dependencies: async-trait, thiserror, crate::identifiers
// ============================================================================

use async_trait::async_trait;
use thiserror::Error;

use crate::identifiers::CompanyId;
use crate::identifiers::ProjectId;
use crate::identifiers::RunStatus;
use crate::identifiers::StageId;

/// A status-change event the orchestrator wants delivered to an external
/// channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    /// Company the event concerns.
    pub company_id: CompanyId,
    /// Project the event concerns.
    pub project_id: ProjectId,
    /// Stage the run is at when this event was raised.
    pub stage: StageId,
    /// Run status at the time of this event.
    pub status: RunStatus,
    /// Human-readable summary safe to show to the company.
    pub summary: String,
}

/// Errors a [`Notifier`] may return.
#[derive(Debug, Error)]
pub enum NotifierError {
    /// Delivery failed; the caller should not retry indefinitely (the
    /// orchestrator logs and moves on rather than blocking deliberation
    /// progress on notification delivery).
    #[error("notification delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Outbound notification port.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers a status event to whatever channel this notifier wraps.
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError`] when delivery fails. Orchestrator callers
    /// treat this as best-effort and do not fail the deliberation over it.
    async fn notify(&self, event: &StatusEvent) -> Result<(), NotifierError>;
}

/// A [`Notifier`] that drops every event; the default when no outbound
/// channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _event: &StatusEvent) -> Result<(), NotifierError> {
        Ok(())
    }
}
