// defense-core/src/interfaces/usage_store.rs
// ============================================================================
// Module: UsageCounterStore
// Description: Atomic check-and-increment persistence for quota counters.
// Purpose: Let the quota gate admit requests without a read/modify/write
//          race between concurrent callers for the same company.
// Dependencies: async-trait, thiserror, crate::identifiers, crate::time
// ============================================================================

use async_trait::async_trait;
use thiserror::Error;

use crate::identifiers::CompanyId;
use crate::time::Timestamp;

/// Errors a [`UsageCounterStore`] may return.
#[derive(Debug, Error)]
pub enum UsageStoreError {
    /// Underlying I/O failure.
    #[error("usage store io error: {0}")]
    Io(String),
}

/// The outcome of a single [`UsageCounterStore::check_and_increment`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaAdmission {
    /// Whether the request was admitted.
    pub admitted: bool,
    /// Requests consumed in the window after this call (whether or not it
    /// was admitted, so callers can report remaining quota).
    pub requests_used: u64,
    /// Tokens consumed in the window after this call.
    pub tokens_used: u64,
}

/// Durable storage port for per-company quota counters.
///
/// # Invariants
/// - `check_and_increment` is atomic: implementations must not allow two
///   concurrent callers for the same company to both observe capacity and
///   both be admitted when only one fits under the limit.
/// - Implementations are responsible for resetting a company's counter
///   once the UTC calendar date changes, per
///   [`crate::model::UsageCounter::is_same_utc_day`].
#[async_trait]
pub trait UsageCounterStore: Send + Sync {
    /// Atomically checks whether `requested_tokens` additional tokens (and
    /// one additional request) fit under `company`'s plan limits, and if
    /// so, increments the counter and admits the request.
    ///
    /// # Errors
    ///
    /// Returns [`UsageStoreError`] when the store cannot be read or written.
    async fn check_and_increment(
        &self,
        company_id: &CompanyId,
        requested_tokens: u64,
        limits_requests_per_day: u64,
        limits_tokens_per_day: u64,
        now: Timestamp,
    ) -> Result<QuotaAdmission, UsageStoreError>;
}
