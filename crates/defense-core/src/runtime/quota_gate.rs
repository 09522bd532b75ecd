// defense-core/src/runtime/quota_gate.rs
// ============================================================================
// Module: QuotaGate
// Description: Per-tenant admission control over the orchestrator.
// Purpose: Refuse to start or continue work for a company once it has
//          exhausted its plan's daily request/token budget.
// Dependencies: crate::interfaces::usage_store, crate::model::plan, crate::runtime::plan_directory
// ============================================================================

//! ## Overview
//! `QuotaGate` does not hold counter state itself; it delegates the atomic
//! check-and-increment to a [`UsageCounterStore`] so the same gate works
//! whether counters live in memory (tests) or in `SQLite` (production),
//! without the gate ever risking a read/modify/write race of its own.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::identifiers::CompanyId;
use crate::interfaces::usage_store::QuotaAdmission;
use crate::interfaces::usage_store::UsageCounterStore;
use crate::interfaces::usage_store::UsageStoreError;
use crate::model::Plan;
use crate::runtime::plan_directory::PlanDirectory;
use crate::time::Timestamp;

/// Which of a plan's two budgets a [`QuotaGateError::Exceeded`] was denied
/// against, per spec.md §4.2's `QuotaExceeded{resetAt, plan, kind}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaExceededKind {
    /// The company's daily request count was already at its limit.
    Requests,
    /// The company's daily token budget was already at its limit.
    Tokens,
}

impl fmt::Display for QuotaExceededKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requests => write!(f, "requests"),
            Self::Tokens => write!(f, "tokens"),
        }
    }
}

/// Errors [`QuotaGate::admit`] may return.
#[derive(Debug, Error)]
pub enum QuotaGateError {
    /// The company has exhausted its plan's request or token budget for
    /// the current window.
    #[error("quota exceeded for company {company}: {requests_used}/{requests_limit} requests, {tokens_used}/{tokens_limit} tokens, resets at {reset_at}")]
    Exceeded {
        /// Company that was denied.
        company: CompanyId,
        /// Requests used in the current window.
        requests_used: u64,
        /// Request limit for the company's plan.
        requests_limit: u64,
        /// Tokens used in the current window.
        tokens_used: u64,
        /// Token limit for the company's plan.
        tokens_limit: u64,
        /// Which budget was exhausted.
        kind: QuotaExceededKind,
        /// When the counter resets: the next UTC midnight.
        reset_at: Timestamp,
        /// The plan the company was checked against.
        plan: Plan,
    },
    /// The usage store could not be read or written.
    #[error(transparent)]
    Store(#[from] UsageStoreError),
}

/// Admission control gate checked before a stage is allowed to run.
pub struct QuotaGate {
    /// Where plan assignments come from.
    plans: Arc<dyn PlanDirectory>,
    /// Where usage counters are persisted.
    store: Arc<dyn UsageCounterStore>,
}

impl QuotaGate {
    /// Builds a quota gate over the given plan directory and usage store.
    #[must_use]
    pub fn new(plans: Arc<dyn PlanDirectory>, store: Arc<dyn UsageCounterStore>) -> Self {
        Self { plans, store }
    }

    /// Checks and, if admitted, atomically records `requested_tokens` of
    /// usage (plus one request) against `company`'s plan limits.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaGateError::Exceeded`] when the company has no budget
    /// remaining, or [`QuotaGateError::Store`] when the usage store fails.
    pub async fn admit(
        &self,
        company: &CompanyId,
        requested_tokens: u64,
        now: Timestamp,
    ) -> Result<QuotaAdmission, QuotaGateError> {
        let plan = self.plans.plan_for(company);
        let limits = plan.limits();
        let admission = self
            .store
            .check_and_increment(
                company,
                requested_tokens,
                limits.requests_per_day,
                limits.tokens_per_day,
                now,
            )
            .await?;
        if admission.admitted {
            Ok(admission)
        } else {
            let kind = if admission.requests_used >= limits.requests_per_day {
                QuotaExceededKind::Requests
            } else {
                QuotaExceededKind::Tokens
            };
            Err(QuotaGateError::Exceeded {
                company: company.clone(),
                requests_used: admission.requests_used,
                requests_limit: limits.requests_per_day,
                tokens_used: admission.tokens_used,
                tokens_limit: limits.tokens_per_day,
                kind,
                reset_at: now.next_utc_midnight(),
                plan,
            })
        }
    }
}
