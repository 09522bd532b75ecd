// defense-core/src/model/usage.rs
// ============================================================================
// Module: UsageCounter
// Description: A tenant's consumed quota for the current UTC calendar day.
// Purpose: Give the quota gate a single record to check-and-increment.
// Dependencies: serde, crate::identifiers, crate::time
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::CompanyId;
use crate::time::Timestamp;

/// A company's consumed quota for one UTC calendar day.
///
/// # Invariants
/// - `date_utc` is the `YYYY-MM-DD` key this counter is scoped to; a request
///   landing on a different UTC calendar date never reuses it, per spec.md
///   §3's "one per (companyId, dateUTC)" — reset happens by virtue of the
///   date key changing at UTC midnight, not a scheduled job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    /// Company this counter tracks.
    pub company_id: CompanyId,
    /// UTC calendar date (`YYYY-MM-DD`) this counter is scoped to.
    pub date_utc: String,
    /// Requests consumed so far today.
    pub requests: u64,
    /// Tokens consumed so far today.
    pub tokens: u64,
    /// When this counter was last updated.
    pub updated_at: Timestamp,
}

impl UsageCounter {
    /// Builds a fresh, zeroed counter for the UTC calendar date `now` falls
    /// on.
    #[must_use]
    pub fn new(company_id: CompanyId, now: Timestamp) -> Self {
        Self { company_id, date_utc: now.utc_date_key(), requests: 0, tokens: 0, updated_at: now }
    }

    /// Returns `true` when `now` falls on the same UTC calendar date this
    /// counter was created for.
    #[must_use]
    pub fn is_same_utc_day(&self, now: Timestamp) -> bool {
        self.date_utc == now.utc_date_key()
    }
}
