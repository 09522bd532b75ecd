// defense-core/src/time.rs
// ============================================================================
// Module: Timestamp
// Description: Canonical timestamp representation for deliberation records.
// Purpose: Give every persisted record (decisions, state transitions, usage
//          counters) a single serializable time representation.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Unlike a replay-verified control plane, the deliberation orchestrator
//! performs real I/O against retrieval/model backends and records real
//! wall-clock time. [`Timestamp`] wraps unix milliseconds rather than an
//! opaque logical clock, but callers still supply it explicitly — the core
//! crate has no runtime dependency on `SystemTime`, only the orchestrator's
//! clock port does.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// A point in time expressed as milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Builds a timestamp from unix milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the elapsed milliseconds from `self` to `other`, clamped to
    /// zero when `other` precedes `self`.
    #[must_use]
    pub fn elapsed_millis_until(self, other: Self) -> u64 {
        u64::try_from(other.0.saturating_sub(self.0)).unwrap_or(0)
    }

    /// Renders the UTC calendar date this timestamp falls on as
    /// `YYYY-MM-DD`, the key a day-scoped counter resets against at UTC
    /// midnight, per spec.md §3's `UsageCounter (one per (companyId,
    /// dateUTC))`.
    #[must_use]
    pub fn utc_date_key(self) -> String {
        let seconds = self.0.div_euclid(1000);
        let date = time::OffsetDateTime::from_unix_timestamp(seconds)
            .map(time::OffsetDateTime::date)
            .unwrap_or(time::Date::MIN);
        let format = time::macros::format_description!("[year]-[month]-[day]");
        date.format(&format).unwrap_or_else(|_| date.to_string())
    }

    /// Returns the instant of the next UTC midnight strictly after `self`,
    /// the `resetAt` a `QuotaExceeded` failure reports per spec.md §4.2.
    #[must_use]
    pub fn next_utc_midnight(self) -> Self {
        let seconds = self.0.div_euclid(1000);
        let today = time::OffsetDateTime::from_unix_timestamp(seconds)
            .map(time::OffsetDateTime::date)
            .unwrap_or(time::Date::MIN);
        let next_date = today.next_day().unwrap_or(today);
        let midnight = next_date.midnight().assume_utc();
        Self::from_unix_millis(midnight.unix_timestamp() * 1000)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Supplies the current time to components that must record it.
///
/// Kept as a trait (rather than calling `SystemTime::now()` directly
/// throughout the runtime) so tests can supply a fixed or stepped clock.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// A [`Clock`] backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let now = time::OffsetDateTime::now_utc();
        Timestamp::from_unix_millis(now.unix_timestamp() * 1000 + i64::from(now.millisecond()))
    }
}

/// A [`Clock`] that returns a fixed, caller-supplied time; used in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}
