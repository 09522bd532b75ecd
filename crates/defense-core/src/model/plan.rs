// defense-core/src/model/plan.rs
// ============================================================================
// Module: Plan
// Description: Fixed enumeration of subscription tiers and their quota limits.
// Purpose: Give the quota gate a closed, known set of per-tenant limits.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Plan tiers and their concrete request/token limits recover the values a
//! contracted-review system would actually ship with a free trial tier, a
//! default paid tier, and escalating limits above it. `Plan::Starter` is the
//! default assigned to a company the quota gate has never seen before.

use serde::Deserialize;
use serde::Serialize;

/// A fixed subscription tier known to the [`crate::runtime::QuotaGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// Free trial tier.
    Free,
    /// Default paid tier for a newly onboarded company.
    Starter,
    /// Mid-tier plan for established customers.
    Pro,
    /// Highest tier, typically negotiated per contract.
    Enterprise,
    /// Internal/demo tier used for sales walkthroughs.
    Demo,
}

impl Plan {
    /// The tier assigned to a company with no recorded plan.
    pub const DEFAULT: Self = Self::Starter;

    /// Returns the request/token limits for this tier.
    #[must_use]
    pub const fn limits(self) -> PlanLimits {
        match self {
            Self::Free => PlanLimits { requests_per_day: 50, tokens_per_day: 100_000 },
            Self::Starter => PlanLimits { requests_per_day: 500, tokens_per_day: 1_000_000 },
            Self::Pro => PlanLimits { requests_per_day: 5_000, tokens_per_day: 10_000_000 },
            Self::Enterprise => {
                PlanLimits { requests_per_day: 50_000, tokens_per_day: 100_000_000 }
            }
            Self::Demo => PlanLimits { requests_per_day: 100, tokens_per_day: 200_000 },
        }
    }
}

impl Default for Plan {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The two quota dimensions a [`Plan`] bounds, reset each UTC calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    /// Maximum number of deliberation requests (stage runs) per day.
    pub requests_per_day: u64,
    /// Maximum number of model tokens consumed per day.
    pub tokens_per_day: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_plan_matches_documented_limits() {
        let limits = Plan::Free.limits();
        assert_eq!(limits.requests_per_day, 50);
        assert_eq!(limits.tokens_per_day, 100_000);
    }

    #[test]
    fn default_plan_is_starter() {
        assert_eq!(Plan::default(), Plan::Starter);
    }
}
