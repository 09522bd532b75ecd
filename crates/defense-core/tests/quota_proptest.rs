// defense-core/tests/quota_proptest.rs
// ============================================================================
// Test: Quota counter properties
// Description: Property tests over `InMemoryUsageCounterStore::check_and_increment`,
//              replaying arbitrary sequences of admission requests against
//              arbitrary plan limits within a single window.
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use defense_core::identifiers::CompanyId;
use defense_core::runtime::InMemoryUsageCounterStore;
use defense_core::time::Timestamp;
use defense_core::UsageCounterStore;
use proptest::prelude::*;

/// Replays `requests` sequentially against a fresh store with the given
/// limits, all within the same instant (so the window never elapses), and
/// returns how many were admitted alongside the final counters.
fn replay(requests_limit: u64, tokens_limit: u64, requests: &[u64]) -> (u64, u64, u64) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    runtime.block_on(async {
        let store = InMemoryUsageCounterStore::new();
        let company = CompanyId::new("acme");
        let now = Timestamp::from_unix_millis(0);
        let mut admitted_count = 0u64;
        let mut last_requests_used = 0u64;
        let mut last_tokens_used = 0u64;
        for &tokens in requests {
            let admission = store
                .check_and_increment(&company, tokens, requests_limit, tokens_limit, now)
                .await
                .expect("check_and_increment");
            if admission.admitted {
                admitted_count += 1;
            }
            last_requests_used = admission.requests_used;
            last_tokens_used = admission.tokens_used;
        }
        (admitted_count, last_requests_used, last_tokens_used)
    })
}

proptest! {
    /// Counters never exceed the plan limits, no matter how many requests
    /// of whatever size are thrown at them within a single window.
    #[test]
    fn counters_never_exceed_their_limits(
        requests_limit in 1u64..20,
        tokens_limit in 1u64..2000,
        requests in prop::collection::vec(1u64..500, 0..40),
    ) {
        let (_admitted, requests_used, tokens_used) = replay(requests_limit, tokens_limit, &requests);
        prop_assert!(requests_used <= requests_limit);
        prop_assert!(tokens_used <= tokens_limit);
    }

    /// The number of admitted requests never exceeds the request limit: once
    /// `requests_limit` requests have been admitted, every later call in the
    /// same window is denied regardless of its token size.
    #[test]
    fn admitted_request_count_never_exceeds_the_request_limit(
        requests_limit in 1u64..20,
        requests in prop::collection::vec(1u64..50, 0..40),
    ) {
        // A token limit far larger than any plausible sum keeps the request
        // count, not the token budget, as the only thing that can deny.
        let (admitted, _requests_used, _tokens_used) = replay(requests_limit, u64::from(u32::MAX), &requests);
        prop_assert!(admitted <= requests_limit);
    }

    /// A request whose own token cost already exceeds the remaining token
    /// budget is denied outright, and denial never increments either counter.
    #[test]
    fn a_denied_request_leaves_counters_unchanged(
        tokens_limit in 1u64..1000,
        first_tokens in 0u64..1000,
    ) {
        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        let (before, after, admitted) = runtime.block_on(async {
            let store = InMemoryUsageCounterStore::new();
            let company = CompanyId::new("acme");
            let now = Timestamp::from_unix_millis(0);

            let first = store
                .check_and_increment(&company, first_tokens, 1000, tokens_limit, now)
                .await
                .expect("first");
            let before = (first.requests_used, first.tokens_used);

            // A second request asking for more tokens than remain must be
            // denied, and must leave the counters exactly where they were.
            let remaining = tokens_limit.saturating_sub(before.1);
            let over_budget = remaining + 1;
            let second = store
                .check_and_increment(&company, over_budget, 1000, tokens_limit, now)
                .await
                .expect("second");

            (before, (second.requests_used, second.tokens_used), second.admitted)
        });

        prop_assert!(!admitted);
        prop_assert_eq!(after.0, before.0);
        prop_assert_eq!(after.1, before.1);
    }
}
