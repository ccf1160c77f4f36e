// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    first = { 1, 1_000 },
    second = { 2, 2_000 },
    third = { 3, 4_000 },
    capped = { 6, 30_000 },
    far_out = { 40, 30_000 },
)]
fn default_backoff_doubles_up_to_cap(attempt: u32, expected_ms: u64) {
    assert_eq!(RetryPolicy::default().backoff(attempt), Duration::from_millis(expected_ms));
}

#[test]
fn default_allows_two_retries() {
    let policy = RetryPolicy::default();
    assert!(policy.allows_retry(1));
    assert!(policy.allows_retry(2));
    assert!(!policy.allows_retry(3));
}

#[test]
fn no_retry_policy_stops_after_first_attempt() {
    assert!(!RetryPolicy::no_retry().allows_retry(1));
}

#[test]
fn zero_attempts_behaves_like_one() {
    let policy = RetryPolicy { max_attempts: 0, ..RetryPolicy::default() };
    assert!(!policy.allows_retry(1));
}

#[test]
fn immediate_policy_has_no_delay() {
    let policy = RetryPolicy::immediate(5);
    assert_eq!(policy.backoff(3), Duration::ZERO);
    assert!(policy.allows_retry(4));
}

#[test]
fn sub_one_multiplier_is_treated_as_constant() {
    let policy = RetryPolicy { multiplier: 0.5, ..RetryPolicy::default() };
    assert_eq!(policy.backoff(4), Duration::from_millis(1_000));
}

#[test]
fn policy_deserializes_with_partial_fields() {
    let policy: RetryPolicy = serde_json::from_str(r#"{"max_attempts": 5}"#).unwrap();
    assert_eq!(policy.max_attempts, 5);
    assert_eq!(policy.initial_backoff_ms, 1_000);
}

proptest::proptest! {
    #[test]
    fn backoff_never_decreases_or_exceeds_cap(
        initial in 0u64..5_000,
        cap in 0u64..60_000,
        multiplier in 1.5f64..4.0,
        attempt in 1u32..50,
    ) {
        let policy = RetryPolicy { max_attempts: 10, initial_backoff_ms: initial, max_backoff_ms: cap, multiplier };
        let here = policy.backoff(attempt);
        proptest::prop_assert!(here <= Duration::from_millis(cap));
        proptest::prop_assert!(policy.backoff(attempt + 1) >= here);
    }
}
