//! Admission Control Properties
//!
//! **Purpose:** Pin down the externally observable behavior of both admission
//! strategies through the public API only, on a manually driven clock.
//!
//! **What We're Testing:**
//! 1. Token bucket bounds and refill arithmetic
//! 2. Windowed budget, safety margin, and wait hints
//! 3. Adaptive backoff and the critical hard ceiling
//! 4. Startup grace for HIGH traffic
//! 5. Diagnostics over the trailing minute, and their idempotence

mod helpers;

use std::sync::Arc;

use helpers::{
    admit_and_record, bucket_config, limiter_with_clock, test_clock, windowed_config, START_MS,
};
use pod_admission::{AdmissionControl, ManualClock, RequestPriority, TokenBucket};

fn bucket(capacity: u32, refill_interval_ms: u64) -> (TokenBucket, Arc<ManualClock>) {
    let clock = test_clock();
    (
        TokenBucket::new(capacity, 1.0, refill_interval_ms, clock.clone()),
        clock,
    )
}

#[test]
fn test_bucket_tokens_stay_within_bounds() {
    let (bucket, clock) = bucket(4, 1_000);

    // Interleave bursts of consumption with uneven clock steps
    let steps: [(usize, i64); 8] = [
        (6, 0),
        (1, 250),
        (3, 1_700),
        (0, 9_000),
        (5, 10),
        (2, 3_333),
        (7, 0),
        (0, 60_000),
    ];
    for (consumes, advance_ms) in steps {
        for _ in 0..consumes {
            bucket.try_consume(false);
            let tokens = bucket.available_tokens();
            assert!((0.0..=4.0).contains(&tokens), "tokens out of bounds: {}", tokens);
        }
        clock.advance(advance_ms);
        let tokens = bucket.available_tokens();
        assert!((0.0..=4.0).contains(&tokens), "tokens out of bounds: {}", tokens);
    }
    assert_eq!(bucket.available_tokens(), 4.0);
}

#[test]
fn test_bucket_refills_one_token_per_interval() {
    let (bucket, clock) = bucket(3, 6_000);
    for _ in 0..3 {
        assert!(bucket.try_consume(true));
    }
    assert!(!bucket.peek());

    clock.advance(6_000);
    assert!(bucket.peek());
    assert_eq!(bucket.available_tokens(), 1.0);

    // Peeking does not consume
    assert!(bucket.peek());
    assert!(bucket.try_consume(false));
    assert!(!bucket.peek());
}

#[test]
fn test_fourth_normal_denied_until_minute_boundary() {
    let (limiter, clock) = limiter_with_clock(&windowed_config(5, 0.25));
    assert_eq!(limiter.stats().effective_limit, 3);

    for _ in 0..3 {
        assert!(admit_and_record(&limiter, RequestPriority::Normal));
    }

    clock.advance(12_345);
    let decision = limiter.should_allow_request(RequestPriority::Normal);
    assert!(!decision.allowed);
    assert_eq!(decision.wait_time_ms, 50_000 - 12_345);
}

#[test]
fn test_normal_rate_limit_backs_off_until_boundary() {
    let (limiter, clock) = limiter_with_clock(&windowed_config(10, 0.2));
    limiter.record_request(RequestPriority::Normal, false, 400, true);

    let stats = limiter.stats();
    assert!(stats.in_backoff);
    assert_eq!(stats.backoff_remaining_ms, 50_000);

    clock.advance(49_999);
    assert!(!limiter.should_allow_request(RequestPriority::Normal).allowed);

    clock.advance(1);
    assert!(limiter.should_allow_request(RequestPriority::Normal).allowed);
}

#[test]
fn test_critical_ceiling_holds_with_bypass() {
    let (limiter, _clock) = limiter_with_clock(&windowed_config(5, 0.25));

    // Reported outcomes count whether or not they went through admission
    for _ in 0..6 {
        limiter.record_request(RequestPriority::High, true, 100, false);
    }
    assert!(limiter.should_allow_request(RequestPriority::Critical).allowed);

    limiter.record_request(RequestPriority::High, true, 100, false);
    assert_eq!(limiter.stats().requests_this_minute, 7);
    let decision = limiter.should_allow_request(RequestPriority::Critical);
    assert!(!decision.allowed);
    assert_eq!(decision.wait_time_ms, 50_000);
}

#[test]
fn test_high_grace_relaxation_and_its_withdrawal() {
    let (limiter, clock) = limiter_with_clock(&windowed_config(5, 0.25));
    for _ in 0..3 {
        assert!(admit_and_record(&limiter, RequestPriority::Normal));
    }
    assert!(!limiter.should_allow_request(RequestPriority::Normal).allowed);

    // Relaxed limit is max - 1 = 4
    assert!(limiter.should_allow_request(RequestPriority::High).allowed);
    limiter.record_request(RequestPriority::High, false, 900, true);

    clock.advance(1_000);
    let decision = limiter.should_allow_request(RequestPriority::High);
    assert!(!decision.allowed);
    assert!(limiter.stats().in_grace_period);
}

#[test]
fn test_high_not_relaxed_once_grace_is_over() {
    let (limiter, clock) = limiter_with_clock(&windowed_config(5, 0.25));
    clock.advance(300_000);
    assert!(!limiter.stats().in_grace_period);

    for _ in 0..3 {
        assert!(admit_and_record(&limiter, RequestPriority::Normal));
    }
    assert!(!limiter.should_allow_request(RequestPriority::High).allowed);
}

#[test]
fn test_stats_count_recent_rate_limits() {
    let (limiter, clock) = limiter_with_clock(&windowed_config(100, 0.2));
    for _ in 0..7 {
        limiter.record_request(RequestPriority::Normal, true, 200, false);
    }
    for _ in 0..3 {
        limiter.record_request(RequestPriority::High, false, 500, true);
    }

    let stats = limiter.stats();
    assert_eq!(stats.recent_rate_limit_errors, 3);
    assert_eq!(stats.recent_requests, 10);
    assert_eq!(stats.average_response_time_ms, 290.0);

    // Outcomes age out of the trailing minute
    clock.advance(60_000);
    let stats = limiter.stats();
    assert_eq!(stats.recent_rate_limit_errors, 0);
    assert_eq!(stats.history_len, 10);
}

#[test]
fn test_stats_and_peek_are_idempotent() {
    let (limiter, _clock) = limiter_with_clock(&windowed_config(5, 0.25));
    admit_and_record(&limiter, RequestPriority::Normal);
    limiter.record_request(RequestPriority::Normal, false, 100, true);
    assert_eq!(limiter.stats(), limiter.stats());
    assert_eq!(limiter.recommendations(), limiter.recommendations());

    let (bucket, _clock) = bucket(2, 1_000);
    bucket.try_consume(false);
    let first = (bucket.peek(), bucket.available_tokens());
    let second = (bucket.peek(), bucket.available_tokens());
    assert_eq!(first, second);
}

#[test]
fn test_wait_hint_never_negative_after_clock_jump() {
    let (limiter, clock) = limiter_with_clock(&windowed_config(5, 0.25));
    limiter.record_request(RequestPriority::High, false, 100, true);

    clock.set(START_MS - 3_600_000);
    let decision = limiter.should_allow_request(RequestPriority::Normal);
    assert!(!decision.allowed);
    // u64 by construction; the hint must still be bounded and sensible
    assert!(decision.wait_time_ms <= 3_600_000 + 60_000);
}

#[test]
fn test_bucket_strategy_keeps_reserve_for_priority_traffic() {
    let (limiter, _clock) = limiter_with_clock(&bucket_config(4, 6_000, 2));
    assert!(admit_and_record(&limiter, RequestPriority::Normal));
    assert!(admit_and_record(&limiter, RequestPriority::Normal));
    assert!(!limiter.should_allow_request(RequestPriority::Normal).allowed);

    assert!(admit_and_record(&limiter, RequestPriority::High));
    assert!(admit_and_record(&limiter, RequestPriority::Critical));
    let decision = limiter.should_allow_request(RequestPriority::Critical);
    assert!(!decision.allowed);
    assert_eq!(decision.wait_time_ms, 6_000);
}

#[test]
fn test_grace_period_never_reenters_after_clock_jump() {
    let (limiter, clock) = limiter_with_clock(&windowed_config(5, 0.25));
    clock.advance(400_000);
    limiter.should_allow_request(RequestPriority::Normal);
    assert!(!limiter.stats().in_grace_period);

    clock.advance(-350_000);
    limiter.should_allow_request(RequestPriority::Normal);
    assert!(!limiter.stats().in_grace_period);
}

#[test]
fn test_reserve_check_sees_fractional_tokens() {
    let (bucket, clock) = bucket(4, 1_000);
    bucket.drain();
    clock.advance(2_500);
    assert!(bucket.can_consume_reserving(2));
}
