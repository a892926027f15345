// Shared test helpers for building limiters on a controllable clock.
//
// This module provides common utilities used across multiple test files to reduce duplication.

use std::sync::Arc;

use pod_admission::{
    init_limiter, AdmissionConfig, AdmissionControl, ManualClock, RequestPriority, SharedLimiter,
    StrategyKind, TokenBucketConfig,
};

/// A wall-clock minute boundary (2023-11-14T22:14:00Z).
#[allow(dead_code)]
pub const MINUTE_BOUNDARY_MS: i64 = 1_700_000_040_000;

/// Ten seconds into a minute, leaving 50s before the window rolls.
#[allow(dead_code)]
pub const START_MS: i64 = MINUTE_BOUNDARY_MS + 10_000;

/// Creates a manual clock parked at `START_MS`.
#[allow(dead_code)] // Used by other test files
pub fn test_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(START_MS))
}

/// Windowed config with the given budget and margin; everything else default.
#[allow(dead_code)] // Used by other test files
pub fn windowed_config(max_requests_per_minute: u32, safety_margin: f64) -> AdmissionConfig {
    AdmissionConfig {
        strategy: StrategyKind::Windowed,
        max_requests_per_minute,
        safety_margin,
        ..Default::default()
    }
}

/// Token bucket config with the given shape.
#[allow(dead_code)] // Used by other test files
pub fn bucket_config(capacity: u32, refill_interval_ms: u64, priority_reserve: u32) -> AdmissionConfig {
    AdmissionConfig {
        strategy: StrategyKind::TokenBucket,
        token_bucket: TokenBucketConfig {
            capacity,
            refill_rate: 1.0,
            refill_interval_ms,
            priority_reserve,
        },
        ..Default::default()
    }
}

/// Builds a shared limiter on a fresh manual clock.
#[allow(dead_code)] // Used by other test files
pub fn limiter_with_clock(config: &AdmissionConfig) -> (SharedLimiter, Arc<ManualClock>) {
    let clock = test_clock();
    let limiter = init_limiter(config, clock.clone()).expect("Failed to build limiter");
    (limiter, clock)
}

/// Asks for admission and, if granted, records a successful outcome.
#[allow(dead_code)] // Used by other test files
pub fn admit_and_record(limiter: &dyn AdmissionControl, priority: RequestPriority) -> bool {
    let decision = limiter.should_allow_request(priority);
    if decision.allowed {
        limiter.record_request(priority, true, 150, false);
    }
    decision.allowed
}
