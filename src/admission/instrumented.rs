//! Counting decorator around any limiter.

use super::diagnostics::AdmissionStats;
use super::types::{AdmissionDecision, RequestPriority};
use super::AdmissionControl;
use crate::error_handling::AdmissionCounters;

/// Wraps a limiter and counts its decisions and rate-limit reports per priority.
///
/// Composed at construction time in place of patching methods at runtime;
/// the inner limiter is unaware of it.
pub struct InstrumentedLimiter<L> {
    inner: L,
    counters: AdmissionCounters,
}

impl<L: AdmissionControl> InstrumentedLimiter<L> {
    /// Wraps `inner` with zeroed counters.
    pub fn new(inner: L) -> Self {
        InstrumentedLimiter {
            inner,
            counters: AdmissionCounters::new(),
        }
    }

    /// Per-priority decision and rate-limit counts.
    pub fn counters(&self) -> &AdmissionCounters {
        &self.counters
    }

    /// The wrapped limiter.
    pub fn inner(&self) -> &L {
        &self.inner
    }
}

impl<L: AdmissionControl> AdmissionControl for InstrumentedLimiter<L> {
    fn should_allow_request(&self, priority: RequestPriority) -> AdmissionDecision {
        let decision = self.inner.should_allow_request(priority);
        self.counters.record_decision(priority, decision.allowed);
        if !decision.allowed {
            log::debug!(
                "{} request refused: {} (retry in {}ms)",
                priority,
                decision.reason,
                decision.wait_time_ms
            );
        }
        decision
    }

    fn record_request(
        &self,
        priority: RequestPriority,
        success: bool,
        response_time_ms: u64,
        rate_limited: bool,
    ) {
        if rate_limited {
            self.counters.record_rate_limited(priority);
        }
        self.inner
            .record_request(priority, success, response_time_ms, rate_limited);
    }

    fn stats(&self) -> AdmissionStats {
        self.inner.stats()
    }

    fn recommendations(&self) -> Vec<String> {
        self.inner.recommendations()
    }

    fn reset(&self) {
        self.counters.clear();
        self.inner.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::WindowedController;
    use crate::clock::ManualClock;
    use crate::config::AdmissionConfig;
    use std::sync::Arc;

    fn instrumented() -> InstrumentedLimiter<WindowedController> {
        let clock = Arc::new(ManualClock::new(1_700_000_050_000));
        let config = AdmissionConfig {
            max_requests_per_minute: 5,
            safety_margin: 0.25,
            ..Default::default()
        };
        InstrumentedLimiter::new(WindowedController::new(config, clock))
    }

    #[test]
    fn test_counts_decisions_per_priority() {
        let limiter = instrumented();
        for _ in 0..4 {
            if limiter.should_allow_request(RequestPriority::Normal).allowed {
                limiter.record_request(RequestPriority::Normal, true, 50, false);
            }
        }
        let normal = limiter.counters().counts(RequestPriority::Normal);
        assert_eq!(normal.allowed, 3);
        assert_eq!(normal.denied, 1);
        assert_eq!(limiter.counters().total_allowed(), 3);
    }

    #[test]
    fn test_passes_through_to_inner() {
        let limiter = instrumented();
        limiter.record_request(RequestPriority::High, false, 50, true);

        assert_eq!(
            limiter.counters().counts(RequestPriority::High).rate_limited,
            1
        );
        assert!(limiter.stats().in_backoff);
        assert_eq!(limiter.inner().stats(), limiter.stats());
    }

    #[test]
    fn test_reset_clears_counters() {
        let limiter = instrumented();
        limiter.should_allow_request(RequestPriority::Normal);
        limiter.reset();
        assert_eq!(limiter.counters().total_allowed(), 0);
    }
}
