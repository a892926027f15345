//! Request admission control for a rate-limited upstream.
//!
//! Every outbound call asks a limiter for permission first and reports the
//! outcome afterwards:
//!
//! 1. `should_allow_request(priority)` returns an [`AdmissionDecision`]
//! 2. The caller issues, defers, or drops the request
//! 3. `record_request(priority, success, response_time_ms, rate_limited)`
//!
//! Two interchangeable strategies implement [`AdmissionControl`]:
//! - [`WindowedController`]: fixed wall-clock minute budget with a safety
//!   margin, priority bypass rules, and adaptive backoff after a 429
//! - [`TokenBucketController`]: continuously refilling bucket with a reserve
//!   that background traffic may not touch
//!
//! The feedback loop relies on callers reporting every upstream 429 as
//! `rate_limited = true`. Unreported rate limits leave the local view ahead
//! of reality with nothing to correct it.

mod bucket_controller;
mod caller;
mod controller;
mod diagnostics;
mod history;
mod instrumented;
mod token_bucket;
mod types;
mod window;

use std::sync::Arc;

pub use bucket_controller::TokenBucketController;
pub use caller::{RateLimitSignal, ThrottledCaller};
pub use controller::WindowedController;
pub use diagnostics::{recommendations_for, AdmissionStats};
pub use history::{RequestHistory, RequestMetric};
pub use instrumented::InstrumentedLimiter;
pub use token_bucket::TokenBucket;
pub use types::{AdmissionDecision, RequestPriority};

/// Admission decisions and outcome feedback for one upstream account.
///
/// Implementations serialize their own state, so a single instance can be
/// shared by every caller that spends the same budget. Both calls are fast and
/// never block on I/O.
pub trait AdmissionControl: Send + Sync {
    /// Decides whether a request of `priority` may be issued now.
    ///
    /// Never fails; a refusal carries a wait hint and a reason.
    fn should_allow_request(&self, priority: RequestPriority) -> AdmissionDecision;

    /// Reports the outcome of a request that was issued.
    fn record_request(
        &self,
        priority: RequestPriority,
        success: bool,
        response_time_ms: u64,
        rate_limited: bool,
    );

    /// Read-only snapshot of counters and state.
    fn stats(&self) -> AdmissionStats;

    /// Advisory strings for operators, derived from [`stats`](Self::stats).
    fn recommendations(&self) -> Vec<String> {
        recommendations_for(&self.stats())
    }

    /// Administrative reset after a prolonged outage.
    fn reset(&self);
}

/// A limiter shared by every caller of one upstream account.
pub type SharedLimiter = Arc<dyn AdmissionControl>;

impl<L: AdmissionControl + ?Sized> AdmissionControl for Arc<L> {
    fn should_allow_request(&self, priority: RequestPriority) -> AdmissionDecision {
        (**self).should_allow_request(priority)
    }

    fn record_request(
        &self,
        priority: RequestPriority,
        success: bool,
        response_time_ms: u64,
        rate_limited: bool,
    ) {
        (**self).record_request(priority, success, response_time_ms, rate_limited);
    }

    fn stats(&self) -> AdmissionStats {
        (**self).stats()
    }

    fn recommendations(&self) -> Vec<String> {
        (**self).recommendations()
    }

    fn reset(&self) {
        (**self).reset();
    }
}
