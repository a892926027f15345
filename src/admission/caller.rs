//! Caller-side wrapper that applies the ask / call / report contract.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use super::types::RequestPriority;
use super::{AdmissionControl, SharedLimiter};
use crate::error_handling::CallError;

/// Lets `ThrottledCaller` tell a 429 apart from other upstream failures.
pub trait RateLimitSignal {
    /// Whether this error means the upstream rate limited the request.
    fn is_rate_limited(&self) -> bool;
}

/// Runs upstream calls through a shared limiter.
///
/// For each call: ask for admission (waiting out refusals whose hint fits in
/// `max_wait`), run the operation, time it, and report the outcome exactly
/// once. Refusals that do not fit are returned to the caller, which decides
/// whether to drop, queue, or escalate.
#[derive(Clone)]
pub struct ThrottledCaller {
    limiter: SharedLimiter,
    max_wait: Duration,
}

impl ThrottledCaller {
    /// Creates a caller that waits at most `max_wait` for admission.
    pub fn new(limiter: SharedLimiter, max_wait: Duration) -> Self {
        ThrottledCaller { limiter, max_wait }
    }

    /// The shared limiter this caller reports to.
    pub fn limiter(&self) -> &SharedLimiter {
        &self.limiter
    }

    /// Admits, runs, and reports `op`.
    ///
    /// # Errors
    ///
    /// `CallError::Denied` if admission was refused within `max_wait`;
    /// `CallError::Upstream` if the operation itself failed (after reporting it).
    pub async fn call<T, E, F, Fut>(
        &self,
        priority: RequestPriority,
        op: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RateLimitSignal,
    {
        self.admit(priority).await?;

        let started = Instant::now();
        let result = op().await;
        let response_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &result {
            Ok(_) => self
                .limiter
                .record_request(priority, true, response_time_ms, false),
            Err(err) => {
                let rate_limited = err.is_rate_limited();
                self.limiter
                    .record_request(priority, false, response_time_ms, rate_limited);
            }
        }

        result.map_err(CallError::Upstream)
    }

    async fn admit<E>(&self, priority: RequestPriority) -> Result<(), CallError<E>> {
        let deadline = Instant::now() + self.max_wait;
        loop {
            let decision = self.limiter.should_allow_request(priority);
            if decision.allowed {
                return Ok(());
            }

            let wait = Duration::from_millis(decision.wait_time_ms.max(1));
            if Instant::now() + wait > deadline {
                return Err(CallError::Denied {
                    wait_time_ms: decision.wait_time_ms,
                    reason: decision.reason,
                });
            }
            log::trace!("Waiting {:?} before retrying {} request", wait, priority);
            sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{TokenBucketController, WindowedController};
    use crate::clock::ManualClock;
    use crate::config::{AdmissionConfig, TokenBucketConfig};
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    enum PodApiError {
        TooManyRequests,
        Server,
    }

    impl RateLimitSignal for PodApiError {
        fn is_rate_limited(&self) -> bool {
            matches!(self, PodApiError::TooManyRequests)
        }
    }

    fn windowed(max: u32) -> (SharedLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_050_000));
        let config = AdmissionConfig {
            max_requests_per_minute: max,
            safety_margin: 0.0,
            ..Default::default()
        };
        (Arc::new(WindowedController::new(config, clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_call_admitted_and_recorded() {
        let (limiter, _clock) = windowed(2);
        let caller = ThrottledCaller::new(Arc::clone(&limiter), Duration::ZERO);

        let value = caller
            .call(RequestPriority::Normal, || async { Ok::<_, PodApiError>(21) })
            .await
            .unwrap();
        assert_eq!(value, 21);

        let stats = limiter.stats();
        assert_eq!(stats.requests_this_minute, 1);
        assert_eq!(stats.history_len, 1);
    }

    #[tokio::test]
    async fn test_call_denied_does_not_run_op() {
        let (limiter, _clock) = windowed(1);
        let caller = ThrottledCaller::new(Arc::clone(&limiter), Duration::from_millis(100));
        caller
            .call(RequestPriority::Normal, || async { Ok::<_, PodApiError>(()) })
            .await
            .unwrap();

        let mut ran = false;
        let err = caller
            .call(RequestPriority::Normal, || {
                ran = true;
                async { Ok::<_, PodApiError>(()) }
            })
            .await
            .unwrap_err();

        assert!(!ran);
        assert!(matches!(err, CallError::Denied { .. }));
        assert_eq!(err.wait_time_ms(), Some(50_000));
        assert_eq!(limiter.stats().history_len, 1);
    }

    #[tokio::test]
    async fn test_rate_limited_error_triggers_backoff() {
        let (limiter, _clock) = windowed(10);
        let caller = ThrottledCaller::new(Arc::clone(&limiter), Duration::ZERO);

        let err = caller
            .call(RequestPriority::Normal, || async {
                Err::<(), _>(PodApiError::TooManyRequests)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Upstream(PodApiError::TooManyRequests)));

        let stats = limiter.stats();
        assert!(stats.in_backoff);
        assert_eq!(stats.recent_rate_limit_errors, 1);
    }

    #[tokio::test]
    async fn test_other_errors_are_recorded_without_backoff() {
        let (limiter, _clock) = windowed(10);
        let caller = ThrottledCaller::new(Arc::clone(&limiter), Duration::ZERO);

        let err = caller
            .call(RequestPriority::High, || async { Err::<(), _>(PodApiError::Server) })
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Upstream(PodApiError::Server)));

        let stats = limiter.stats();
        assert!(!stats.in_backoff);
        assert_eq!(stats.recent_requests, 1);
        assert_eq!(stats.recent_rate_limit_errors, 0);
    }

    #[tokio::test]
    async fn test_call_waits_out_short_refusal() {
        let clock = Arc::new(ManualClock::new(0));
        let config = AdmissionConfig {
            token_bucket: TokenBucketConfig {
                capacity: 1,
                refill_rate: 1.0,
                refill_interval_ms: 40,
                priority_reserve: 0,
            },
            ..Default::default()
        };
        let limiter: SharedLimiter = Arc::new(TokenBucketController::new(&config, clock.clone()));
        assert!(limiter.should_allow_request(RequestPriority::High).allowed);

        let advancer = {
            let clock = Arc::clone(&clock);
            tokio::spawn(async move {
                sleep(Duration::from_millis(10)).await;
                clock.advance(40);
            })
        };

        let caller = ThrottledCaller::new(Arc::clone(&limiter), Duration::from_secs(1));
        let value = caller
            .call(RequestPriority::High, || async { Ok::<_, PodApiError>("ok") })
            .await
            .unwrap();
        advancer.await.unwrap();
        assert_eq!(value, "ok");
    }
}
