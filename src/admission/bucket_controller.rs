//! Admission backed by a token bucket.
//!
//! CRITICAL and HIGH requests may spend every token; NORMAL requests must
//! leave `priority_reserve` tokens behind, so background polling defers itself
//! before it can starve interactive traffic.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::diagnostics::AdmissionStats;
use super::history::{RequestHistory, RequestMetric};
use super::token_bucket::TokenBucket;
use super::types::{AdmissionDecision, RequestPriority};
use super::window::MinuteWindow;
use super::AdmissionControl;
use crate::clock::Clock;
use crate::config::{
    AdmissionConfig, StrategyKind, TokenBucketConfig, DEFAULT_HISTORY_MAX_ENTRIES,
    RECENT_WINDOW_MS,
};

struct BucketControllerState {
    /// Only feeds diagnostics; the bucket alone decides admission
    window: MinuteWindow,
    history: RequestHistory,
}

/// `AdmissionControl` over a [`TokenBucket`] with a priority reserve.
pub struct TokenBucketController {
    bucket: TokenBucket,
    settings: TokenBucketConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<BucketControllerState>,
}

impl TokenBucketController {
    /// Creates a controller with a full bucket from `config.token_bucket`.
    pub fn new(config: &AdmissionConfig, clock: Arc<dyn Clock>) -> Self {
        let settings = config.token_bucket.clone();
        let now = clock.now_ms();
        let bucket = TokenBucket::new(
            settings.capacity,
            settings.refill_rate,
            settings.refill_interval_ms,
            Arc::clone(&clock),
        );
        log::info!(
            "Token bucket admission controller: capacity {}, {} token(s) per {}ms, reserve {}",
            settings.capacity,
            settings.refill_rate,
            settings.refill_interval_ms,
            settings.priority_reserve
        );
        TokenBucketController {
            bucket,
            settings,
            clock,
            state: Mutex::new(BucketControllerState {
                window: MinuteWindow::new(now),
                history: RequestHistory::new(
                    config.history_retention_ms,
                    DEFAULT_HISTORY_MAX_ENTRIES,
                ),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BucketControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The underlying bucket, for callers that want `wait_for_token`.
    pub fn bucket(&self) -> &TokenBucket {
        &self.bucket
    }

    /// Tokens the bucket refills per minute.
    fn tokens_per_minute(&self) -> u32 {
        #[allow(clippy::cast_precision_loss)]
        let per_minute = self.settings.refill_rate * 60_000.0
            / self.settings.refill_interval_ms as f64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let per_minute = per_minute.floor().min(f64::from(u32::MAX)) as u32;
        per_minute
    }
}

impl AdmissionControl for TokenBucketController {
    fn should_allow_request(&self, priority: RequestPriority) -> AdmissionDecision {
        let reserve = self.settings.priority_reserve;
        let (admitted, target) = match priority {
            RequestPriority::Critical | RequestPriority::High => {
                (self.bucket.try_consume(true), 1.0)
            }
            RequestPriority::Normal => (
                self.bucket.try_consume_reserving(reserve),
                f64::from(reserve) + 1.0,
            ),
        };

        if admitted {
            return AdmissionDecision::allow(format!(
                "Token available ({:.1} left)",
                self.bucket.available_tokens()
            ));
        }

        let wait = self.bucket.time_until_tokens_ms(target).max(1);
        log::debug!("Denied {} request: waiting {}ms for tokens", priority, wait);
        let reason = if priority == RequestPriority::Normal {
            format!("Token bucket at priority reserve ({} tokens held back)", reserve)
        } else {
            "Token bucket empty".to_string()
        };
        AdmissionDecision::deny(wait, reason)
    }

    fn record_request(
        &self,
        priority: RequestPriority,
        success: bool,
        response_time_ms: u64,
        rate_limited: bool,
    ) {
        let now = self.clock.now_ms();
        let mut state = self.lock();
        state.window.roll(now);
        state.window.increment();
        state.history.record(RequestMetric {
            timestamp_ms: now,
            priority,
            success,
            response_time_ms,
            rate_limited,
        });

        if rate_limited {
            // Same conservative bias as the windowed pin: a 429 means the
            // upstream burst allowance is gone, whatever the bucket believes
            self.bucket.drain();
            log::warn!("{} request rate limited; token bucket drained", priority);
        }
    }

    fn stats(&self) -> AdmissionStats {
        let now = self.clock.now_ms();
        let state = self.lock();
        let per_minute = self.tokens_per_minute();
        AdmissionStats {
            strategy: StrategyKind::TokenBucket,
            requests_this_minute: state.window.count_at(now),
            max_requests_per_minute: per_minute,
            effective_limit: per_minute,
            ms_until_window_reset: MinuteWindow::ms_until_reset(now),
            in_backoff: false,
            backoff_remaining_ms: 0,
            in_grace_period: false,
            grace_remaining_ms: 0,
            recent_requests: state.history.recent(now, RECENT_WINDOW_MS).count(),
            recent_rate_limit_errors: state.history.recent_rate_limited(now, RECENT_WINDOW_MS),
            average_response_time_ms: state
                .history
                .average_response_time_ms(now, RECENT_WINDOW_MS),
            history_len: state.history.len(),
            available_tokens: Some(self.bucket.available_tokens()),
            token_capacity: Some(self.bucket.capacity()),
            priority_reserve: Some(self.settings.priority_reserve),
        }
    }

    fn reset(&self) {
        let now = self.clock.now_ms();
        let mut state = self.lock();
        state.window.reset(now);
        state.history.clear();
        self.bucket.reset();
    }
}
