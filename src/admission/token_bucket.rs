//! Continuously refilling token bucket.
//!
//! The vendor's limiter behaves like a burst allowance that refills smoothly,
//! so refill is fractional: `elapsed / interval * rate` tokens are added on
//! every access instead of whole tokens per discrete tick.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::clock::{saturating_elapsed, Clock};
use crate::config::{MAX_TOKEN_POLL_INTERVAL_MS, MIN_TOKEN_POLL_INTERVAL_MS};

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill_ms: i64,
}

/// Token bucket with fractional refill and a priority reserve check.
///
/// # Invariants
///
/// - `0 <= tokens <= capacity` at all times
/// - Refill never moves backwards: if the clock steps back, no tokens are
///   added until it passes the last refill time again
///
/// # Thread Safety
///
/// State lives behind a mutex, so one bucket can be shared through `Arc`.
/// Every consuming operation checks and decrements under a single lock.
pub struct TokenBucket {
    capacity: u32,
    refill_rate: f64,
    refill_interval_ms: u64,
    clock: Arc<dyn Clock>,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Creates a full bucket.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum tokens (burst allowance)
    /// * `refill_rate` - Tokens added per `refill_interval_ms`
    /// * `refill_interval_ms` - Length of one refill interval
    /// * `clock` - Time source
    ///
    /// Callers are expected to pass validated values (see `AdmissionConfig::validate`).
    pub fn new(
        capacity: u32,
        refill_rate: f64,
        refill_interval_ms: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now_ms();
        TokenBucket {
            capacity,
            refill_rate,
            refill_interval_ms,
            clock,
            state: Mutex::new(BucketState {
                tokens: f64::from(capacity),
                last_refill_ms: now,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        // State is two plain numbers, always left consistent; a panic elsewhere cannot tear it
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refill(&self, state: &mut BucketState) {
        let now = self.clock.now_ms();
        if now < state.last_refill_ms {
            log::warn!(
                "Token bucket clock moved backwards by {}ms, holding refill until it catches up",
                state.last_refill_ms - now
            );
            return;
        }

        let elapsed = saturating_elapsed(now, state.last_refill_ms);
        if elapsed > 0 {
            #[allow(clippy::cast_precision_loss)]
            let added = elapsed as f64 / self.refill_interval_ms as f64 * self.refill_rate;
            state.tokens = (state.tokens + added).min(f64::from(self.capacity));
            state.last_refill_ms = now;
        }
    }

    /// Refills, then takes one token if at least one is available.
    ///
    /// `is_priority` only affects logging.
    pub fn try_consume(&self, is_priority: bool) -> bool {
        let mut state = self.lock();
        self.refill(&mut state);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            log::trace!(
                "Consumed token ({}), {:.2} remaining",
                if is_priority { "priority" } else { "background" },
                state.tokens
            );
            true
        } else {
            log::debug!(
                "No token available ({}), {:.2} in bucket",
                if is_priority { "priority" } else { "background" },
                state.tokens
            );
            false
        }
    }

    /// Refills and reports whether a token is available, without taking it.
    pub fn peek(&self) -> bool {
        let mut state = self.lock();
        self.refill(&mut state);
        state.tokens >= 1.0
    }

    /// Whether tokens strictly exceed `reserve`.
    ///
    /// Read-only check; fractional tokens count. Use
    /// [`try_consume_reserving`](Self::try_consume_reserving) to actually take
    /// a token without cutting into the reserve.
    pub fn can_consume_reserving(&self, reserve: u32) -> bool {
        let mut state = self.lock();
        self.refill(&mut state);
        state.tokens > f64::from(reserve)
    }

    /// Takes one token only if at least `reserve` remain afterwards, as a
    /// single atomic step.
    pub fn try_consume_reserving(&self, reserve: u32) -> bool {
        let mut state = self.lock();
        self.refill(&mut state);
        if state.tokens >= f64::from(reserve) + 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Milliseconds until the token count next reaches a whole number.
    ///
    /// Returns 0 when the bucket is full.
    pub fn time_until_next_token_ms(&self) -> u64 {
        let mut state = self.lock();
        self.refill(&mut state);
        self.ms_until_next_whole(state.tokens)
    }

    fn ms_until_next_whole(&self, tokens: f64) -> u64 {
        if tokens >= f64::from(self.capacity) {
            return 0;
        }
        let deficit = tokens.floor() + 1.0 - tokens;
        #[allow(clippy::cast_precision_loss)]
        let ms = deficit / self.refill_rate * self.refill_interval_ms as f64;
        // Safe cast: deficit <= 1 and the interval is a u64
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ms = ms.ceil().max(0.0) as u64;
        ms
    }

    /// Milliseconds until the bucket holds at least `target` tokens.
    ///
    /// Returns 0 if it already does. `target` above capacity is treated as capacity.
    pub fn time_until_tokens_ms(&self, target: f64) -> u64 {
        let mut state = self.lock();
        self.refill(&mut state);
        let deficit = target.min(f64::from(self.capacity)) - state.tokens;
        if deficit <= 0.0 {
            return 0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ms = deficit / self.refill_rate * self.refill_interval_ms as f64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ms = ms.ceil() as u64;
        ms
    }

    /// Current (refilled) token count.
    pub fn available_tokens(&self) -> f64 {
        let mut state = self.lock();
        self.refill(&mut state);
        state.tokens
    }

    /// Maximum tokens the bucket holds.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Waits for a token, polling at most once per second.
    ///
    /// Returns `true` once a token has been consumed, `false` if `timeout`
    /// elapses first. Dropping the future leaves the bucket untouched: a token
    /// is only ever taken inside `try_consume`, never held across an await.
    pub async fn wait_for_token(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            if self.try_consume(false) {
                return true;
            }
            let Some(poll) = self.next_poll(start, timeout) else {
                log::debug!("Gave up waiting for a token after {:?}", timeout);
                return false;
            };
            sleep(poll).await;
        }
    }

    /// Same as [`wait_for_token`](Self::wait_for_token), but also returns
    /// `false` as soon as `cancel` fires.
    pub async fn wait_for_token_until_cancelled(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> bool {
        let start = Instant::now();
        loop {
            if self.try_consume(false) {
                return true;
            }
            let Some(poll) = self.next_poll(start, timeout) else {
                return false;
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::debug!("Token wait cancelled");
                    return false;
                }
                _ = sleep(poll) => {}
            }
        }
    }

    /// Next sleep: the refill hint clamped to the poll bounds and the time left.
    fn next_poll(&self, start: Instant, timeout: Duration) -> Option<Duration> {
        let remaining = timeout.checked_sub(start.elapsed())?;
        if remaining.is_zero() {
            return None;
        }
        let hint = self
            .time_until_next_token_ms()
            .clamp(MIN_TOKEN_POLL_INTERVAL_MS, MAX_TOKEN_POLL_INTERVAL_MS);
        Some(Duration::from_millis(hint).min(remaining))
    }

    /// Drops every token, as if the upstream budget were exhausted.
    pub fn drain(&self) {
        let mut state = self.lock();
        self.refill(&mut state);
        state.tokens = 0.0;
    }

    /// Refills to capacity.
    ///
    /// Administrative recovery after a long outage, not part of normal flow control.
    pub fn reset(&self) {
        let now = self.clock.now_ms();
        let mut state = self.lock();
        state.tokens = f64::from(self.capacity);
        state.last_refill_ms = now;
        log::info!("Token bucket reset to capacity {}", self.capacity);
    }
}
