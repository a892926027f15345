//! Windowed admission controller.
//!
//! Enforces a per-wall-clock-minute budget with a safety margin, lets
//! priority traffic bypass parts of it, and backs off adaptively whenever the
//! upstream reports a rate limit.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::diagnostics::AdmissionStats;
use super::history::{RequestHistory, RequestMetric};
use super::types::{AdmissionDecision, RequestPriority};
use super::window::{Backoff, MinuteWindow};
use super::AdmissionControl;
use crate::clock::{saturating_elapsed, Clock};
use crate::config::{AdmissionConfig, StrategyKind, DEFAULT_HISTORY_MAX_ENTRIES, RECENT_WINDOW_MS};

struct ControllerState {
    window: MinuteWindow,
    backoff: Backoff,
    history: RequestHistory,
    /// Latest clock reading seen, for backward-jump detection
    last_seen_ms: i64,
    /// Latched once the grace period is observed to be over
    grace_expired: bool,
}

/// Per-minute budget controller with adaptive backoff.
///
/// One instance guards one upstream account. Share it (through
/// `SharedLimiter`) with every caller that spends the same budget.
///
/// # State machine
///
/// `NORMAL -> BACKOFF` happens only in `record_request(.., rate_limited = true)`.
/// `BACKOFF -> NORMAL` is evaluated lazily on the next admission check once the
/// deadline passes. Independently, the startup grace period expires once,
/// `startup_grace_period_ms` after construction, and never re-enters.
pub struct WindowedController {
    config: AdmissionConfig,
    clock: Arc<dyn Clock>,
    startup_ms: i64,
    state: Mutex<ControllerState>,
}

impl WindowedController {
    /// Creates a controller; the startup grace period starts now.
    pub fn new(config: AdmissionConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_ms();
        let history = RequestHistory::new(config.history_retention_ms, DEFAULT_HISTORY_MAX_ENTRIES);
        log::info!(
            "Windowed admission controller: {} requests/min, effective limit {}, grace period {}s",
            config.max_requests_per_minute,
            config.effective_limit(),
            config.startup_grace_period_ms / 1000
        );
        WindowedController {
            config,
            clock,
            startup_ms: now,
            state: Mutex::new(ControllerState {
                window: MinuteWindow::new(now),
                backoff: Backoff::default(),
                history,
                last_seen_ms: now,
                grace_expired: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Grace is measured against the latest reading seen, so a backward
    /// clock jump cannot bring it back.
    fn in_grace_period(&self, state: &ControllerState, now_ms: i64) -> bool {
        !state.grace_expired && self.grace_remaining_ms(state, now_ms) > 0
    }

    fn grace_remaining_ms(&self, state: &ControllerState, now_ms: i64) -> u64 {
        if state.grace_expired {
            return 0;
        }
        let elapsed = saturating_elapsed(now_ms.max(state.last_seen_ms), self.startup_ms);
        self.config.startup_grace_period_ms.saturating_sub(elapsed)
    }

    /// Backward-jump detection, window roll, and lazy backoff exit.
    fn advance(&self, state: &mut ControllerState, now_ms: i64) {
        if now_ms < state.last_seen_ms {
            // Wait hints are clamped at zero; state is left as-is
            log::warn!(
                "Clock moved backwards by {}ms; keeping current window and backoff",
                state.last_seen_ms - now_ms
            );
        } else {
            state.last_seen_ms = now_ms;
        }

        if state.window.roll(now_ms) {
            log::debug!("Admission window rolled into a new minute");
        }
        if state.backoff.clear_if_expired(now_ms) {
            log::info!("Adaptive backoff expired, resuming normal admission");
        }
        if !state.grace_expired && !self.in_grace_period(state, now_ms) {
            state.grace_expired = true;
            log::info!("Startup grace period ended");
        }
    }

    fn backoff_duration_ms(&self, priority: RequestPriority, now_ms: i64) -> u64 {
        match priority {
            RequestPriority::Critical => self.config.critical_backoff_ms,
            RequestPriority::High => self.config.high_backoff_ms,
            RequestPriority::Normal => MinuteWindow::ms_until_reset(now_ms),
        }
    }

    fn critical_bypass(&self, priority: RequestPriority) -> bool {
        priority == RequestPriority::Critical && self.config.enable_critical_bypass
    }
}

impl AdmissionControl for WindowedController {
    fn should_allow_request(&self, priority: RequestPriority) -> AdmissionDecision {
        let now = self.clock.now_ms();
        let mut state = self.lock();
        self.advance(&mut state, now);

        let critical_bypass = self.critical_bypass(priority);
        // A HIGH request that was just rate limited must not bypass its own backoff
        let high_relaxed = priority == RequestPriority::High
            && self.in_grace_period(&state, now)
            && !state
                .history
                .rate_limited_since(RequestPriority::High, now, RECENT_WINDOW_MS);

        if state.backoff.is_active(now) {
            if critical_bypass {
                log::debug!("{} request bypassing backoff", priority);
            } else if high_relaxed {
                log::debug!("{} request bypassing backoff during startup grace", priority);
            } else {
                let wait = state.backoff.remaining_ms(now);
                log::debug!("Denied {} request: in backoff for {}ms", priority, wait);
                return AdmissionDecision::deny(
                    wait,
                    format!("In adaptive backoff after rate limit ({}ms remaining)", wait),
                );
            }
        }

        let max = self.config.max_requests_per_minute;
        let count = state.window.count_at(now);
        let until_reset = MinuteWindow::ms_until_reset(now);

        if critical_bypass {
            let ceiling = max.saturating_add(self.config.critical_ceiling_headroom);
            if count >= ceiling {
                log::warn!(
                    "Denied {} request: hard ceiling {} reached this minute",
                    priority,
                    ceiling
                );
                return AdmissionDecision::deny(
                    until_reset,
                    format!("Critical request ceiling reached ({}/{})", count, ceiling),
                );
            }
            return AdmissionDecision::allow(format!(
                "Critical bypass ({}/{} this minute)",
                count, max
            ));
        }

        let mut effective_limit = self.config.effective_limit();
        if high_relaxed {
            effective_limit = effective_limit.max(max.saturating_sub(1));
        }

        if count >= effective_limit {
            log::debug!(
                "Denied {} request: {}/{} used, window resets in {}ms",
                priority,
                count,
                effective_limit,
                until_reset
            );
            return AdmissionDecision::deny(
                until_reset,
                format!("Minute budget exhausted ({}/{})", count, effective_limit),
            );
        }

        AdmissionDecision::allow(format!(
            "Within budget ({}/{})",
            count, effective_limit
        ))
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
        self.advance(&mut state, now);

        state.history.record(RequestMetric {
            timestamp_ms: now,
            priority,
            success,
            response_time_ms,
            rate_limited,
        });

        // Bypassed traffic is not charged against the shared budget
        if !self.critical_bypass(priority) {
            state.window.increment();
        }

        if rate_limited {
            let duration = self.backoff_duration_ms(priority, now);
            let until = state.backoff.enter(now, duration);
            // The upstream counter is assumed to be ahead of ours: a 429 means
            // this window's budget is spent, whatever the local count says.
            // Deliberately discards the locally observed count.
            state.window.pin(self.config.max_requests_per_minute);
            log::warn!(
                "{} request rate limited; backing off for {}ms",
                priority,
                saturating_elapsed(until, now)
            );
        }
    }

    fn stats(&self) -> AdmissionStats {
        let now = self.clock.now_ms();
        let state = self.lock();

        // Backoff reads as inactive once its deadline has passed, even before
        // the next admission check clears it
        let in_backoff = state.backoff.is_active(now);
        AdmissionStats {
            strategy: StrategyKind::Windowed,
            requests_this_minute: state.window.count_at(now),
            max_requests_per_minute: self.config.max_requests_per_minute,
            effective_limit: self.config.effective_limit(),
            ms_until_window_reset: MinuteWindow::ms_until_reset(now),
            in_backoff,
            backoff_remaining_ms: if in_backoff {
                state.backoff.remaining_ms(now)
            } else {
                0
            },
            in_grace_period: self.in_grace_period(&state, now),
            grace_remaining_ms: self.grace_remaining_ms(&state, now),
            recent_requests: state.history.recent(now, RECENT_WINDOW_MS).count(),
            recent_rate_limit_errors: state.history.recent_rate_limited(now, RECENT_WINDOW_MS),
            average_response_time_ms: state
                .history
                .average_response_time_ms(now, RECENT_WINDOW_MS),
            history_len: state.history.len(),
            available_tokens: None,
            token_capacity: None,
            priority_reserve: None,
        }
    }

    fn reset(&self) {
        let now = self.clock.now_ms();
        let mut state = self.lock();
        state.window.reset(now);
        state.backoff.clear();
        state.history.clear();
        state.last_seen_ms = state.last_seen_ms.max(now);
        log::info!("Windowed admission controller reset");
    }
}
