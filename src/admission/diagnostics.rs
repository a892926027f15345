//! Operator-facing snapshot and advice.
//!
//! Nothing here feeds back into admission; it only describes it.

use serde::Serialize;

use crate::config::{StrategyKind, APPROACHING_LIMIT_RATIO, SLOW_RESPONSE_THRESHOLD_MS};

/// Snapshot of a limiter's counters and state.
///
/// "Recent" figures cover the trailing 60 seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdmissionStats {
    /// Strategy that produced this snapshot
    pub strategy: StrategyKind,
    /// Requests charged against the current wall-clock minute
    pub requests_this_minute: u32,
    /// Nominal per-minute budget
    pub max_requests_per_minute: u32,
    /// Budget after the safety margin
    pub effective_limit: u32,
    /// Time until the minute window rolls
    pub ms_until_window_reset: u64,
    /// Adaptive backoff active
    pub in_backoff: bool,
    /// Time left in backoff (0 when not backing off)
    pub backoff_remaining_ms: u64,
    /// Startup grace period still running
    pub in_grace_period: bool,
    /// Time left in the grace period
    pub grace_remaining_ms: u64,
    /// Outcomes recorded in the trailing minute
    pub recent_requests: usize,
    /// Rate-limited outcomes in the trailing minute
    pub recent_rate_limit_errors: usize,
    /// Mean response time in the trailing minute (0.0 with no requests)
    pub average_response_time_ms: f64,
    /// Entries currently retained in the request history
    pub history_len: usize,
    /// Refilled token count (token-bucket strategy only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_tokens: Option<f64>,
    /// Bucket capacity (token-bucket strategy only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_capacity: Option<u32>,
    /// Tokens held back for priority traffic (token-bucket strategy only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_reserve: Option<u32>,
}

/// Advisory strings derived from a stats snapshot.
///
/// Always returns at least one entry.
pub fn recommendations_for(stats: &AdmissionStats) -> Vec<String> {
    let mut advice = Vec::new();

    if stats.in_backoff {
        advice.push(format!(
            "In backoff for another {}s after a rate-limit response; background polling is paused",
            stats.backoff_remaining_ms.div_ceil(1000)
        ));
    }

    if stats.recent_rate_limit_errors > 0 {
        advice.push(format!(
            "Recent rate-limit errors detected ({} in the last minute); consider lowering maxRequestsPerMinute or raising safetyMargin",
            stats.recent_rate_limit_errors
        ));
    }

    if stats.effective_limit > 0 {
        #[allow(clippy::cast_precision_loss)]
        let usage = f64::from(stats.requests_this_minute) / f64::from(stats.effective_limit);
        if usage >= APPROACHING_LIMIT_RATIO {
            advice.push(format!(
                "Approaching limit: {}/{} requests used this minute",
                stats.requests_this_minute, stats.effective_limit
            ));
        }
    }

    if stats.average_response_time_ms > SLOW_RESPONSE_THRESHOLD_MS {
        advice.push(format!(
            "Upstream is responding slowly (mean {:.0}ms); consider a longer polling interval",
            stats.average_response_time_ms
        ));
    }

    if let (Some(tokens), Some(reserve)) = (stats.available_tokens, stats.priority_reserve) {
        if tokens < f64::from(reserve) + 1.0 {
            advice.push(format!(
                "Token bucket is down to its priority reserve ({:.1} tokens); background requests are deferred",
                tokens
            ));
        }
    }

    if advice.is_empty() {
        advice.push("Rate limiting is healthy".to_string());
    }

    if stats.in_grace_period {
        advice.push(format!(
            "Startup grace period active for another {}s; HIGH priority requests may use the safety margin",
            stats.grace_remaining_ms.div_ceil(1000)
        ));
    }

    advice
}
