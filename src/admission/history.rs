//! Bounded log of request outcomes.

use std::collections::VecDeque;

use serde::Serialize;

use super::types::RequestPriority;
use crate::clock::saturating_elapsed;

/// Outcome of one upstream request, as reported by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestMetric {
    /// When the outcome was recorded
    pub timestamp_ms: i64,
    /// Priority the request was issued at
    pub priority: RequestPriority,
    /// Whether the upstream call succeeded
    pub success: bool,
    /// Upstream latency
    pub response_time_ms: u64,
    /// The upstream answered 429 (or equivalent)
    pub rate_limited: bool,
}

/// Time-ordered request outcomes within a retention horizon.
///
/// Entries older than `retention_ms` are purged on every write. `max_entries`
/// bounds memory if a caller records far more than the controller admits.
#[derive(Debug, Clone)]
pub struct RequestHistory {
    entries: VecDeque<RequestMetric>,
    retention_ms: u64,
    max_entries: usize,
}

impl RequestHistory {
    /// Creates an empty history bounded by age and by entry count.
    pub fn new(retention_ms: u64, max_entries: usize) -> Self {
        RequestHistory {
            entries: VecDeque::with_capacity(max_entries.min(128)),
            retention_ms,
            max_entries,
        }
    }

    /// Appends an outcome, dropping anything past the retention horizon.
    pub fn record(&mut self, metric: RequestMetric) {
        self.purge(metric.timestamp_ms);

        self.entries.push_back(metric);

        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    fn purge(&mut self, now_ms: i64) {
        while let Some(front) = self.entries.front() {
            if saturating_elapsed(now_ms, front.timestamp_ms) > self.retention_ms {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Entries recorded within `window_ms` before `now_ms`.
    ///
    /// Entries stamped after `now_ms` (the clock moved backwards since) count
    /// as recent.
    pub fn recent(&self, now_ms: i64, window_ms: u64) -> impl Iterator<Item = &RequestMetric> {
        self.entries
            .iter()
            .filter(move |m| saturating_elapsed(now_ms, m.timestamp_ms) < window_ms)
    }

    /// Number of rate-limited outcomes within the window.
    pub fn recent_rate_limited(&self, now_ms: i64, window_ms: u64) -> usize {
        self.recent(now_ms, window_ms)
            .filter(|m| m.rate_limited)
            .count()
    }

    /// Whether a request of `priority` was rate limited within the window.
    pub fn rate_limited_since(
        &self,
        priority: RequestPriority,
        now_ms: i64,
        window_ms: u64,
    ) -> bool {
        self.recent(now_ms, window_ms)
            .any(|m| m.rate_limited && m.priority == priority)
    }

    /// Mean response time within the window, or 0.0 if there were no requests.
    pub fn average_response_time_ms(&self, now_ms: i64, window_ms: u64) -> f64 {
        let (count, total) = self
            .recent(now_ms, window_ms)
            .fold((0usize, 0u64), |(count, total), m| {
                (count + 1, total.saturating_add(m.response_time_ms))
            });
        if count == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = total as f64 / count as f64;
        mean
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
