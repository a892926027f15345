//! Admission outcome counters.
//!
//! This module provides thread-safe counters for allowed, denied, and
//! rate-limited requests, broken down by priority.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use strum::IntoEnumIterator;

use crate::admission::RequestPriority;

/// Thread-safe admission counters.
///
/// Tracks decisions and rate-limit outcomes per priority using atomic counters,
/// allowing concurrent access from every caller sharing a limiter. All
/// priorities are initialized to zero on creation.
///
/// # Thread Safety
///
/// This struct is thread-safe and can be shared across multiple tasks using `Arc`.
pub struct AdmissionCounters {
    allowed: HashMap<RequestPriority, AtomicUsize>,
    denied: HashMap<RequestPriority, AtomicUsize>,
    rate_limited: HashMap<RequestPriority, AtomicUsize>,
}

/// Point-in-time copy of `AdmissionCounters` for one priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PriorityCounts {
    /// Decisions that admitted the request
    pub allowed: usize,
    /// Decisions that refused the request
    pub denied: usize,
    /// Outcomes reported as rate limited by the upstream
    pub rate_limited: usize,
}

fn zeroed() -> HashMap<RequestPriority, AtomicUsize> {
    RequestPriority::iter()
        .map(|priority| (priority, AtomicUsize::new(0)))
        .collect()
}

fn increment(map: &HashMap<RequestPriority, AtomicUsize>, priority: RequestPriority) {
    if let Some(counter) = map.get(&priority) {
        counter.fetch_add(1, Ordering::Relaxed);
    } else {
        log::error!(
            "Attempted to increment counter for {:?} which is not in the map. \
             This indicates a bug in AdmissionCounters initialization.",
            priority
        );
    }
}

fn load(map: &HashMap<RequestPriority, AtomicUsize>, priority: RequestPriority) -> usize {
    map.get(&priority)
        .map(|c| c.load(Ordering::SeqCst))
        .unwrap_or(0)
}

impl AdmissionCounters {
    /// Creates zeroed counters for every priority.
    pub fn new() -> Self {
        AdmissionCounters {
            allowed: zeroed(),
            denied: zeroed(),
            rate_limited: zeroed(),
        }
    }

    /// Counts one admission decision.
    pub fn record_decision(&self, priority: RequestPriority, allowed: bool) {
        if allowed {
            increment(&self.allowed, priority);
        } else {
            increment(&self.denied, priority);
        }
    }

    /// Counts one upstream rate-limit response.
    pub fn record_rate_limited(&self, priority: RequestPriority) {
        increment(&self.rate_limited, priority);
    }

    /// Counts for a single priority.
    pub fn counts(&self, priority: RequestPriority) -> PriorityCounts {
        PriorityCounts {
            allowed: load(&self.allowed, priority),
            denied: load(&self.denied, priority),
            rate_limited: load(&self.rate_limited, priority),
        }
    }

    /// Counts for every priority, in rank order.
    pub fn snapshot(&self) -> Vec<(RequestPriority, PriorityCounts)> {
        RequestPriority::iter()
            .map(|priority| (priority, self.counts(priority)))
            .collect()
    }

    /// Admitted requests across all priorities.
    pub fn total_allowed(&self) -> usize {
        RequestPriority::iter().map(|p| load(&self.allowed, p)).sum()
    }

    /// Refused requests across all priorities.
    pub fn total_denied(&self) -> usize {
        RequestPriority::iter().map(|p| load(&self.denied, p)).sum()
    }

    /// Rate-limited outcomes across all priorities.
    pub fn total_rate_limited(&self) -> usize {
        RequestPriority::iter()
            .map(|p| load(&self.rate_limited, p))
            .sum()
    }

    /// Zeroes every counter.
    pub fn clear(&self) {
        for map in [&self.allowed, &self.denied, &self.rate_limited] {
            for counter in map.values() {
                counter.store(0, Ordering::SeqCst);
            }
        }
    }
}

impl Default for AdmissionCounters {
    fn default() -> Self {
        Self::new()
    }
}
