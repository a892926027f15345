//! Wall-clock time source.
//!
//! Admission windows are aligned to wall-clock minutes, so every controller
//! reads time through a `Clock` injected at construction. Production code uses
//! [`SystemClock`]; tests and embedders that drive time themselves use
//! [`ManualClock`].

use std::sync::atomic::{AtomicI64, Ordering};

use crate::config::MINUTE_MS;

/// Source of wall-clock milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// Clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
///
/// Thread-safe, so one instance can be shared with a controller through `Arc`
/// while the test advances it.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Creates a clock reading `start_ms`.
    pub fn new(start_ms: i64) -> Self {
        ManualClock {
            now: AtomicI64::new(start_ms),
        }
    }

    /// Moves the clock forward (or backward, for a negative value).
    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }

    /// Sets the clock to an absolute reading.
    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Start of the wall-clock minute containing `now_ms`.
pub fn minute_start(now_ms: i64) -> i64 {
    now_ms - now_ms.rem_euclid(MINUTE_MS)
}

/// Milliseconds until the next wall-clock minute boundary, in `1..=60_000`.
pub fn ms_until_next_minute(now_ms: i64) -> u64 {
    // rem_euclid is in 0..MINUTE_MS, so the difference is always positive
    (MINUTE_MS - now_ms.rem_euclid(MINUTE_MS)).unsigned_abs()
}

/// `later - earlier` in milliseconds, clamped at zero.
pub fn saturating_elapsed(later_ms: i64, earlier_ms: i64) -> u64 {
    u64::try_from(later_ms.saturating_sub(earlier_ms)).unwrap_or(0)
}
