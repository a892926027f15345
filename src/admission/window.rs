//! Fixed wall-clock minute window and backoff deadline.

use crate::clock::{minute_start, ms_until_next_minute, saturating_elapsed};

/// Request count for the current wall-clock minute.
///
/// The window only rolls forward: if the clock steps back into an earlier
/// minute, the current count is kept rather than reset.
#[derive(Debug, Clone)]
pub(crate) struct MinuteWindow {
    start_ms: i64,
    count: u32,
}

impl MinuteWindow {
    pub(crate) fn new(now_ms: i64) -> Self {
        MinuteWindow {
            start_ms: minute_start(now_ms),
            count: 0,
        }
    }

    /// Moves into the minute containing `now_ms` if it is later than the
    /// current one. Returns whether the window rolled.
    pub(crate) fn roll(&mut self, now_ms: i64) -> bool {
        let current = minute_start(now_ms);
        if current > self.start_ms {
            self.start_ms = current;
            self.count = 0;
            true
        } else {
            false
        }
    }

    /// Count as it would read after `roll(now_ms)`, without mutating.
    pub(crate) fn count_at(&self, now_ms: i64) -> u32 {
        if minute_start(now_ms) > self.start_ms {
            0
        } else {
            self.count
        }
    }

    pub(crate) fn increment(&mut self) {
        self.count = self.count.saturating_add(1);
    }

    /// Overwrites the count.
    pub(crate) fn pin(&mut self, count: u32) {
        self.count = count;
    }

    pub(crate) fn reset(&mut self, now_ms: i64) {
        self.start_ms = minute_start(now_ms);
        self.count = 0;
    }

    pub(crate) fn ms_until_reset(now_ms: i64) -> u64 {
        ms_until_next_minute(now_ms)
    }
}

/// Deadline of the adaptive backoff, if one is active.
#[derive(Debug, Clone, Default)]
pub(crate) struct Backoff {
    until_ms: Option<i64>,
}

impl Backoff {
    pub(crate) fn is_active(&self, now_ms: i64) -> bool {
        self.until_ms.is_some_and(|until| now_ms < until)
    }

    pub(crate) fn remaining_ms(&self, now_ms: i64) -> u64 {
        self.until_ms
            .map(|until| saturating_elapsed(until, now_ms))
            .unwrap_or(0)
    }

    /// Starts (or extends) backoff to `now + duration`.
    ///
    /// A shorter backoff never cuts an existing longer one short.
    pub(crate) fn enter(&mut self, now_ms: i64, duration_ms: u64) -> i64 {
        let candidate = now_ms.saturating_add(i64::try_from(duration_ms).unwrap_or(i64::MAX));
        let until = self.until_ms.map_or(candidate, |current| current.max(candidate));
        self.until_ms = Some(until);
        until
    }

    /// Clears an elapsed deadline. Returns whether it was cleared.
    pub(crate) fn clear_if_expired(&mut self, now_ms: i64) -> bool {
        match self.until_ms {
            Some(until) if now_ms >= until => {
                self.until_ms = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.until_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_rolls_on_minute_boundary() {
        let mut window = MinuteWindow::new(120_500);
        window.increment();
        window.increment();

        assert!(!window.roll(179_999));
        assert_eq!(window.count_at(179_999), 2);

        assert_eq!(window.count_at(180_000), 0);
        assert!(window.roll(180_000));
        assert_eq!(window.count_at(180_000), 0);
    }

    #[test]
    fn test_window_does_not_roll_backwards() {
        let mut window = MinuteWindow::new(180_000);
        window.increment();

        assert!(!window.roll(120_000));
        assert_eq!(window.count_at(120_000), 1);
    }

    #[test]
    fn test_window_pin_and_reset() {
        let mut window = MinuteWindow::new(0);
        window.increment();
        window.pin(10);
        assert_eq!(window.count_at(1), 10);

        window.reset(65_000);
        assert_eq!(window.count_at(65_000), 0);
        assert_eq!(MinuteWindow::ms_until_reset(65_000), 55_000);
    }

    #[test]
    fn test_backoff_lifecycle() {
        let mut backoff = Backoff::default();
        assert!(!backoff.is_active(0));
        assert_eq!(backoff.remaining_ms(0), 0);

        assert_eq!(backoff.enter(1_000, 5_000), 6_000);
        assert!(backoff.is_active(5_999));
        assert_eq!(backoff.remaining_ms(2_000), 4_000);
        assert!(!backoff.clear_if_expired(5_999));

        assert!(!backoff.is_active(6_000));
        assert!(backoff.clear_if_expired(6_000));
        assert!(!backoff.clear_if_expired(6_000));
    }

    #[test]
    fn test_backoff_shorter_entry_keeps_longer_deadline() {
        let mut backoff = Backoff::default();
        backoff.enter(0, 30_000);
        assert_eq!(backoff.enter(1_000, 5_000), 30_000);
        assert_eq!(backoff.enter(1_000, 59_000), 60_000);
    }

    #[test]
    fn test_backoff_remaining_after_clock_jump_is_clamped() {
        let mut backoff = Backoff::default();
        backoff.enter(10_000, 1_000);
        assert_eq!(backoff.remaining_ms(20_000), 0);
        // Backward jump lengthens the apparent remaining time but never goes negative
        assert_eq!(backoff.remaining_ms(9_000), 2_000);
    }
}
