//! Configuration constants.
//!
//! This module defines the default tuning values for the admission controllers.
//! The numbers were chosen from observed behaviour of the vendor API, which
//! publishes no limits of its own.

// Windowed controller defaults
/// Nominal request budget per wall-clock minute
pub const DEFAULT_MAX_REQUESTS_PER_MINUTE: u32 = 10;
/// Fraction of the nominal budget held back as headroom (0.2 = 20%)
pub const DEFAULT_SAFETY_MARGIN: f64 = 0.2;
/// Relaxed admission window for HIGH priority traffic after startup (5 minutes)
pub const DEFAULT_STARTUP_GRACE_PERIOD_MS: u64 = 5 * 60 * 1000;
/// How far past the nominal budget CRITICAL traffic may go before it is refused
pub const DEFAULT_CRITICAL_CEILING_HEADROOM: u32 = 2;

// Backoff durations after an upstream 429
/// Backoff after a CRITICAL request is rate limited
pub const DEFAULT_CRITICAL_BACKOFF_MS: u64 = 5_000;
/// Backoff after a HIGH request is rate limited
/// NORMAL requests back off until the next minute boundary instead.
pub const DEFAULT_HIGH_BACKOFF_MS: u64 = 30_000;

// Request history
/// Retention horizon for recorded request outcomes (10 minutes)
pub const DEFAULT_HISTORY_RETENTION_MS: u64 = 10 * 60 * 1000;
/// Hard cap on retained history entries, independent of the time horizon
pub const DEFAULT_HISTORY_MAX_ENTRIES: usize = 1_000;
/// Trailing window used for diagnostics and the HIGH-priority bypass gate
pub const RECENT_WINDOW_MS: u64 = 60_000;

// Token bucket defaults (10 requests per minute, refilled continuously)
/// Default bucket capacity
pub const DEFAULT_BUCKET_CAPACITY: u32 = 10;
/// Default tokens added per refill interval
pub const DEFAULT_BUCKET_REFILL_RATE: f64 = 1.0;
/// Default refill interval (one token every 6 seconds)
pub const DEFAULT_BUCKET_REFILL_INTERVAL_MS: u64 = 6_000;
/// Tokens kept back for CRITICAL/HIGH traffic
pub const DEFAULT_BUCKET_PRIORITY_RESERVE: u32 = 2;
/// Upper bound on a single poll interval while waiting for a token
pub const MAX_TOKEN_POLL_INTERVAL_MS: u64 = 1_000;
/// Floor on a poll interval so a zero hint (full bucket) cannot spin
pub const MIN_TOKEN_POLL_INTERVAL_MS: u64 = 1;

// Diagnostics thresholds
/// Share of the effective limit at which "approaching limit" is reported
pub const APPROACHING_LIMIT_RATIO: f64 = 0.8;
/// Mean response time above which the upstream is reported as slow
pub const SLOW_RESPONSE_THRESHOLD_MS: f64 = 5_000.0;

/// Length of one admission window
pub const MINUTE_MS: i64 = 60_000;
