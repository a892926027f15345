//! Configuration types.
//!
//! This module defines the admission configuration block as it appears in the
//! Homebridge platform config, plus the logging options.

use serde::{Deserialize, Serialize};

use crate::config::constants::*;
use crate::error_handling::ConfigError;

/// Logging level for the application.
///
/// Mirrors the levels Homebridge exposes. `Verbose` is the most detailed and
/// maps onto `log`'s `Trace`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    #[default]
    Info,
    /// All messages except verbose
    Debug,
    /// All messages including verbose
    Verbose,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Verbose => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted:
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    #[default]
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Which admission strategy backs the shared limiter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StrategyKind {
    /// Fixed wall-clock minute budget with adaptive backoff
    #[default]
    Windowed,
    /// Continuously refilling token bucket with a priority reserve
    TokenBucket,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Windowed => f.write_str("windowed"),
            StrategyKind::TokenBucket => f.write_str("token-bucket"),
        }
    }
}

/// Token bucket settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenBucketConfig {
    /// Maximum tokens (burst allowance)
    pub capacity: u32,
    /// Tokens added per refill interval (fractional refill is continuous)
    pub refill_rate: f64,
    /// Length of one refill interval in milliseconds
    pub refill_interval_ms: u64,
    /// Tokens NORMAL traffic must leave untouched
    pub priority_reserve: u32,
}

impl Default for TokenBucketConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUCKET_CAPACITY,
            refill_rate: DEFAULT_BUCKET_REFILL_RATE,
            refill_interval_ms: DEFAULT_BUCKET_REFILL_INTERVAL_MS,
            priority_reserve: DEFAULT_BUCKET_PRIORITY_RESERVE,
        }
    }
}

/// Admission control configuration.
///
/// This is the `rateLimit` block of the platform config. Every field has a
/// default, so an empty JSON object is a valid configuration.
///
/// # Examples
///
/// ```
/// use pod_admission::config::{AdmissionConfig, StrategyKind};
///
/// let config: AdmissionConfig =
///     serde_json::from_str(r#"{ "maxRequestsPerMinute": 5, "safetyMargin": 0.25 }"#).unwrap();
/// assert_eq!(config.effective_limit(), 3);
/// assert_eq!(config.strategy, StrategyKind::Windowed);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdmissionConfig {
    /// Strategy selected for the shared limiter
    pub strategy: StrategyKind,

    /// Nominal request budget per wall-clock minute
    pub max_requests_per_minute: u32,

    /// Fraction of the budget held back (0.0-1.0, default: 0.2 = 20%)
    pub safety_margin: f64,

    /// Let CRITICAL traffic bypass backoff and the effective limit
    pub enable_critical_bypass: bool,

    /// Relaxed admission window for HIGH traffic after construction
    pub startup_grace_period_ms: u64,

    /// Backoff after a rate-limited CRITICAL request
    pub critical_backoff_ms: u64,

    /// Backoff after a rate-limited HIGH request
    pub high_backoff_ms: u64,

    /// Extra requests CRITICAL traffic may make past the nominal budget
    pub critical_ceiling_headroom: u32,

    /// How long request outcomes are retained
    pub history_retention_ms: u64,

    /// Token bucket settings (used when `strategy` is `tokenBucket`)
    pub token_bucket: TokenBucketConfig,

    /// Log level
    pub log_level: LogLevel,

    /// Log format
    pub log_format: LogFormat,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Windowed,
            max_requests_per_minute: DEFAULT_MAX_REQUESTS_PER_MINUTE,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            enable_critical_bypass: true,
            startup_grace_period_ms: DEFAULT_STARTUP_GRACE_PERIOD_MS,
            critical_backoff_ms: DEFAULT_CRITICAL_BACKOFF_MS,
            high_backoff_ms: DEFAULT_HIGH_BACKOFF_MS,
            critical_ceiling_headroom: DEFAULT_CRITICAL_CEILING_HEADROOM,
            history_retention_ms: DEFAULT_HISTORY_RETENTION_MS,
            token_bucket: TokenBucketConfig::default(),
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
        }
    }
}

impl AdmissionConfig {
    /// Budget after the safety margin: `floor(max * (1 - margin))`.
    pub fn effective_limit(&self) -> u32 {
        // Safe cast: the product is bounded by max_requests_per_minute, a u32
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let limit = (f64::from(self.max_requests_per_minute) * (1.0 - self.safety_margin)).floor()
            as u32;
        limit
    }

    /// Checks the configuration for values that would make admission meaningless.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_requests_per_minute == 0 {
            return Err(ConfigError::ZeroRequestBudget);
        }
        if !(0.0..1.0).contains(&self.safety_margin) {
            return Err(ConfigError::SafetyMarginOutOfRange(self.safety_margin));
        }
        if self.history_retention_ms == 0 {
            return Err(ConfigError::ZeroRetention);
        }

        let bucket = &self.token_bucket;
        if bucket.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if !bucket.refill_rate.is_finite() || bucket.refill_rate <= 0.0 {
            return Err(ConfigError::InvalidRefillRate(bucket.refill_rate));
        }
        if bucket.refill_interval_ms == 0 {
            return Err(ConfigError::ZeroRefillInterval);
        }
        if bucket.priority_reserve >= bucket.capacity {
            return Err(ConfigError::ReserveExceedsCapacity {
                reserve: bucket.priority_reserve,
                capacity: bucket.capacity,
            });
        }
        Ok(())
    }
}
