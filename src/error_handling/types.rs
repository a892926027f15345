//! Error type definitions.
//!
//! Admission itself never fails: a refusal is an `AdmissionDecision`, not an
//! error. The types here cover configuration, startup, and the optional
//! `ThrottledCaller` wrapper.

use log::SetLoggerError;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// The limiter configuration was rejected.
    #[error("Limiter initialization error: {0}")]
    ConfigError(#[from] ConfigError),
}

/// Validation failures for an `AdmissionConfig`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// `maxRequestsPerMinute` was zero.
    #[error("maxRequestsPerMinute must be greater than zero")]
    ZeroRequestBudget,

    /// `safetyMargin` outside `[0, 1)`.
    #[error("safetyMargin must be in [0, 1), got {0}")]
    SafetyMarginOutOfRange(f64),

    /// `historyRetentionMs` was zero.
    #[error("historyRetentionMs must be greater than zero")]
    ZeroRetention,

    /// Token bucket capacity was zero.
    #[error("tokenBucket.capacity must be greater than zero")]
    ZeroCapacity,

    /// Token bucket refill rate was zero, negative, or not finite.
    #[error("tokenBucket.refillRate must be a positive number, got {0}")]
    InvalidRefillRate(f64),

    /// Token bucket refill interval was zero.
    #[error("tokenBucket.refillIntervalMs must be greater than zero")]
    ZeroRefillInterval,

    /// The priority reserve would leave NORMAL traffic no tokens at all.
    #[error("tokenBucket.priorityReserve ({reserve}) must be less than capacity ({capacity})")]
    ReserveExceedsCapacity {
        /// Configured reserve.
        reserve: u32,
        /// Configured capacity.
        capacity: u32,
    },
}

/// Failure of a call made through `ThrottledCaller`.
#[derive(Error, Debug)]
pub enum CallError<E> {
    /// The limiter refused the call and the hinted wait exceeded the caller's budget.
    #[error("Request refused by admission control ({reason}), retry in {wait_time_ms}ms")]
    Denied {
        /// Wait hint from the final refusal.
        wait_time_ms: u64,
        /// Reason from the final refusal.
        reason: String,
    },

    /// The call was admitted and the upstream operation itself failed.
    #[error("Upstream request failed: {0}")]
    Upstream(E),
}

impl<E> CallError<E> {
    /// Returns the wait hint if this was a refusal.
    pub fn wait_time_ms(&self) -> Option<u64> {
        match self {
            CallError::Denied { wait_time_ms, .. } => Some(*wait_time_ms),
            CallError::Upstream(_) => None,
        }
    }
}
