//! Limiter initialization.
//!
//! Builds the configured admission strategy behind the shared interface, so
//! callers never need to know which one is in use.

use std::sync::Arc;

use crate::admission::{
    InstrumentedLimiter, SharedLimiter, TokenBucketController, WindowedController,
};
use crate::clock::Clock;
use crate::config::{AdmissionConfig, StrategyKind};
use crate::error_handling::ConfigError;

/// Initializes the admission limiter selected by `config.strategy`.
///
/// The configuration is validated first; nothing is constructed from an
/// invalid one. The returned handle is cheap to clone and is meant to be
/// shared by every device and poller that spends the same account budget.
///
/// # Errors
///
/// Returns the first [`ConfigError`] found by [`AdmissionConfig::validate`].
pub fn init_limiter(
    config: &AdmissionConfig,
    clock: Arc<dyn Clock>,
) -> Result<SharedLimiter, ConfigError> {
    config.validate()?;

    let limiter: SharedLimiter = match config.strategy {
        StrategyKind::Windowed => Arc::new(WindowedController::new(config.clone(), clock)),
        StrategyKind::TokenBucket => Arc::new(TokenBucketController::new(config, clock)),
    };
    log::debug!("Admission strategy: {}", config.strategy);
    Ok(limiter)
}

/// Like [`init_limiter`], wrapped in an [`InstrumentedLimiter`].
///
/// The concrete wrapper is returned alongside the shared handle so its
/// per-priority counters stay reachable.
///
/// # Errors
///
/// See [`init_limiter`].
pub fn init_instrumented_limiter(
    config: &AdmissionConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<InstrumentedLimiter<SharedLimiter>>, ConfigError> {
    let inner = init_limiter(config, clock)?;
    Ok(Arc::new(InstrumentedLimiter::new(inner)))
}
