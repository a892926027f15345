//! pod_admission library: adaptive admission control for a rate-limited cloud API
//!
//! Every device and background poller that talks to the same upstream account
//! shares one limiter. Before each call it asks for admission at a priority;
//! after the call it reports how it went. The limiter keeps a safety margin
//! below the upstream's published per-minute budget, lets user-initiated
//! traffic through when it matters, and backs off when the upstream answers
//! with a rate-limit error.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use pod_admission::{init_limiter, AdmissionConfig, AdmissionControl, RequestPriority, SystemClock};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = init_limiter(&AdmissionConfig::default(), Arc::new(SystemClock))?;
//!
//! let decision = limiter.should_allow_request(RequestPriority::Normal);
//! if decision.allowed {
//!     // ... call the upstream, then report the outcome
//!     limiter.record_request(RequestPriority::Normal, true, 180, false);
//! } else {
//!     println!("Deferred for {}ms: {}", decision.wait_time_ms, decision.reason);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! Admission decisions are synchronous. The waiting helpers
//! ([`TokenBucket::wait_for_token`], [`ThrottledCaller`]) require a Tokio runtime.

#![warn(missing_docs)]

pub mod admission;
pub mod clock;
pub mod config;
pub mod error_handling;
pub mod initialization;

// Re-export public API
pub use admission::{
    recommendations_for, AdmissionControl, AdmissionDecision, AdmissionStats,
    InstrumentedLimiter, RateLimitSignal, RequestPriority, SharedLimiter, ThrottledCaller,
    TokenBucket, TokenBucketController, WindowedController,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    load_config, parse_config, AdmissionConfig, LogFormat, LogLevel, StrategyKind,
    TokenBucketConfig,
};
pub use error_handling::{CallError, ConfigError, InitializationError};
pub use initialization::{
    init_instrumented_limiter, init_limiter, init_logger_from, init_logger_with,
};
