//! Error handling and admission statistics.
//!
//! This module provides:
//! - Error type definitions for configuration, startup, and throttled calls
//! - Per-priority admission counters shared across callers

mod stats;
mod types;

// Re-export public API
pub use stats::{AdmissionCounters, PriorityCounts};
pub use types::{CallError, ConfigError, InitializationError};
