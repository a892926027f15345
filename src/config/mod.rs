//! Admission configuration and constants.
//!
//! This module provides:
//! - Default tuning constants
//! - The `rateLimit` configuration block and its validation
//! - Loading that block from a Homebridge config file

mod constants;
mod loading;
mod types;

// Re-export all constants
pub use constants::*;
pub use loading::{load_config, parse_config};
pub use types::{AdmissionConfig, LogFormat, LogLevel, StrategyKind, TokenBucketConfig};
