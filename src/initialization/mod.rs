//! Process-level setup.
//!
//! This module provides functions to initialize shared resources:
//! - Logger (plain or JSON, Homebridge log levels)
//! - The admission limiter shared by every caller of one account
//!
//! All initialization functions return proper error types for error handling.

mod limiter;
mod logger;

// Re-export public API
pub use limiter::{init_instrumented_limiter, init_limiter};
pub use logger::{init_logger_from, init_logger_with};
