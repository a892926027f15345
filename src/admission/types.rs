//! Priority classes and admission decisions.

use serde::{Deserialize, Serialize};
use strum_macros::EnumIter as EnumIterMacro;

/// Caller-assigned rank of a request.
///
/// Variants are declared in rank order, so `Critical < High < Normal`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIterMacro,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestPriority {
    /// Interactive user action that must not be starved (e.g. setting a temperature)
    Critical,
    /// User-visible read, such as HomeKit asking for current state
    High,
    /// Background synchronization
    Normal,
}

impl RequestPriority {
    /// Upper-case name, as it appears in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestPriority::Critical => "CRITICAL",
            RequestPriority::High => "HIGH",
            RequestPriority::Normal => "NORMAL",
        }
    }
}

impl std::fmt::Display for RequestPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer to a single admission request.
///
/// `wait_time_ms` is a hint for when a retry may succeed; it is zero when the
/// request is allowed. Being unsigned, it cannot express a negative wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionDecision {
    /// Whether the caller may issue the request now
    pub allowed: bool,
    /// Suggested delay before retrying
    pub wait_time_ms: u64,
    /// Human-readable explanation
    pub reason: String,
}

impl AdmissionDecision {
    /// An admitting decision.
    pub fn allow(reason: impl Into<String>) -> Self {
        AdmissionDecision {
            allowed: true,
            wait_time_ms: 0,
            reason: reason.into(),
        }
    }

    /// A refusing decision with a wait hint.
    pub fn deny(wait_time_ms: u64, reason: impl Into<String>) -> Self {
        AdmissionDecision {
            allowed: false,
            wait_time_ms,
            reason: reason.into(),
        }
    }
}
