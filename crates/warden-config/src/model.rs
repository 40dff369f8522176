// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Warden.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Warden configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WardenConfig {
    /// Access guard timeouts and diagnostics.
    #[serde(default)]
    pub guard: GuardConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Access guard configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    /// Per-attempt wait before the deadlock detector is consulted.
    #[serde(default = "default_soft_timeout_ms")]
    pub soft_timeout_ms: u64,

    /// Total wait budget before a call proceeds without the lock.
    #[serde(default = "default_hard_timeout_ms")]
    pub hard_timeout_ms: u64,

    /// How long a timed-out thread stays exempt from enforcement.
    /// Defaults to `hard_timeout_ms`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_ttl_ms: Option<u64>,

    /// Record the owner's call stack on each guarded call so timeout reports
    /// can include it. Capture still honours `RUST_BACKTRACE`.
    #[serde(default = "default_true")]
    pub capture_owner_stacks: bool,

    /// Consult the wait-for graph after each soft timeout.
    #[serde(default = "default_true")]
    pub deadlock_detection: bool,
}

impl GuardConfig {
    pub fn soft_timeout(&self) -> Duration {
        Duration::from_millis(self.soft_timeout_ms)
    }

    pub fn hard_timeout(&self) -> Duration {
        Duration::from_millis(self.hard_timeout_ms)
    }

    pub fn ignore_ttl(&self) -> Duration {
        Duration::from_millis(self.ignore_ttl_ms.unwrap_or(self.hard_timeout_ms))
    }

    /// Config with the given timeouts and everything else defaulted.
    pub fn with_timeouts(soft: Duration, hard: Duration) -> Self {
        Self {
            soft_timeout_ms: soft.as_millis() as u64,
            hard_timeout_ms: hard.as_millis() as u64,
            ..Self::default()
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            soft_timeout_ms: default_soft_timeout_ms(),
            hard_timeout_ms: default_hard_timeout_ms(),
            ignore_ttl_ms: None,
            capture_owner_stacks: true,
            deadlock_detection: true,
        }
    }
}

fn default_soft_timeout_ms() -> u64 {
    10_000
}

fn default_hard_timeout_ms() -> u64 {
    60_000
}

fn default_true() -> bool {
    true
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
