// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::WardenConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns all collected validation errors (does not fail fast).
pub fn validate_config(config: &WardenConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let guard = &config.guard;

    if guard.soft_timeout_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "guard.soft_timeout_ms must be greater than zero".to_string(),
        });
    }

    if guard.hard_timeout_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "guard.hard_timeout_ms must be greater than zero".to_string(),
        });
    }

    if guard.soft_timeout_ms > guard.hard_timeout_ms {
        errors.push(ConfigError::Validation {
            message: format!(
                "guard.soft_timeout_ms ({}) must not exceed guard.hard_timeout_ms ({})",
                guard.soft_timeout_ms, guard.hard_timeout_ms
            ),
        });
    }

    if guard.ignore_ttl_ms == Some(0) {
        errors.push(ConfigError::Validation {
            message: "guard.ignore_ttl_ms must be greater than zero when set".to_string(),
        });
    }

    let level = config.logging.level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "logging.level `{}` is not one of {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
