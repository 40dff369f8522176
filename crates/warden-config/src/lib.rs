// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Warden session access guard.
//!
//! Settings come from layered TOML files and `WARDEN_*` environment
//! variables. Unknown keys are rejected, and every problem found is reported
//! at once as a miette diagnostic, with a "did you mean" hint for misspelled
//! keys.
//!
//! ```no_run
//! let config = warden_config::load_and_validate().expect("config errors");
//! println!("hard timeout: {:?}", config.guard.hard_timeout());
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::{Path, PathBuf};

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{GuardConfig, LoggingConfig, WardenConfig};

/// Loads the layered configuration and validates it.
pub fn load_and_validate() -> Result<WardenConfig, Vec<ConfigError>> {
    checked(loader::load_config(), || {
        let local = std::env::current_dir()
            .map(|dir| dir.join(loader::LOCAL_CONFIG))
            .unwrap_or_else(|_| PathBuf::from(loader::LOCAL_CONFIG));
        let candidates = [
            Some(local),
            loader::user_config_path(),
            Some(PathBuf::from(loader::SYSTEM_CONFIG)),
        ];
        candidates.into_iter().flatten().filter_map(read_source).collect()
    })
}

/// Loads configuration from a TOML string (no files, no env) and validates it.
pub fn load_and_validate_str(toml_content: &str) -> Result<WardenConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Loads one explicit file plus env overrides and validates the result.
pub fn load_and_validate_path(path: &Path) -> Result<WardenConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_path(path), || {
        read_source(path.to_path_buf()).into_iter().collect()
    })
}

/// Validates a loaded config, or turns the extraction error into
/// diagnostics. `sources` is only read on failure, for span lookup.
fn checked(
    loaded: Result<WardenConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<WardenConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => validation::validate_config(&config).map(|()| config),
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

fn read_source(path: PathBuf) -> Option<(String, String)> {
    let content = std::fs::read_to_string(&path).ok()?;
    Some((path.display().to_string(), content))
}
