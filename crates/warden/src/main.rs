// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Warden - cross-thread access guard for non-thread-safe sessions.
//!
//! This binary runs a small demonstration of the guard and prints the
//! effective configuration.

mod demo;
mod memory;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use warden_config::WardenConfig;
use warden_core::WardenError;

/// Warden - cross-thread access guard for non-thread-safe sessions.
#[derive(Parser, Debug)]
#[command(name = "warden", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a lazy child collection from a second thread while the owner
    /// still uses the session.
    Demo {
        /// Run without the guard to show the concurrent access failure.
        #[arg(long)]
        unguarded: bool,
        /// How long the owning thread keeps working before ending its session.
        #[arg(long, default_value_t = 500)]
        hold_ms: u64,
    },
    /// Print the effective configuration as TOML.
    Config,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("warden: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), WardenError> {
    let loaded = match &cli.config {
        Some(path) => warden_config::load_and_validate_path(path),
        None => warden_config::load_and_validate(),
    };
    let config = loaded.map_err(|errors| {
        warden_config::render_errors(&errors);
        WardenError::Config(format!("{} problem(s) in configuration", errors.len()))
    })?;

    init_tracing(&config.logging.level);

    match cli.command {
        Some(Commands::Demo { unguarded, hold_ms }) => {
            let mode = if unguarded {
                demo::Mode::Unguarded
            } else {
                demo::Mode::Guarded
            };
            demo::run(&config.guard, mode, Duration::from_millis(hold_ms))?.print();
        }
        Some(Commands::Config) => print!("{}", render_config(&config)?),
        None => {
            println!("warden: use --help for available commands");
        }
    }
    Ok(())
}

fn render_config(config: &WardenConfig) -> Result<String, WardenError> {
    toml::to_string_pretty(config)
        .map_err(|e| WardenError::Internal(format!("failed to render config: {e}")))
}

/// Initialize the tracing subscriber with an env filter.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warden={log_level},warden_guard={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .init();
}
