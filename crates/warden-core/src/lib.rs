// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Warden session access guard.
//!
//! This crate provides the capability traits that describe a guarded
//! session, the thread identity used to track ownership, the error types
//! returned by session operations, and the incident taxonomy the guard
//! reports when it has to degrade enforcement.

pub mod error;
pub mod incident;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{SessionError, WardenError};
pub use incident::{AccessIncident, Severity};
pub use types::{Record, RecordId, SessionId, ThreadIdentity};

pub use traits::{EndListener, Session, SessionFactory};
