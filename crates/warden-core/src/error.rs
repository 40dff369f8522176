// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Warden workspace.

use thiserror::Error;

use crate::types::{RecordId, SessionId};

/// Errors raised by a session's own operations.
///
/// The access guard forwards these to the caller untouched. A session that
/// is reached unsynchronized (after a wait timeout) is more likely to raise
/// [`SessionError::ConcurrentAccess`], which is expected and not suppressed.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Two threads were inside the session at the same time.
    #[error("illegal concurrent access to session {session} ({in_flight} calls in flight)")]
    ConcurrentAccess { session: SessionId, in_flight: usize },

    /// The session was used after it was closed.
    #[error("session is closed")]
    Closed,

    /// The requested record does not exist.
    #[error("record {0} not found")]
    NotFound(RecordId),

    /// Backend failure inside the session.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// The top-level error type used by the binary and the factory hook.
#[derive(Debug, Error)]
pub enum WardenError {
    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// A session operation failed.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
