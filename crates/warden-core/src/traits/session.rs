// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session traits: the operation surface of a stateful, non-thread-safe
//! persistence session and the factory that opens one.
//!
//! Implementations are `Send + Sync` so they can be shared, but nothing in
//! the trait promises that two threads may be inside the same session at
//! once. Callers that share a session across threads wrap it in an access
//! guard, which implements this same trait.

use crate::error::SessionError;
use crate::types::{Record, RecordId, SessionId};

/// Callback invoked once when a session's logical lifetime ends.
pub type EndListener = Box<dyn FnOnce() + Send + 'static>;

/// A stateful persistence session.
pub trait Session: Send + Sync {
    /// Identifier of this session instance.
    fn id(&self) -> SessionId;

    /// Whether the session has not been closed yet.
    fn is_open(&self) -> bool;

    /// Schedules a record for insertion and returns its assigned id.
    fn persist(&self, record: Record) -> Result<RecordId, SessionError>;

    /// Loads a record by id.
    fn find(&self, id: RecordId) -> Result<Option<Record>, SessionError>;

    /// Returns the child collection of `parent`, initializing it on first access.
    fn children(&self, parent: RecordId) -> Result<Vec<(RecordId, Record)>, SessionError>;

    /// Schedules a record for deletion. Returns whether it existed.
    fn remove(&self, id: RecordId) -> Result<bool, SessionError>;

    /// Writes pending changes and returns how many were written.
    fn flush(&self) -> Result<usize, SessionError>;

    /// Ends the session. Registered end listeners run exactly once.
    fn close(&self) -> Result<(), SessionError>;

    /// Registers a callback that runs when the session ends.
    fn add_end_listener(&self, listener: EndListener);
}

/// Opens sessions.
pub trait SessionFactory: Send + Sync {
    type Session: Session;

    fn open_session(&self) -> Result<Self::Session, SessionError>;
}
