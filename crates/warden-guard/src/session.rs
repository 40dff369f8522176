// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A guarded session exposes the same [`Session`] surface as the session it
//! wraps. Each method runs the guard protocol and then delegates.

use warden_core::{EndListener, Record, RecordId, Session, SessionError, SessionId};

use crate::guard::AccessGuard;

impl<S: Session> Session for AccessGuard<S> {
    fn id(&self) -> SessionId {
        self.call(|s| s.id())
    }

    fn is_open(&self) -> bool {
        self.call(|s| s.is_open())
    }

    fn persist(&self, record: Record) -> Result<RecordId, SessionError> {
        self.call(|s| s.persist(record))
    }

    fn find(&self, id: RecordId) -> Result<Option<Record>, SessionError> {
        self.call(|s| s.find(id))
    }

    fn children(&self, parent: RecordId) -> Result<Vec<(RecordId, Record)>, SessionError> {
        self.call(|s| s.children(parent))
    }

    fn remove(&self, id: RecordId) -> Result<bool, SessionError> {
        self.call(|s| s.remove(id))
    }

    fn flush(&self) -> Result<usize, SessionError> {
        self.call(|s| s.flush())
    }

    fn close(&self) -> Result<(), SessionError> {
        self.call(|s| s.close())
    }

    fn add_end_listener(&self, listener: EndListener) {
        self.call(|s| s.add_end_listener(listener))
    }
}
