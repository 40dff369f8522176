// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock session for deterministic testing.
//!
//! `MockSession` implements `Session` over an in-memory record store. Every
//! data operation enters an in-flight section; a second thread entering
//! while another is inside gets [`SessionError::ConcurrentAccess`], the way
//! a real session corrupts or rejects interleaved use.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

use warden_core::{
    EndListener, Record, RecordId, Session, SessionError, SessionFactory, SessionId,
    ThreadIdentity,
};

/// One recorded session operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCall {
    pub op: &'static str,
    pub thread: ThreadIdentity,
}

struct Inner {
    id: SessionId,
    op_delay: Duration,
    records: Mutex<BTreeMap<RecordId, Record>>,
    // Parent -> child ids, filled on first access like a lazy collection.
    loaded_children: Mutex<HashMap<RecordId, Vec<RecordId>>>,
    next_id: AtomicU64,
    dirty: AtomicUsize,
    lazy_loads: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    concurrent_errors: AtomicUsize,
    closed: AtomicBool,
    calls: Mutex<Vec<SessionCall>>,
    listeners: Mutex<Vec<EndListener>>,
}

/// A mock session for testing.
///
/// Clones share state, so a test can keep its own handle while the session
/// itself is moved into a guard.
#[derive(Clone)]
pub struct MockSession {
    inner: Arc<Inner>,
}

struct InFlight<'a>(&'a Inner);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockSession {
    /// Create a session whose operations complete immediately.
    pub fn new() -> Self {
        Self::with_op_delay(Duration::ZERO)
    }

    /// Create a session whose operations each take `op_delay`, which widens
    /// the window in which interleaved use is caught.
    pub fn with_op_delay(op_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: SessionId::generate(),
                op_delay,
                records: Mutex::new(BTreeMap::new()),
                loaded_children: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                dirty: AtomicUsize::new(0),
                lazy_loads: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                concurrent_errors: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
                calls: Mutex::new(Vec::new()),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Highest number of calls that were ever inside the session at once.
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    /// Number of calls rejected because another call was in flight.
    pub fn concurrent_errors(&self) -> usize {
        self.inner.concurrent_errors.load(Ordering::SeqCst)
    }

    /// Number of child collections initialized lazily.
    pub fn lazy_loads(&self) -> usize {
        self.inner.lazy_loads.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<SessionCall> {
        self.inner.calls.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn enter(&self, op: &'static str) -> Result<InFlight<'_>, SessionError> {
        let inner = &*self.inner;
        let now = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let guard = InFlight(inner);
        inner.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let thread = ThreadIdentity::current();
        trace!(session = %inner.id, op, thread = %thread, in_flight = now, "mock session call");
        inner.calls.lock().push(SessionCall { op, thread });

        if now > 1 {
            inner.concurrent_errors.fetch_add(1, Ordering::SeqCst);
            return Err(SessionError::ConcurrentAccess {
                session: inner.id.clone(),
                in_flight: now,
            });
        }
        if inner.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        if !inner.op_delay.is_zero() {
            thread::sleep(inner.op_delay);
        }
        Ok(guard)
    }
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSession")
            .field("id", &self.inner.id)
            .field("closed", &self.is_closed())
            .field("max_in_flight", &self.max_in_flight())
            .finish_non_exhaustive()
    }
}

impl Session for MockSession {
    fn id(&self) -> SessionId {
        self.inner.id.clone()
    }

    fn is_open(&self) -> bool {
        !self.is_closed()
    }

    fn persist(&self, record: Record) -> Result<RecordId, SessionError> {
        let _in = self.enter("persist")?;
        let id = RecordId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        if let Some(parent) = record.parent
            && let Some(children) = self.inner.loaded_children.lock().get_mut(&parent)
        {
            children.push(id);
        }
        self.inner.records.lock().insert(id, record);
        self.inner.dirty.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    fn find(&self, id: RecordId) -> Result<Option<Record>, SessionError> {
        let _in = self.enter("find")?;
        Ok(self.inner.records.lock().get(&id).cloned())
    }

    fn children(&self, parent: RecordId) -> Result<Vec<(RecordId, Record)>, SessionError> {
        let _in = self.enter("children")?;
        let records = self.inner.records.lock();
        if !records.contains_key(&parent) {
            return Err(SessionError::NotFound(parent));
        }

        let mut loaded = self.inner.loaded_children.lock();
        let ids = loaded.entry(parent).or_insert_with(|| {
            self.inner.lazy_loads.fetch_add(1, Ordering::SeqCst);
            records
                .iter()
                .filter(|(_, r)| r.parent == Some(parent))
                .map(|(id, _)| *id)
                .collect()
        });
        Ok(ids
            .iter()
            .filter_map(|id| records.get(id).map(|r| (*id, r.clone())))
            .collect())
    }

    fn remove(&self, id: RecordId) -> Result<bool, SessionError> {
        let _in = self.enter("remove")?;
        let removed = self.inner.records.lock().remove(&id).is_some();
        if removed {
            for children in self.inner.loaded_children.lock().values_mut() {
                children.retain(|c| *c != id);
            }
            self.inner.dirty.fetch_add(1, Ordering::SeqCst);
        }
        Ok(removed)
    }

    fn flush(&self) -> Result<usize, SessionError> {
        let _in = self.enter("flush")?;
        Ok(self.inner.dirty.swap(0, Ordering::SeqCst))
    }

    fn close(&self) -> Result<(), SessionError> {
        {
            let _in = self.enter("close")?;
            self.inner.closed.store(true, Ordering::SeqCst);
        }
        // Listeners run outside the in-flight section: a waiter released by
        // them may enter immediately.
        let listeners = std::mem::take(&mut *self.inner.listeners.lock());
        for listener in listeners {
            listener();
        }
        Ok(())
    }

    fn add_end_listener(&self, listener: EndListener) {
        self.inner.listeners.lock().push(listener);
    }
}

/// A factory that opens [`MockSession`]s and keeps a handle to each.
#[derive(Debug, Default)]
pub struct MockSessionFactory {
    op_delay: Duration,
    opened: Mutex<Vec<MockSession>>,
}

impl MockSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_op_delay(op_delay: Duration) -> Self {
        Self {
            op_delay,
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Every session opened so far, in order.
    pub fn opened(&self) -> Vec<MockSession> {
        self.opened.lock().clone()
    }
}

impl SessionFactory for MockSessionFactory {
    type Session = MockSession;

    fn open_session(&self) -> Result<MockSession, SessionError> {
        let session = MockSession::with_op_delay(self.op_delay);
        self.opened.lock().push(session.clone());
        Ok(session)
    }
}
