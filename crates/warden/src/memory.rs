// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory session used by the demo.
//!
//! Like an ORM session it is not safe for concurrent use: a call that
//! starts while another thread is still inside fails with
//! [`SessionError::ConcurrentAccess`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;
use warden_core::{EndListener, Record, RecordId, Session, SessionError, SessionId};

struct State {
    id: SessionId,
    op_delay: Duration,
    records: Mutex<BTreeMap<RecordId, Record>>,
    next_id: AtomicU64,
    dirty: AtomicUsize,
    in_flight: AtomicUsize,
    collisions: AtomicUsize,
    closed: AtomicBool,
    listeners: Mutex<Vec<EndListener>>,
}

/// Cheaply cloneable handle; clones share one session.
#[derive(Clone)]
pub struct MemorySession {
    state: Arc<State>,
}

struct Entered<'a>(&'a State);

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemorySession {
    /// Each operation takes `op_delay`, the time another thread has to
    /// collide with it.
    pub fn new(op_delay: Duration) -> Self {
        Self {
            state: Arc::new(State {
                id: SessionId::generate(),
                op_delay,
                records: Mutex::new(BTreeMap::new()),
                next_id: AtomicU64::new(1),
                dirty: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                collisions: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Calls rejected because another call was in flight.
    pub fn collisions(&self) -> usize {
        self.state.collisions.load(Ordering::SeqCst)
    }

    fn enter(&self, op: &'static str) -> Result<Entered<'_>, SessionError> {
        let state = &*self.state;
        let in_flight = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let entered = Entered(state);
        trace!(session = %state.id, op, in_flight, "memory session call");

        if in_flight > 1 {
            state.collisions.fetch_add(1, Ordering::SeqCst);
            return Err(SessionError::ConcurrentAccess {
                session: state.id.clone(),
                in_flight,
            });
        }
        if state.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        thread::sleep(state.op_delay);
        Ok(entered)
    }
}

impl Session for MemorySession {
    fn id(&self) -> SessionId {
        self.state.id.clone()
    }

    fn is_open(&self) -> bool {
        !self.state.closed.load(Ordering::SeqCst)
    }

    fn persist(&self, record: Record) -> Result<RecordId, SessionError> {
        let _entered = self.enter("persist")?;
        let id = RecordId(self.state.next_id.fetch_add(1, Ordering::SeqCst));
        self.state.records.lock().insert(id, record);
        self.state.dirty.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    fn find(&self, id: RecordId) -> Result<Option<Record>, SessionError> {
        let _entered = self.enter("find")?;
        Ok(self.state.records.lock().get(&id).cloned())
    }

    fn children(&self, parent: RecordId) -> Result<Vec<(RecordId, Record)>, SessionError> {
        let _entered = self.enter("children")?;
        let records = self.state.records.lock();
        if !records.contains_key(&parent) {
            return Err(SessionError::NotFound(parent));
        }
        Ok(records
            .iter()
            .filter(|(_, record)| record.parent == Some(parent))
            .map(|(id, record)| (*id, record.clone()))
            .collect())
    }

    fn remove(&self, id: RecordId) -> Result<bool, SessionError> {
        let _entered = self.enter("remove")?;
        let removed = self.state.records.lock().remove(&id).is_some();
        if removed {
            self.state.dirty.fetch_add(1, Ordering::SeqCst);
        }
        Ok(removed)
    }

    fn flush(&self) -> Result<usize, SessionError> {
        let _entered = self.enter("flush")?;
        Ok(self.state.dirty.swap(0, Ordering::SeqCst))
    }

    fn close(&self) -> Result<(), SessionError> {
        {
            let _entered = self.enter("close")?;
            self.state.closed.store(true, Ordering::SeqCst);
        }
        // Outside the call: a listener may wake a waiter that enters at once.
        let listeners = std::mem::take(&mut *self.state.listeners.lock());
        for listener in listeners {
            listener();
        }
        Ok(())
    }

    fn add_end_listener(&self, listener: EndListener) {
        self.state.listeners.lock().push(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_follow_parent_links() {
        let session = MemorySession::new(Duration::ZERO);
        let parent = session.persist(Record::new("foo")).unwrap();
        session.persist(Record::new("bar").child_of(parent)).unwrap();
        session.persist(Record::new("bar")).unwrap();

        assert_eq!(session.children(parent).unwrap().len(), 1);
        assert_eq!(session.flush().unwrap(), 3);
        assert!(matches!(
            session.children(RecordId(99)),
            Err(SessionError::NotFound(RecordId(99)))
        ));
    }

    #[test]
    fn close_fires_listeners_once() {
        let session = MemorySession::new(Duration::ZERO);
        let fired = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&fired);
        session.add_end_listener(Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        }));

        session.close().unwrap();
        assert!(!session.is_open());
        assert!(matches!(session.close(), Err(SessionError::Closed)));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn overlapping_calls_collide() {
        let session = MemorySession::new(Duration::from_millis(100));
        let results: Vec<_> = thread::scope(|s| {
            let first = s.spawn(|| session.flush());
            thread::sleep(Duration::from_millis(20));
            let second = session.flush();
            vec![first.join().unwrap(), second]
        });
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(SessionError::ConcurrentAccess { in_flight: 2, .. })
        ));
        assert_eq!(session.collisions(), 1);
    }
}
