// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exclusive, reentrant ownership lock.
//!
//! The owner identity and the "locked" state are the same field, so they
//! change together under one mutex: the lock is held exactly when an owner
//! is recorded. Ownership survives across calls (a session owner keeps it
//! until the session ends), which is why this is not a scoped mutex guard.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::trace;
use warden_core::ThreadIdentity;

/// How a [`Hold`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldKind {
    /// Ownership claimed on an unowned lock; kept until explicitly released.
    Claimed,
    /// Obtained after waiting; released when the guarded call returns.
    Acquired,
    /// The caller already owned the lock. Releasing it is a no-op.
    Reentrant,
}

/// Proof of holding the lock during one ownership tenure.
#[derive(Debug)]
#[must_use = "an acquired hold must be released"]
pub struct Hold {
    thread: ThreadIdentity,
    tenure: u64,
    kind: HoldKind,
}

impl Hold {
    pub fn kind(&self) -> HoldKind {
        self.kind
    }

    pub fn thread(&self) -> &ThreadIdentity {
        &self.thread
    }
}

struct Owner {
    thread: ThreadIdentity,
    since: Instant,
    stack: Option<Arc<Backtrace>>,
}

#[derive(Default)]
struct LockState {
    owner: Option<Owner>,
    /// Bumped on every grant so stale holds cannot release a later owner.
    tenure: u64,
}

impl LockState {
    fn grant(&mut self, me: &ThreadIdentity, kind: HoldKind) -> Result<Hold, ThreadIdentity> {
        match &self.owner {
            None => {
                self.tenure += 1;
                self.owner = Some(Owner {
                    thread: me.clone(),
                    since: Instant::now(),
                    stack: None,
                });
                Ok(Hold {
                    thread: me.clone(),
                    tenure: self.tenure,
                    kind,
                })
            }
            Some(owner) if owner.thread == *me => Ok(Hold {
                thread: me.clone(),
                tenure: self.tenure,
                kind: HoldKind::Reentrant,
            }),
            Some(owner) => Err(owner.thread.clone()),
        }
    }
}

/// Point-in-time view of the current owner, for reports.
#[derive(Debug, Clone)]
pub struct OwnerSnapshot {
    pub thread: ThreadIdentity,
    pub held_for: Duration,
    pub stack: Option<Arc<Backtrace>>,
}

impl OwnerSnapshot {
    /// The owner's last recorded call stack, or a note on why there is none.
    pub fn stack_report(&self) -> String {
        match &self.stack {
            Some(bt) if bt.status() == BacktraceStatus::Captured => bt.to_string(),
            Some(_) => "<not captured: set RUST_BACKTRACE=1>".to_string(),
            None => "<not recorded>".to_string(),
        }
    }
}

/// Single-owner lock paired with the identity of the owning thread.
#[derive(Default)]
pub struct OwnershipLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl OwnershipLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current owner, if any.
    pub fn owner(&self) -> Option<ThreadIdentity> {
        self.state.lock().owner.as_ref().map(|o| o.thread.clone())
    }

    pub fn is_held(&self) -> bool {
        self.state.lock().owner.is_some()
    }

    pub fn snapshot(&self) -> Option<OwnerSnapshot> {
        self.state.lock().owner.as_ref().map(|o| OwnerSnapshot {
            thread: o.thread.clone(),
            held_for: o.since.elapsed(),
            stack: o.stack.clone(),
        })
    }

    /// Non-blocking claim. Returns a `Claimed` hold on an unowned lock, a
    /// `Reentrant` hold if `me` already owns it, or the current owner.
    pub fn try_claim(&self, me: &ThreadIdentity) -> Result<Hold, ThreadIdentity> {
        self.state.lock().grant(me, HoldKind::Claimed)
    }

    /// Waits up to `timeout` for the lock to become free and takes it.
    pub fn try_acquire(&self, me: &ThreadIdentity, timeout: Duration) -> Option<Hold> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Ok(hold) = state.grant(me, HoldKind::Acquired) {
                return Some(hold);
            }
            if self.released.wait_until(&mut state, deadline).timed_out() {
                return state.grant(me, HoldKind::Acquired).ok();
            }
        }
    }

    /// Releases `hold` if its tenure is still current. Reentrant holds and
    /// holds invalidated by [`force_release`](Self::force_release) are ignored.
    pub fn release(&self, hold: Hold) -> bool {
        if hold.kind == HoldKind::Reentrant {
            return false;
        }
        let mut state = self.state.lock();
        let current = matches!(
            &state.owner,
            Some(owner) if owner.thread == hold.thread && state.tenure == hold.tenure
        );
        if current {
            state.owner = None;
            drop(state);
            self.released.notify_all();
            trace!(thread = %hold.thread, "ownership released");
        }
        current
    }

    /// Clears ownership regardless of who holds it. Returns the previous owner.
    pub fn force_release(&self) -> Option<ThreadIdentity> {
        let previous = self.state.lock().owner.take().map(|o| o.thread);
        if previous.is_some() {
            self.released.notify_all();
        }
        previous
    }

    /// Stores `stack` as the owner's latest call stack if `me` is the owner.
    pub fn record_stack(&self, me: &ThreadIdentity, stack: Backtrace) {
        let mut state = self.state.lock();
        if let Some(owner) = state.owner.as_mut()
            && owner.thread == *me
        {
            owner.stack = Some(Arc::new(stack));
        }
    }
}

/// Releases an `Acquired` hold when dropped, including on unwind.
pub struct HoldGuard<'a> {
    lock: &'a OwnershipLock,
    hold: Option<Hold>,
}

impl<'a> HoldGuard<'a> {
    pub fn new(lock: &'a OwnershipLock, hold: Hold) -> Self {
        Self {
            lock,
            hold: Some(hold),
        }
    }
}

impl Drop for HoldGuard<'_> {
    fn drop(&mut self) {
        if let Some(hold) = self.hold.take() {
            self.lock.release(hold);
        }
    }
}
