// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session-end hook that resets ownership.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;
use warden_core::{EndListener, ThreadIdentity};

use crate::lock::OwnershipLock;

struct Inner {
    label: Arc<str>,
    lock: Arc<OwnershipLock>,
    fired: AtomicBool,
}

/// Handle the resource's lifecycle owner triggers when the session ends.
///
/// Releasing clears ownership no matter which thread calls it. Only the
/// first release has an effect; later ones are ignored so they cannot strip
/// ownership from a thread that claimed the resource afterwards.
#[derive(Clone)]
pub struct ReleaseHandle {
    inner: Arc<Inner>,
}

impl ReleaseHandle {
    pub(crate) fn new(label: Arc<str>, lock: Arc<OwnershipLock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                label,
                lock,
                fired: AtomicBool::new(false),
            }),
        }
    }

    /// Ends the session's ownership. Returns `false` if already released.
    pub fn release(&self) -> bool {
        let inner = &self.inner;
        if inner.fired.swap(true, Ordering::AcqRel) {
            debug!(resource = %inner.label, "session end already signalled; ignoring");
            return false;
        }
        let released_by = ThreadIdentity::current();
        match inner.lock.force_release() {
            Some(owner) => debug!(
                resource = %inner.label,
                owner = %owner,
                released_by = %released_by,
                "session ended, ownership released"
            ),
            None => debug!(resource = %inner.label, released_by = %released_by, "session ended while unowned"),
        }
        true
    }

    pub fn is_released(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Converts the handle into a session end listener.
    pub fn into_listener(self) -> EndListener {
        Box::new(move || {
            self.release();
        })
    }
}

impl std::fmt::Debug for ReleaseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseHandle")
            .field("resource", &self.inner.label)
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn release_clears_owner_once() {
        let lock = Arc::new(OwnershipLock::new());
        let handle = ReleaseHandle::new("s".into(), Arc::clone(&lock));
        let me = ThreadIdentity::current();
        let _hold = lock.try_claim(&me).unwrap();

        assert!(handle.release());
        assert!(!lock.is_held());
        assert!(handle.is_released());

        // A later owner is not affected by a redundant release.
        let _hold = lock.try_claim(&me).unwrap();
        assert!(!handle.clone().release());
        assert_eq!(lock.owner(), Some(me));
    }

    #[test]
    fn release_from_another_thread_clears_owner() {
        let lock = Arc::new(OwnershipLock::new());
        let handle = ReleaseHandle::new("s".into(), Arc::clone(&lock));
        let _hold = lock.try_claim(&ThreadIdentity::current()).unwrap();

        let listener = handle.into_listener();
        thread::spawn(listener).join().unwrap();
        assert!(!lock.is_held());
    }
}
