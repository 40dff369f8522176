// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The access guard: every call into the wrapped resource goes through
//! [`AccessGuard::call`], which decides whether the calling thread may
//! proceed, has to wait, or is let through unsynchronized.
//!
//! Decision order for a call from thread `T`:
//!
//! 1. Resource unowned: `T` claims ownership and keeps it for later calls.
//! 2. `T` is the owner: forward without waiting.
//! 3. `T` is ignore-listed: forward without the lock and warn.
//! 4. Otherwise run the bounded wait. On success the call runs under the
//!    lock, which is released when the call returns. On timeout or deadlock
//!    `T` is ignore-listed and the call is forwarded without the lock.
//!
//! The guard only decides *when* a call runs. It never changes what is
//! called, and errors raised by the resource reach the caller untouched.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};
use warden_core::{AccessIncident, ThreadIdentity};

use crate::context::GuardContext;
use crate::deadlock::DeadlockReport;
use crate::ignore::IgnoreCache;
use crate::lifecycle::ReleaseHandle;
use crate::lock::{HoldGuard, HoldKind, OwnershipLock};
use crate::stats::{GuardStats, GuardStatsSnapshot};
use crate::wait::{BoundedWait, WaitOutcome};

/// Serializes cross-thread access to a resource that is not safe to use
/// from two threads at once.
pub struct AccessGuard<R> {
    resource: R,
    label: Arc<str>,
    lock: Arc<OwnershipLock>,
    context: GuardContext,
    stats: GuardStats,
}

impl<R> AccessGuard<R> {
    /// Wraps `resource` unowned. The first thread to call it becomes the owner.
    ///
    /// The returned [`ReleaseHandle`] must be triggered when the resource's
    /// session ends.
    pub fn attach(
        resource: R,
        label: impl Into<Arc<str>>,
        context: GuardContext,
    ) -> (Self, ReleaseHandle) {
        let label = label.into();
        let lock = Arc::new(OwnershipLock::new());
        let release = ReleaseHandle::new(Arc::clone(&label), Arc::clone(&lock));
        let guard = Self {
            resource,
            label,
            lock,
            context,
            stats: GuardStats::default(),
        };
        (guard, release)
    }

    /// Wraps `resource` with the calling thread already recorded as owner.
    pub fn attach_claimed(
        resource: R,
        label: impl Into<Arc<str>>,
        context: GuardContext,
    ) -> (Self, ReleaseHandle) {
        let (guard, release) = Self::attach(resource, label, context);
        let me = ThreadIdentity::current();
        if let Ok(hold) = guard.lock.try_claim(&me) {
            debug!(resource = %guard.label, owner = %me, "session opened and claimed");
            guard.record_owner_stack(&me);
            // Ownership outlives this call; the release handle ends it.
            let _ = hold;
        }
        (guard, release)
    }

    /// Runs `op` against the resource once the calling thread is allowed to.
    pub fn call<T>(&self, op: impl FnOnce(&R) -> T) -> T {
        let me = ThreadIdentity::current();

        let owner = match self.lock.try_claim(&me) {
            Ok(hold) => {
                match hold.kind() {
                    HoldKind::Claimed => {
                        debug!(resource = %self.label, owner = %me, "ownership claimed");
                        self.record_owner_stack(&me);
                    }
                    _ => trace!(resource = %self.label, owner = %me, "owner call"),
                }
                self.stats.owner_call();
                return op(&self.resource);
            }
            Err(owner) => owner,
        };

        if self.context.ignore_cache().is_active(&me) {
            self.stats.unsynchronized(AccessIncident::UnsynchronizedAccess);
            report_incident!(
                AccessIncident::UnsynchronizedAccess,
                resource = %self.label,
                thread = %me,
                owner = %owner,
                "ignore-listed thread is calling into a session owned by another thread without synchronization"
            );
            return op(&self.resource);
        }

        self.stats.contended_call();
        let config = self.context.config();
        warn!(
            resource = %self.label,
            waiter = %me,
            owner = %owner,
            max_wait_ms = config.hard_timeout_ms,
            waiter_stack = %Backtrace::capture(),
            "thread is accessing the still-active session of another thread, waiting"
        );

        let wait = BoundedWait::new(
            &self.lock,
            self.context.detector(),
            config.soft_timeout(),
            config.hard_timeout(),
        );
        match wait.run(&me, &owner) {
            WaitOutcome::Acquired { hold, waited } => {
                self.stats.acquired_after_wait();
                debug!(
                    resource = %self.label,
                    waiter = %me,
                    waited_ms = waited.as_millis() as u64,
                    "session acquired after waiting"
                );
                let _hold = HoldGuard::new(&self.lock, hold);
                self.record_owner_stack(&me);
                op(&self.resource)
            }
            WaitOutcome::TimedOut {
                waited,
                owner: current,
                deadlock,
                unrelated_deadlocks,
            } => {
                self.stats.unrelated_deadlocks(unrelated_deadlocks);
                let owner = current.unwrap_or(owner);
                self.report_unsynchronized(&me, &owner, waited, deadlock.as_ref());
                self.context.ignore_cache().insert(&me);
                op(&self.resource)
            }
        }
    }

    /// Stores the caller's stack as the owner stack. Only called when a
    /// tenure starts; reentrant calls keep the stack of the claiming call.
    fn record_owner_stack(&self, me: &ThreadIdentity) {
        if !self.context.config().capture_owner_stacks {
            return;
        }
        self.stats.stack_capture();
        let stack = Backtrace::capture();
        if stack.status() == BacktraceStatus::Captured {
            self.lock.record_stack(me, stack);
        }
    }

    fn report_unsynchronized(
        &self,
        me: &ThreadIdentity,
        owner: &ThreadIdentity,
        waited: Duration,
        deadlock: Option<&DeadlockReport>,
    ) {
        let owner_stack = match self.lock.snapshot() {
            Some(snapshot) if snapshot.thread == *owner => snapshot.stack_report(),
            _ => "<owner no longer holds the session>".to_string(),
        };
        let waited_ms = waited.as_millis() as u64;

        match deadlock {
            Some(report) => {
                self.stats.unsynchronized(AccessIncident::DeadlockDetected);
                report_incident!(
                    AccessIncident::DeadlockDetected,
                    resource = %self.label,
                    waiter = %me,
                    owner = %owner,
                    involved = %report,
                    elapsed_ms = waited_ms,
                    owner_stack = %owner_stack,
                    "deadlock detected while waiting for the session of another thread, \
                     calling anyway; this may cause a concurrent access error"
                );
            }
            None => {
                self.stats.unsynchronized(AccessIncident::AcquisitionTimeout);
                report_incident!(
                    AccessIncident::AcquisitionTimeout,
                    resource = %self.label,
                    waiter = %me,
                    owner = %owner,
                    elapsed_ms = waited_ms,
                    max_wait_ms = self.context.config().hard_timeout_ms,
                    owner_stack = %owner_stack,
                    "waited too long for the session of another thread (no deadlock detected), \
                     calling anyway; this may cause a concurrent access error"
                );
            }
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current owner, if any.
    pub fn owner(&self) -> Option<ThreadIdentity> {
        self.lock.owner()
    }

    pub fn stats(&self) -> GuardStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn ignore_cache(&self) -> &IgnoreCache {
        self.context.ignore_cache()
    }

    pub fn context(&self) -> &GuardContext {
        &self.context
    }

    /// Direct access that bypasses the guard, for wiring done before the
    /// resource is shared.
    pub(crate) fn resource_unguarded(&self) -> &R {
        &self.resource
    }
}

impl<R> std::fmt::Debug for AccessGuard<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGuard")
            .field("resource", &self.label)
            .field("owner", &self.lock.owner())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
