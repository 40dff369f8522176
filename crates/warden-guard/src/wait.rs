// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded-wait acquisition: `Idle -> Waiting -> {Acquired | TimedOut}`.
//!
//! The waiter retries [`OwnershipLock::try_acquire`] in soft-timeout slices
//! until the hard budget is spent. Between slices it asks the deadlock
//! detector whether it and the owner are on a wait-for cycle; if so, more
//! waiting cannot help and the wait ends early. A cycle elsewhere in the
//! process is logged and otherwise ignored.

use std::time::{Duration, Instant};

use tracing::debug;
use warden_core::{AccessIncident, ThreadIdentity};

use crate::deadlock::{DeadlockDetector, DeadlockReport};
use crate::lock::{Hold, OwnershipLock};

#[derive(Debug)]
pub enum WaitOutcome {
    Acquired {
        hold: Hold,
        waited: Duration,
    },
    TimedOut {
        waited: Duration,
        /// Owner when the wait was abandoned, if the lock was still held.
        owner: Option<ThreadIdentity>,
        /// Set when the wait ended early because of a deadlock.
        deadlock: Option<DeadlockReport>,
        unrelated_deadlocks: u64,
    },
}

pub struct BoundedWait<'a> {
    lock: &'a OwnershipLock,
    detector: &'a dyn DeadlockDetector,
    soft_timeout: Duration,
    hard_timeout: Duration,
}

/// Keeps the waiter's edge in the wait-for graph while the wait runs.
struct WaitRecord<'a> {
    detector: &'a dyn DeadlockDetector,
    waiter: &'a ThreadIdentity,
}

impl<'a> WaitRecord<'a> {
    fn start(
        detector: &'a dyn DeadlockDetector,
        waiter: &'a ThreadIdentity,
        holder: &ThreadIdentity,
    ) -> Self {
        detector.record_wait(waiter, holder);
        Self { detector, waiter }
    }

    fn retarget(&self, holder: &ThreadIdentity) {
        self.detector.record_wait(self.waiter, holder);
    }
}

impl Drop for WaitRecord<'_> {
    fn drop(&mut self) {
        self.detector.clear_wait(self.waiter);
    }
}

impl<'a> BoundedWait<'a> {
    pub fn new(
        lock: &'a OwnershipLock,
        detector: &'a dyn DeadlockDetector,
        soft_timeout: Duration,
        hard_timeout: Duration,
    ) -> Self {
        Self {
            lock,
            detector,
            soft_timeout,
            hard_timeout,
        }
    }

    /// Waits for `owner` to give up the lock. Never blocks longer than the
    /// hard timeout plus scheduling slack.
    pub fn run(&self, waiter: &ThreadIdentity, owner: &ThreadIdentity) -> WaitOutcome {
        let started = Instant::now();
        let record = WaitRecord::start(self.detector, waiter, owner);
        let mut owner = owner.clone();
        let mut unrelated_deadlocks = 0;

        loop {
            let elapsed = started.elapsed();
            if elapsed >= self.hard_timeout {
                return WaitOutcome::TimedOut {
                    waited: elapsed,
                    owner: self.lock.owner(),
                    deadlock: None,
                    unrelated_deadlocks,
                };
            }

            let slice = self.soft_timeout.min(self.hard_timeout - elapsed);
            if let Some(hold) = self.lock.try_acquire(waiter, slice) {
                return WaitOutcome::Acquired {
                    hold,
                    waited: started.elapsed(),
                };
            }

            match self.lock.owner() {
                // Released between the timeout and this check: retry at once.
                None => continue,
                Some(current) if current != owner => {
                    debug!(waiter = %waiter, previous = %owner, owner = %current, "session changed hands while waiting");
                    record.retarget(&current);
                    owner = current;
                }
                Some(_) => {}
            }

            let report = self.detector.detect_cycle(waiter, &owner);
            if !report.cycle_detected {
                continue;
            }

            if report.involves_pair(waiter, &owner) {
                report_incident!(
                    AccessIncident::DeadlockDetected,
                    waiter = %waiter,
                    owner = %owner,
                    involved = %report,
                    "deadlock detected between threads"
                );
                return WaitOutcome::TimedOut {
                    waited: started.elapsed(),
                    owner: Some(owner),
                    deadlock: Some(report),
                    unrelated_deadlocks,
                };
            }

            unrelated_deadlocks += 1;
            report_incident!(
                AccessIncident::UnrelatedDeadlockObserved,
                waiter = %waiter,
                owner = %owner,
                involved = %report,
                "deadlock detected between threads, but not involving this waiter and owner"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deadlock::{GraphDeadlockDetector, NoDeadlockDetection, WaitRegistry};
    use crate::lock::HoldKind;
    use std::sync::Arc;
    use std::thread;
    use tracing_test::traced_test;

    fn spawned_identity() -> ThreadIdentity {
        thread::spawn(ThreadIdentity::current).join().unwrap()
    }

    #[test]
    fn unowned_lock_is_acquired_immediately() {
        let lock = OwnershipLock::new();
        let me = ThreadIdentity::current();
        let wait = BoundedWait::new(
            &lock,
            &NoDeadlockDetection,
            Duration::from_millis(10),
            Duration::from_millis(50),
        );
        match wait.run(&me, &spawned_identity()) {
            WaitOutcome::Acquired { hold, .. } => assert_eq!(hold.kind(), HoldKind::Acquired),
            other => panic!("expected acquisition, got {other:?}"),
        }
    }

    #[test]
    fn permanently_held_lock_times_out_within_budget() {
        let lock = OwnershipLock::new();
        let owner = spawned_identity();
        let _hold = lock.try_claim(&owner).unwrap();

        let started = Instant::now();
        let wait = BoundedWait::new(
            &lock,
            &NoDeadlockDetection,
            Duration::from_millis(20),
            Duration::from_millis(100),
        );
        let outcome = wait.run(&ThreadIdentity::current(), &owner);
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(100 + 20 + 200), "took {elapsed:?}");
        match outcome {
            WaitOutcome::TimedOut {
                owner: Some(reported),
                deadlock: None,
                ..
            } => assert_eq!(reported, owner),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn wait_edge_is_cleared_after_wait() {
        let lock = OwnershipLock::new();
        let owner = spawned_identity();
        let _hold = lock.try_claim(&owner).unwrap();
        let registry = Arc::new(WaitRegistry::new());
        let detector = GraphDeadlockDetector::new(registry.clone());

        let wait = BoundedWait::new(
            &lock,
            &detector,
            Duration::from_millis(10),
            Duration::from_millis(30),
        );
        let _ = wait.run(&ThreadIdentity::current(), &owner);
        assert!(registry.is_empty());
    }

    #[test]
    #[traced_test]
    fn pairwise_deadlock_ends_wait_early() {
        let lock = OwnershipLock::new();
        let owner = spawned_identity();
        let me = ThreadIdentity::current();
        let _hold = lock.try_claim(&owner).unwrap();

        // The owner is itself waiting on something this thread holds.
        let registry = Arc::new(WaitRegistry::new());
        let detector = GraphDeadlockDetector::new(registry.clone());
        detector.record_wait(&owner, &me);

        let started = Instant::now();
        let wait = BoundedWait::new(
            &lock,
            &detector,
            Duration::from_millis(20),
            Duration::from_secs(30),
        );
        let outcome = wait.run(&me, &owner);

        assert!(started.elapsed() < Duration::from_secs(5));
        match outcome {
            WaitOutcome::TimedOut {
                deadlock: Some(report),
                ..
            } => assert!(report.involves_pair(&me, &owner)),
            other => panic!("expected deadlock exit, got {other:?}"),
        }
        assert!(logs_contain("deadlock_detected"));
    }

    #[test]
    #[traced_test]
    fn unrelated_deadlock_does_not_end_wait() {
        let lock = OwnershipLock::new();
        let owner = spawned_identity();
        let _hold = lock.try_claim(&owner).unwrap();

        let registry = Arc::new(WaitRegistry::new());
        let detector = GraphDeadlockDetector::new(registry.clone());
        let (x, y) = (spawned_identity(), spawned_identity());
        detector.record_wait(&x, &y);
        detector.record_wait(&y, &x);

        let started = Instant::now();
        let wait = BoundedWait::new(
            &lock,
            &detector,
            Duration::from_millis(20),
            Duration::from_millis(120),
        );
        let outcome = wait.run(&ThreadIdentity::current(), &owner);

        assert!(started.elapsed() >= Duration::from_millis(120));
        match outcome {
            WaitOutcome::TimedOut {
                deadlock: None,
                unrelated_deadlocks,
                ..
            } => assert!(unrelated_deadlocks >= 1),
            other => panic!("expected plain timeout, got {other:?}"),
        }
        assert!(logs_contain("not involving this waiter and owner"));
    }
}
