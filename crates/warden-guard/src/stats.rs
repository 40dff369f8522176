// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lock-free counters describing how a guard has been exercised.

use std::sync::atomic::{AtomicU64, Ordering};

use warden_core::AccessIncident;

#[derive(Debug, Default)]
pub struct GuardStats {
    owner_calls: AtomicU64,
    contended_calls: AtomicU64,
    acquired_after_wait: AtomicU64,
    unsynchronized_calls: AtomicU64,
    timeouts: AtomicU64,
    deadlocks: AtomicU64,
    unrelated_deadlocks: AtomicU64,
    stack_captures: AtomicU64,
}

/// Copy of [`GuardStats`] at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardStatsSnapshot {
    /// Calls forwarded because the caller owned (or just claimed) the session.
    pub owner_calls: u64,
    /// Calls that found the session owned by another thread and had to wait.
    pub contended_calls: u64,
    pub acquired_after_wait: u64,
    /// Calls forwarded without the lock: ignore-listed callers plus timeouts.
    pub unsynchronized_calls: u64,
    pub timeouts: u64,
    pub deadlocks: u64,
    pub unrelated_deadlocks: u64,
    /// Owner call stacks captured for timeout reports.
    pub stack_captures: u64,
}

impl GuardStats {
    pub(crate) fn owner_call(&self) {
        self.owner_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn contended_call(&self) {
        self.contended_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn acquired_after_wait(&self) {
        self.acquired_after_wait.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn stack_capture(&self) {
        self.stack_captures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn unrelated_deadlocks(&self, count: u64) {
        self.unrelated_deadlocks.fetch_add(count, Ordering::Relaxed);
    }

    /// Counts a call that proceeded without the lock because of `incident`.
    pub(crate) fn unsynchronized(&self, incident: AccessIncident) {
        self.unsynchronized_calls.fetch_add(1, Ordering::Relaxed);
        match incident {
            AccessIncident::AcquisitionTimeout => {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
            }
            AccessIncident::DeadlockDetected => {
                self.deadlocks.fetch_add(1, Ordering::Relaxed);
            }
            AccessIncident::UnsynchronizedAccess | AccessIncident::UnrelatedDeadlockObserved => {}
        }
    }

    pub fn snapshot(&self) -> GuardStatsSnapshot {
        GuardStatsSnapshot {
            owner_calls: self.owner_calls.load(Ordering::Relaxed),
            contended_calls: self.contended_calls.load(Ordering::Relaxed),
            acquired_after_wait: self.acquired_after_wait.load(Ordering::Relaxed),
            unsynchronized_calls: self.unsynchronized_calls.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            deadlocks: self.deadlocks.load(Ordering::Relaxed),
            unrelated_deadlocks: self.unrelated_deadlocks.load(Ordering::Relaxed),
            stack_captures: self.stack_captures.load(Ordering::Relaxed),
        }
    }
}
