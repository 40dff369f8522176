// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-thread access guard for sessions that must not be used from two
//! threads at once.
//!
//! A session is owned by the thread that opened (or first used) it. Calls
//! from other threads wait, in soft-timeout slices, for the owner to end the
//! session. The wait is bounded: if a deadlock between waiter and owner is
//! detected, or the hard budget runs out, the call proceeds without the lock
//! and the waiter is exempted from enforcement for a while. The guard always
//! prefers forward progress over enforcement.
//!
//! # Components
//!
//! - [`OwnershipLock`] - single-owner lock tied to the owning thread
//! - [`IgnoreCache`] - threads temporarily exempt after a timeout
//! - [`DeadlockDetector`] - wait-for graph cycle search
//! - [`AccessGuard`] - the per-call interception protocol
//! - [`ReleaseHandle`] - session-end hook that resets ownership
//! - [`GuardedSessionFactory`] - wraps sessions as a factory opens them

#[macro_use]
mod macros;

pub mod context;
pub mod deadlock;
pub mod factory;
pub mod guard;
pub mod ignore;
pub mod lifecycle;
pub mod lock;
pub mod session;
pub mod stats;
pub mod wait;

pub use context::GuardContext;
pub use deadlock::{
    find_cycles, DeadlockDetector, DeadlockReport, GraphDeadlockDetector, NoDeadlockDetection,
    ThreadIntrospection, Unavailable, WaitEdge, WaitRegistry,
};
pub use factory::GuardedSessionFactory;
pub use guard::AccessGuard;
pub use ignore::{IgnoreCache, IgnoreEntry};
pub use lifecycle::ReleaseHandle;
pub use lock::{Hold, HoldKind, OwnershipLock, OwnerSnapshot};
pub use stats::{GuardStats, GuardStatsSnapshot};
pub use wait::{BoundedWait, WaitOutcome};
