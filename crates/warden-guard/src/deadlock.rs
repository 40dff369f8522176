// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deadlock detection over the thread wait-for graph.
//!
//! Detection is a pure query against a [`ThreadIntrospection`] source. The
//! default source is the process-wide [`WaitRegistry`], into which every
//! waiting guard records a `waiter -> holder` edge for the duration of its
//! wait, so cycles that span several guarded sessions are visible. When no
//! introspection is available the detector reports no deadlock and the wait
//! protocol falls back to plain timeouts.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, LazyLock};
use std::thread::ThreadId;

use dashmap::DashMap;
use warden_core::ThreadIdentity;

/// One edge of the wait-for graph: `waiter` is blocked on a lock `holder` owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitEdge {
    pub waiter: ThreadIdentity,
    pub holder: ThreadIdentity,
}

impl WaitEdge {
    pub fn new(waiter: ThreadIdentity, holder: ThreadIdentity) -> Self {
        Self { waiter, holder }
    }
}

/// Result of one detection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeadlockReport {
    /// Every cycle found, each kept separate. The probing waiter's cycle
    /// comes first.
    pub cycles: Vec<Vec<ThreadIdentity>>,
    pub cycle_detected: bool,
}

impl DeadlockReport {
    pub fn none() -> Self {
        Self::default()
    }

    /// Builds a report from cycles, ordering the one containing `waiter` first.
    pub fn from_cycles(mut cycles: Vec<Vec<ThreadIdentity>>, waiter: &ThreadIdentity) -> Self {
        cycles.retain(|cycle| !cycle.is_empty());
        cycles.sort_by_key(|cycle| !cycle.contains(waiter));
        Self {
            cycle_detected: !cycles.is_empty(),
            cycles,
        }
    }

    /// Threads on any cycle, in report order.
    pub fn involved_threads(&self) -> impl Iterator<Item = &ThreadIdentity> {
        self.cycles.iter().flatten()
    }

    pub fn involves(&self, thread: &ThreadIdentity) -> bool {
        self.cycles.iter().any(|cycle| cycle.contains(thread))
    }

    /// Whether `waiter` and `owner` sit on the same cycle.
    pub fn involves_pair(&self, waiter: &ThreadIdentity, owner: &ThreadIdentity) -> bool {
        self.cycles
            .iter()
            .any(|cycle| cycle.contains(waiter) && cycle.contains(owner))
    }
}

impl fmt::Display for DeadlockReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, cycle) in self.cycles.iter().enumerate() {
            if n > 0 {
                f.write_str(" ")?;
            }
            f.write_str("[")?;
            for (i, thread) in cycle.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{thread}")?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

/// Source of wait-for information about live threads.
pub trait ThreadIntrospection: Send + Sync {
    /// Current wait-for edges, or `None` when no information is available.
    fn wait_edges(&self) -> Option<Vec<WaitEdge>>;

    /// Notes that `waiter` has started waiting on a lock `holder` owns.
    fn record_wait(&self, _waiter: &ThreadIdentity, _holder: &ThreadIdentity) {}

    /// Notes that `waiter` stopped waiting.
    fn clear_wait(&self, _waiter: &ThreadIdentity) {}
}

/// Introspection that never has information.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl ThreadIntrospection for Unavailable {
    fn wait_edges(&self) -> Option<Vec<WaitEdge>> {
        None
    }
}

static GLOBAL_REGISTRY: LazyLock<Arc<WaitRegistry>> =
    LazyLock::new(|| Arc::new(WaitRegistry::new()));

/// Live wait-for edges, keyed by waiter. A thread waits on at most one lock
/// at a time, so a new edge for the same waiter replaces the old one.
#[derive(Debug, Default)]
pub struct WaitRegistry {
    edges: DashMap<ThreadId, WaitEdge>,
}

impl WaitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every guard in the process.
    pub fn global() -> Arc<WaitRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

impl ThreadIntrospection for WaitRegistry {
    fn wait_edges(&self) -> Option<Vec<WaitEdge>> {
        Some(self.edges.iter().map(|e| e.value().clone()).collect())
    }

    fn record_wait(&self, waiter: &ThreadIdentity, holder: &ThreadIdentity) {
        self.edges
            .insert(waiter.id(), WaitEdge::new(waiter.clone(), holder.clone()));
    }

    fn clear_wait(&self, waiter: &ThreadIdentity) {
        self.edges.remove(&waiter.id());
    }
}

/// Answers whether a waiter and an owner are deadlocked.
pub trait DeadlockDetector: Send + Sync {
    /// Pure query: inspects the wait-for graph without changing it.
    fn detect_cycle(&self, waiter: &ThreadIdentity, owner: &ThreadIdentity) -> DeadlockReport;

    fn record_wait(&self, _waiter: &ThreadIdentity, _holder: &ThreadIdentity) {}

    fn clear_wait(&self, _waiter: &ThreadIdentity) {}
}

/// Detector for environments without wait-graph introspection.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDeadlockDetection;

impl DeadlockDetector for NoDeadlockDetection {
    fn detect_cycle(&self, _waiter: &ThreadIdentity, _owner: &ThreadIdentity) -> DeadlockReport {
        DeadlockReport::none()
    }
}

/// Cycle search over a [`ThreadIntrospection`] source.
#[derive(Clone)]
pub struct GraphDeadlockDetector {
    introspection: Arc<dyn ThreadIntrospection>,
}

impl GraphDeadlockDetector {
    pub fn new(introspection: Arc<dyn ThreadIntrospection>) -> Self {
        Self { introspection }
    }

    /// Detector over [`WaitRegistry::global`].
    pub fn global() -> Self {
        Self::new(WaitRegistry::global())
    }
}

impl fmt::Debug for GraphDeadlockDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphDeadlockDetector").finish_non_exhaustive()
    }
}

impl DeadlockDetector for GraphDeadlockDetector {
    fn detect_cycle(&self, waiter: &ThreadIdentity, _owner: &ThreadIdentity) -> DeadlockReport {
        match self.introspection.wait_edges() {
            Some(edges) => DeadlockReport::from_cycles(find_cycles(&edges), waiter),
            None => DeadlockReport::none(),
        }
    }

    fn record_wait(&self, waiter: &ThreadIdentity, holder: &ThreadIdentity) {
        self.introspection.record_wait(waiter, holder);
    }

    fn clear_wait(&self, waiter: &ThreadIdentity) {
        self.introspection.clear_wait(waiter);
    }
}

/// Finds every cycle in a wait-for graph.
///
/// Each waiter has at most one outgoing edge (the last one given wins), so
/// walking successors from each unvisited waiter either ends at a thread
/// that waits on nothing, reaches an already explored thread, or closes a
/// cycle on the current path. Cycles are returned in the order their first
/// thread appears in `edges`.
pub fn find_cycles(edges: &[WaitEdge]) -> Vec<Vec<ThreadIdentity>> {
    let next: HashMap<&ThreadIdentity, &ThreadIdentity> =
        edges.iter().map(|e| (&e.waiter, &e.holder)).collect();

    let mut explored: HashSet<&ThreadIdentity> = HashSet::new();
    let mut cycles = Vec::new();

    for start in edges.iter().map(|e| &e.waiter) {
        let mut path: Vec<&ThreadIdentity> = Vec::new();
        let mut position: HashMap<&ThreadIdentity, usize> = HashMap::new();
        let mut current = start;

        loop {
            if explored.contains(current) {
                break;
            }
            if let Some(&at) = position.get(current) {
                cycles.push(path[at..].iter().map(|&t| t.clone()).collect());
                break;
            }
            position.insert(current, path.len());
            path.push(current);
            match next.get(current) {
                Some(&holder) => current = holder,
                None => break,
            }
        }

        explored.extend(path);
    }

    cycles
}
