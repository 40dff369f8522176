// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lazy-collection race demo.
//!
//! The main thread loads a parent record and keeps working in its session.
//! A second thread walks the parent's child collection, which is loaded
//! lazily through the same session. Unguarded, the two threads end up inside
//! the session together. Guarded, the second thread waits until the main
//! thread ends its unit of work.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};
use warden_config::GuardConfig;
use warden_core::{Record, RecordId, Session, SessionError, WardenError};
use warden_guard::{AccessGuard, GuardContext, GuardStatsSnapshot};

use crate::memory::MemorySession;

const CHILDREN: usize = 3;
const OP_DELAY: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Guarded,
    Unguarded,
}

/// What happened during one demo run.
#[derive(Debug)]
pub struct DemoReport {
    pub mode: Mode,
    /// Children seen by the second thread, or the error it got.
    pub worker: Result<usize, SessionError>,
    pub worker_waited: Duration,
    /// Failed calls on the owning thread.
    pub owner_errors: usize,
    /// Calls the session rejected because another call was in flight.
    pub concurrent_errors: usize,
    pub stats: Option<GuardStatsSnapshot>,
}

impl DemoReport {
    pub fn print(&self) {
        println!("mode:              {:?}", self.mode);
        match &self.worker {
            Ok(n) => println!("worker:            loaded {n} children"),
            Err(e) => println!("worker:            failed: {e}"),
        }
        println!("worker waited:     {} ms", self.worker_waited.as_millis());
        println!("owner errors:      {}", self.owner_errors);
        println!("concurrent errors: {}", self.concurrent_errors);
        if let Some(stats) = &self.stats {
            println!(
                "guard:             {} owner calls, {} contended, {} acquired after wait, {} unsynchronized",
                stats.owner_calls,
                stats.contended_calls,
                stats.acquired_after_wait,
                stats.unsynchronized_calls
            );
        }
    }
}

fn seed(session: &MemorySession) -> Result<RecordId, SessionError> {
    let parent = session.persist(Record::new("foo"))?;
    for i in 0..CHILDREN {
        session.persist(
            Record::new("bar")
                .with_field("index", i.to_string())
                .child_of(parent),
        )?;
    }
    session.flush()?;
    Ok(parent)
}

/// Runs the scenario once. `hold` is how long the owner keeps the session
/// busy before ending its unit of work.
pub fn run(config: &GuardConfig, mode: Mode, hold: Duration) -> Result<DemoReport, WardenError> {
    let session = MemorySession::new(OP_DELAY);
    let parent = seed(&session)?;
    info!(?mode, hold_ms = hold.as_millis() as u64, "demo session seeded");

    let report = match mode {
        Mode::Unguarded => {
            let (worker, worker_waited, owner_errors) = race(&session, parent, hold, || {})?;
            close(&session);
            DemoReport {
                mode,
                worker,
                worker_waited,
                owner_errors,
                concurrent_errors: session.collisions(),
                stats: None,
            }
        }
        Mode::Guarded => {
            let label = session.id().to_string();
            let (guard, release) = AccessGuard::attach_claimed(
                session.clone(),
                label,
                GuardContext::new(config.clone()),
            );
            let (worker, worker_waited, owner_errors) = race(&guard, parent, hold, || {
                release.release();
            })?;
            close(&guard);
            DemoReport {
                mode,
                worker,
                worker_waited,
                owner_errors,
                concurrent_errors: session.collisions(),
                stats: Some(guard.stats()),
            }
        }
    };
    Ok(report)
}

fn close(session: &dyn Session) {
    if let Err(e) = session.close() {
        warn!(session = %session.id(), error = %e, "closing demo session failed");
    }
}

/// Owner keeps flushing for `hold` while a second thread loads the children
/// of `parent`. `end_of_work` runs once the owner is done.
fn race(
    session: &dyn Session,
    parent: RecordId,
    hold: Duration,
    end_of_work: impl FnOnce(),
) -> Result<(Result<usize, SessionError>, Duration, usize), WardenError> {
    thread::scope(|s| {
        let worker = thread::Builder::new()
            .name("demo-worker".into())
            .spawn_scoped(s, || {
                let started = Instant::now();
                let children = session.children(parent).map(|c| c.len());
                (children, started.elapsed())
            })
            .map_err(|e| WardenError::Internal(format!("failed to spawn demo worker: {e}")))?;

        let mut owner_errors = 0;
        if let Err(e) = session.find(parent) {
            warn!(error = %e, "owner lookup failed");
            owner_errors += 1;
        }
        let deadline = Instant::now() + hold;
        while Instant::now() < deadline {
            if let Err(e) = session.flush() {
                warn!(error = %e, "owner flush failed");
                owner_errors += 1;
            }
        }
        end_of_work();

        let (children, waited) = worker
            .join()
            .map_err(|_| WardenError::Internal("demo worker panicked".into()))?;
        match &children {
            Ok(n) => info!(children = n, waited_ms = waited.as_millis() as u64, "worker loaded children"),
            Err(e) => warn!(error = %e, "worker failed to load children"),
        }
        Ok((children, waited, owner_errors))
    })
}
