// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end behaviour of guarded sessions shared between threads.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use warden_config::GuardConfig;
use warden_core::{Record, RecordId, Session, SessionError, SessionFactory, ThreadIdentity};
use warden_guard::{
    AccessGuard, GraphDeadlockDetector, GuardContext, GuardedSessionFactory, ThreadIntrospection,
    DeadlockDetector, Unavailable, WaitRegistry,
};
use warden_test_utils::{MockSession, MockSessionFactory};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Context whose detector reads a private registry, so parallel tests do not
/// see each other's wait edges.
fn context(soft: Duration, hard: Duration) -> (GuardContext, Arc<WaitRegistry>) {
    let registry = Arc::new(WaitRegistry::new());
    let detector = GraphDeadlockDetector::new(Arc::clone(&registry) as Arc<dyn ThreadIntrospection>);
    let ctx = GuardContext::new(GuardConfig::with_timeouts(soft, hard))
        .with_detector(Arc::new(detector));
    (ctx, registry)
}

#[test]
fn owner_calls_never_block() {
    let (ctx, _) = context(ms(50), ms(500));
    let session = MockSession::new();
    let (guard, _release) = AccessGuard::attach_claimed(session.clone(), "s1", ctx);

    let started = Instant::now();
    let foo = guard.persist(Record::new("foo")).unwrap();
    guard.persist(Record::new("bar").child_of(foo)).unwrap();
    assert_eq!(guard.children(foo).unwrap().len(), 1);
    assert!(started.elapsed() < ms(50));

    let stats = guard.stats();
    assert_eq!(stats.owner_calls, 3);
    assert_eq!(stats.contended_calls, 0);
    assert_eq!(session.max_in_flight(), 1);
}

#[test]
fn waiter_runs_only_after_session_end() {
    let (ctx, _) = context(ms(50), ms(10_000));
    let session = MockSession::new();
    let (guard, release) = AccessGuard::attach_claimed(session.clone(), "s1", ctx);
    let id = guard.persist(Record::new("foo")).unwrap();

    let (ended_at, (found, finished_at)) = thread::scope(|s| {
        let waiter = s.spawn(|| {
            let found = guard.find(id);
            (found, Instant::now())
        });
        thread::sleep(ms(150));
        let ended_at = Instant::now();
        assert!(release.release());
        (ended_at, waiter.join().unwrap())
    });

    assert!(found.unwrap().is_some());
    assert!(finished_at >= ended_at);
    assert_eq!(guard.stats().acquired_after_wait, 1);
    assert_eq!(session.concurrent_errors(), 0);
}

#[test]
fn waiters_never_overlap_the_owner() {
    let (ctx, _) = context(ms(50), ms(10_000));
    let session = MockSession::with_op_delay(ms(10));
    let (guard, release) = AccessGuard::attach_claimed(session.clone(), "s1", ctx);

    let results = thread::scope(|s| {
        let waiters: Vec<_> = (0..2)
            .map(|_| s.spawn(|| guard.persist(Record::new("bar"))))
            .collect();
        for _ in 0..5 {
            guard.persist(Record::new("foo")).unwrap();
        }
        thread::sleep(ms(200));
        release.release();
        waiters
            .into_iter()
            .map(|w| w.join().unwrap())
            .collect::<Vec<_>>()
    });

    assert!(results.iter().all(|r| r.is_ok()));
    let me = ThreadIdentity::current();
    let calls = session.calls();
    assert_eq!(calls.len(), 7);
    assert!(calls[..5].iter().all(|c| c.thread == me && c.op == "persist"));
    assert!(calls[5..].iter().all(|c| c.thread != me));
    assert_eq!(session.max_in_flight(), 1);
    assert_eq!(session.concurrent_errors(), 0);
    assert_eq!(guard.stats().acquired_after_wait, 2);
}

#[test]
fn next_caller_owns_after_release() {
    let (ctx, _) = context(ms(50), ms(500));
    let (guard, release) = AccessGuard::attach_claimed(MockSession::new(), "s1", ctx);
    release.release();
    assert!(guard.owner().is_none());

    thread::scope(|s| {
        s.spawn(|| {
            let started = Instant::now();
            guard.flush().unwrap();
            assert!(started.elapsed() < ms(50));
            assert!(guard.owner().unwrap().is_current());
        });
    });
}

#[test]
fn stuck_owner_is_bypassed_then_ignored() {
    let soft = ms(30);
    let hard = ms(150);
    let (ctx, _) = context(soft, hard);
    let (guard, _release) = AccessGuard::attach_claimed(MockSession::new(), "s1", ctx);

    thread::scope(|s| {
        s.spawn(|| {
            let started = Instant::now();
            guard.flush().unwrap();
            let first = started.elapsed();
            assert!(first >= hard);
            assert!(first < hard + soft + ms(500));

            let started = Instant::now();
            guard.flush().unwrap();
            assert!(started.elapsed() < ms(30));
            assert!(guard.ignore_cache().is_active(&ThreadIdentity::current()));
        });
    });

    let stats = guard.stats();
    assert_eq!(stats.timeouts, 1);
    assert_eq!(stats.unsynchronized_calls, 2);
    assert_eq!(stats.contended_calls, 1);
}

#[test]
fn ignore_listing_expires() {
    let config = GuardConfig {
        ignore_ttl_ms: Some(200),
        ..GuardConfig::with_timeouts(ms(20), ms(80))
    };
    let ctx = GuardContext::new(config)
        .with_detector(Arc::new(GraphDeadlockDetector::new(Arc::new(WaitRegistry::new()))));
    let (guard, _release) = AccessGuard::attach_claimed(MockSession::new(), "s1", ctx);

    thread::scope(|s| {
        s.spawn(|| {
            guard.flush().unwrap();
            guard.flush().unwrap();
            thread::sleep(ms(250));

            let started = Instant::now();
            guard.flush().unwrap();
            assert!(started.elapsed() >= ms(80));
        });
    });

    let stats = guard.stats();
    assert_eq!(stats.contended_calls, 2);
    assert_eq!(stats.timeouts, 2);
}

#[test]
fn pairwise_deadlock_exits_early() {
    let (ctx, registry) = context(ms(50), ms(10_000));
    let (guard, _release) = AccessGuard::attach_claimed(MockSession::new(), "s1", ctx);
    let owner = ThreadIdentity::current();

    let elapsed = thread::scope(|s| {
        let waiter = s.spawn(|| {
            let started = Instant::now();
            guard.flush().unwrap();
            started.elapsed()
        });
        // The owner is itself blocked on something the waiter holds.
        let waiter_id = ThreadIdentity::from_thread(waiter.thread());
        registry.record_wait(&owner, &waiter_id);
        waiter.join().unwrap()
    });
    registry.clear_wait(&owner);

    assert!(elapsed < ms(2_000), "waited {elapsed:?}");
    let stats = guard.stats();
    assert_eq!(stats.deadlocks, 1);
    assert_eq!(stats.timeouts, 0);
    assert!(registry.is_empty());
}

/// Two guards whose contexts share one detector, each claimed by its own
/// thread. Thread `a` owns the first guard and calls into the second at once;
/// thread `b` owns the second and calls into the first a little later.
///
/// Returns `(a_elapsed, b_elapsed)` for the cross calls.
fn cross_call(
    config: GuardConfig,
    a_releases_after_call: bool,
) -> (
    AccessGuard<MockSession>,
    AccessGuard<MockSession>,
    Duration,
    Duration,
) {
    let registry = Arc::new(WaitRegistry::new());
    let detector: Arc<dyn DeadlockDetector> = Arc::new(GraphDeadlockDetector::new(
        Arc::clone(&registry) as Arc<dyn ThreadIntrospection>,
    ));
    let (first, first_release) = AccessGuard::attach(
        MockSession::new(),
        "first",
        GuardContext::new(config.clone()).with_detector(Arc::clone(&detector)),
    );
    let (second, _second_release) = AccessGuard::attach(
        MockSession::new(),
        "second",
        GuardContext::new(config).with_detector(detector),
    );
    let claimed = Barrier::new(2);

    let (a_elapsed, b_elapsed) = thread::scope(|s| {
        let a = s.spawn(|| {
            first.flush().unwrap();
            claimed.wait();
            let started = Instant::now();
            second.flush().unwrap();
            let elapsed = started.elapsed();
            if a_releases_after_call {
                first_release.release();
            }
            elapsed
        });
        let b = s.spawn(|| {
            second.flush().unwrap();
            claimed.wait();
            thread::sleep(ms(50));
            let started = Instant::now();
            first.flush().unwrap();
            started.elapsed()
        });
        (a.join().unwrap(), b.join().unwrap())
    });
    assert!(registry.is_empty());
    (first, second, a_elapsed, b_elapsed)
}

#[test]
fn cross_guard_deadlock_is_detected_by_one_side() {
    let hard = ms(5_000);
    let (first, second, a_elapsed, b_elapsed) =
        cross_call(GuardConfig::with_timeouts(ms(100), hard), true);

    assert!(a_elapsed < ms(1_000), "detecting side waited {a_elapsed:?}");
    assert_eq!(second.stats().deadlocks, 1);
    assert_eq!(second.stats().timeouts, 0);

    // The other side's edge was gone by the time it looked, so it waits for
    // the release instead.
    assert!(b_elapsed < hard, "other side waited {b_elapsed:?}");
    assert_eq!(first.stats().deadlocks, 0);
    assert_eq!(first.stats().acquired_after_wait, 1);
}

#[test]
fn cross_guard_deadlock_without_release_times_out_on_the_other_side() {
    let hard = ms(400);
    let (first, second, a_elapsed, b_elapsed) =
        cross_call(GuardConfig::with_timeouts(ms(100), hard), false);

    assert!(a_elapsed < hard, "detecting side waited {a_elapsed:?}");
    assert_eq!(second.stats().deadlocks, 1);

    assert!(b_elapsed >= hard, "other side waited {b_elapsed:?}");
    assert_eq!(first.stats().deadlocks, 0);
    assert_eq!(first.stats().timeouts, 1);
}

#[test]
fn ignore_list_stays_bounded_under_thread_churn() {
    let config = GuardConfig {
        ignore_ttl_ms: Some(300),
        ..GuardConfig::with_timeouts(ms(10), ms(30))
    };
    let ctx = GuardContext::new(config)
        .with_detector(Arc::new(GraphDeadlockDetector::new(Arc::new(WaitRegistry::new()))));
    let (guard, _release) = AccessGuard::attach_claimed(MockSession::new(), "s1", ctx);

    let batch = || {
        thread::scope(|s| {
            for _ in 0..8 {
                // Timed-out callers run together, so the session may reject some.
                s.spawn(|| {
                    let _ = guard.flush();
                });
            }
        });
    };

    batch();
    assert_eq!(guard.ignore_cache().len(), 8);
    thread::sleep(ms(400));
    batch();

    assert_eq!(guard.ignore_cache().len(), 8);
    assert_eq!(guard.stats().timeouts, 16);
}

#[test]
fn missing_introspection_falls_back_to_timeout() {
    let hard = ms(200);
    let ctx = GuardContext::new(GuardConfig::with_timeouts(ms(40), hard))
        .with_detector(Arc::new(GraphDeadlockDetector::new(Arc::new(Unavailable))));
    let (guard, _release) = AccessGuard::attach_claimed(MockSession::new(), "s1", ctx);

    let elapsed = thread::scope(|s| {
        s.spawn(|| {
            let started = Instant::now();
            guard.flush().unwrap();
            started.elapsed()
        })
        .join()
        .unwrap()
    });

    assert!(elapsed >= hard);
    assert_eq!(guard.stats().deadlocks, 0);
    assert_eq!(guard.stats().timeouts, 1);
}

#[test]
fn resource_errors_pass_through() {
    let (ctx, _) = context(ms(50), ms(500));
    let (guard, _release) = AccessGuard::attach_claimed(MockSession::new(), "s1", ctx);

    assert!(matches!(
        guard.children(RecordId(7)),
        Err(SessionError::NotFound(RecordId(7)))
    ));
    guard.close().unwrap();
    assert!(matches!(guard.flush(), Err(SessionError::Closed)));
}

#[test]
fn factory_sessions_are_owned_by_opener_and_released_on_close() {
    let factory = GuardedSessionFactory::new(
        MockSessionFactory::new(),
        GuardConfig::with_timeouts(ms(50), ms(10_000)),
    );
    let session = factory.open_session().unwrap();
    assert!(session.owner().unwrap().is_current());

    session.persist(Record::new("foo")).unwrap();
    session.close().unwrap();
    assert!(session.owner().is_none());
    assert!(!session.is_open());
    assert_eq!(factory.inner().opened().len(), 1);
}

#[test]
fn factory_shares_ignore_list_between_sessions() {
    let factory = GuardedSessionFactory::new(
        MockSessionFactory::new(),
        GuardConfig::with_timeouts(ms(20), ms(100)),
    );
    let first = factory.open_session().unwrap();
    let second = factory.open_session().unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            first.flush().unwrap();
            let started = Instant::now();
            second.flush().unwrap();
            assert!(started.elapsed() < ms(20));
        });
    });

    assert_eq!(first.stats().timeouts, 1);
    assert_eq!(second.stats().contended_calls, 0);
    assert_eq!(second.stats().unsynchronized_calls, 1);
    assert_eq!(factory.context().ignore_cache().len(), 1);
}
