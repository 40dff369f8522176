// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time-bounded set of threads exempt from ownership enforcement.
//!
//! A thread lands here after its wait for a session ran out and it was let
//! through without the lock. Further waits by that thread would only repeat
//! the same stall, so its calls bypass enforcement until the entry expires.
//! Expiry is evaluated on lookup; there is no sweeper thread. Thread ids
//! are never reused, so entries of threads that exited are swept out
//! whenever a new entry is added.

use std::thread::ThreadId;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use warden_core::ThreadIdentity;

#[derive(Debug, Clone)]
pub struct IgnoreEntry {
    pub thread: ThreadIdentity,
    pub expires_at: Instant,
}

impl IgnoreEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Concurrent map of ignore-listed threads with a fixed time-to-live.
#[derive(Debug)]
pub struct IgnoreCache {
    entries: DashMap<ThreadId, IgnoreEntry>,
    ttl: Duration,
}

impl IgnoreCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Ignore-lists `thread` for one TTL from now, replacing any older entry.
    /// Expired entries of other threads are dropped first.
    pub fn insert(&self, thread: &ThreadIdentity) -> Instant {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));
        let expires_at = now + self.ttl;
        self.entries.insert(
            thread.id(),
            IgnoreEntry {
                thread: thread.clone(),
                expires_at,
            },
        );
        expires_at
    }

    /// Whether `thread` has a non-expired entry. Drops the entry if expired.
    pub fn is_active(&self, thread: &ThreadIdentity) -> bool {
        let now = Instant::now();
        // Read and release the shard before any removal.
        let live = match self.entries.get(&thread.id()) {
            Some(entry) => entry.is_live(now),
            None => return false,
        };
        if !live {
            self.entries
                .remove_if(&thread.id(), |_, entry| !entry.is_live(now));
        }
        live
    }

    /// Removes `thread` regardless of expiry.
    pub fn evict(&self, thread: &ThreadIdentity) -> bool {
        self.entries.remove(&thread.id()).is_some()
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, expired ones included until they are purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn spawned_identity() -> ThreadIdentity {
        thread::spawn(ThreadIdentity::current).join().unwrap()
    }

    #[test]
    fn unknown_thread_is_not_active() {
        let cache = IgnoreCache::new(Duration::from_secs(60));
        assert!(!cache.is_active(&ThreadIdentity::current()));
        assert!(cache.is_empty());
    }

    #[test]
    fn inserted_thread_is_active_until_ttl() {
        let cache = IgnoreCache::new(Duration::from_millis(40));
        let me = ThreadIdentity::current();
        cache.insert(&me);
        assert!(cache.is_active(&me));
        assert!(!cache.is_active(&spawned_identity()));

        thread::sleep(Duration::from_millis(60));
        assert!(!cache.is_active(&me));
        assert!(cache.is_empty(), "expired entry should be dropped on lookup");
    }

    #[test]
    fn reinsert_extends_expiry() {
        let cache = IgnoreCache::new(Duration::from_millis(50));
        let me = ThreadIdentity::current();
        let first = cache.insert(&me);
        thread::sleep(Duration::from_millis(10));
        let second = cache.insert(&me);
        assert!(second > first);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn evict_removes_live_entry() {
        let cache = IgnoreCache::new(Duration::from_secs(60));
        let me = ThreadIdentity::current();
        cache.insert(&me);
        assert!(cache.evict(&me));
        assert!(!cache.is_active(&me));
        assert!(!cache.evict(&me));
    }

    #[test]
    fn purge_drops_only_expired() {
        let cache = IgnoreCache::new(Duration::from_millis(100));
        let old = spawned_identity();
        cache.insert(&old);
        thread::sleep(Duration::from_millis(130));
        let me = ThreadIdentity::current();
        // Lookup on the expired entry would remove it too; purge first.
        assert_eq!(cache.purge_expired(), 1);
        cache.insert(&me);

        assert_eq!(cache.purge_expired(), 0);
        assert!(cache.is_active(&me));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn insert_sweeps_entries_of_exited_threads() {
        let cache = IgnoreCache::new(Duration::from_millis(200));
        for _ in 0..20 {
            cache.insert(&spawned_identity());
        }
        assert_eq!(cache.len(), 20);

        thread::sleep(Duration::from_millis(300));
        for _ in 0..20 {
            cache.insert(&spawned_identity());
        }
        assert_eq!(cache.len(), 20);
    }
}
