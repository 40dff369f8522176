// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared settings and collaborators handed to every guard.
//!
//! Guards created from the same context share one ignore cache and one
//! deadlock detector, so a thread that timed out on one session is also
//! let through on its siblings until its entry expires.

use std::sync::Arc;

use warden_config::GuardConfig;

use crate::deadlock::{DeadlockDetector, GraphDeadlockDetector, NoDeadlockDetection};
use crate::ignore::IgnoreCache;

#[derive(Clone)]
pub struct GuardContext {
    config: GuardConfig,
    ignored: Arc<IgnoreCache>,
    detector: Arc<dyn DeadlockDetector>,
}

impl GuardContext {
    /// Context with a fresh ignore cache and, unless disabled in `config`,
    /// the graph detector over the process-wide wait registry.
    pub fn new(config: GuardConfig) -> Self {
        let detector: Arc<dyn DeadlockDetector> = if config.deadlock_detection {
            Arc::new(GraphDeadlockDetector::global())
        } else {
            Arc::new(NoDeadlockDetection)
        };
        Self {
            ignored: Arc::new(IgnoreCache::new(config.ignore_ttl())),
            config,
            detector,
        }
    }

    pub fn with_detector(mut self, detector: Arc<dyn DeadlockDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn ignore_cache(&self) -> &Arc<IgnoreCache> {
        &self.ignored
    }

    pub fn detector(&self) -> &dyn DeadlockDetector {
        self.detector.as_ref()
    }
}

impl Default for GuardContext {
    fn default() -> Self {
        Self::new(GuardConfig::default())
    }
}

impl std::fmt::Debug for GuardContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardContext")
            .field("config", &self.config)
            .field("ignored", &self.ignored.len())
            .finish_non_exhaustive()
    }
}
