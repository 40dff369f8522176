// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Construction hook: wraps every session a factory opens in an
//! [`AccessGuard`].

use tracing::trace;
use warden_config::GuardConfig;
use warden_core::{Session, SessionError, SessionFactory};

use crate::context::GuardContext;
use crate::guard::AccessGuard;

/// Session factory whose sessions are guarded.
///
/// The opening thread owns each new session, and closing the session
/// releases that ownership through the session's end listener. Sessions
/// from one factory share its ignore cache and deadlock detector.
#[derive(Debug)]
pub struct GuardedSessionFactory<F> {
    inner: F,
    context: GuardContext,
}

impl<F: SessionFactory> GuardedSessionFactory<F> {
    pub fn new(inner: F, config: GuardConfig) -> Self {
        Self::with_context(inner, GuardContext::new(config))
    }

    pub fn with_context(inner: F, context: GuardContext) -> Self {
        Self { inner, context }
    }

    pub fn context(&self) -> &GuardContext {
        &self.context
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

impl<F: SessionFactory> SessionFactory for GuardedSessionFactory<F> {
    type Session = AccessGuard<F::Session>;

    fn open_session(&self) -> Result<Self::Session, SessionError> {
        let session = self.inner.open_session()?;
        let id = session.id();
        trace!(session = %id, "opening guarded session");

        let (guard, release) =
            AccessGuard::attach_claimed(session, id.to_string(), self.context.clone());
        guard
            .resource_unguarded()
            .add_end_listener(release.into_listener());
        Ok(guard)
    }
}
