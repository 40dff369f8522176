// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Warden integration tests.
//!
//! Provides an in-memory session that behaves like an ORM session which is
//! not safe for concurrent use: it fails fast when two threads are inside it
//! at the same time.
//!
//! # Components
//!
//! - [`MockSession`] - In-memory session with concurrent-entry detection
//! - [`MockSessionFactory`] - Factory that opens and remembers mock sessions

pub mod mock_session;

pub use mock_session::{MockSession, MockSessionFactory, SessionCall};
