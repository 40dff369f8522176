// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability traits for guarded resources.

pub mod session;

pub use session::{EndListener, Session, SessionFactory};
