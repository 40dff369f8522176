// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incidents the access guard reports when enforcement degrades.
//!
//! None of these is ever returned as an error: the guard always lets the
//! call proceed. They label log lines and drive the guard statistics.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Log level an incident is reported at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warn,
    Error,
}

/// Degraded-enforcement incidents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccessIncident {
    /// An ignore-listed thread called in without the lock.
    UnsynchronizedAccess,
    /// The hard wait budget ran out; the call proceeds without the lock.
    AcquisitionTimeout,
    /// A cycle involving both waiter and owner ended the wait early.
    DeadlockDetected,
    /// A cycle exists elsewhere in the process; the wait continues.
    UnrelatedDeadlockObserved,
}

impl AccessIncident {
    /// Level the incident is logged at.
    pub fn severity(self) -> Severity {
        match self {
            AccessIncident::UnsynchronizedAccess => Severity::Warn,
            AccessIncident::AcquisitionTimeout
            | AccessIncident::DeadlockDetected
            | AccessIncident::UnrelatedDeadlockObserved => Severity::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn incident_labels_round_trip() {
        let all = [
            AccessIncident::UnsynchronizedAccess,
            AccessIncident::AcquisitionTimeout,
            AccessIncident::DeadlockDetected,
            AccessIncident::UnrelatedDeadlockObserved,
        ];
        for incident in all {
            let label = incident.to_string();
            assert_eq!(AccessIncident::from_str(&label).unwrap(), incident);
        }
        assert_eq!(
            AccessIncident::AcquisitionTimeout.to_string(),
            "acquisition_timeout"
        );
    }

    #[test]
    fn only_ignore_listed_access_is_a_warning() {
        assert_eq!(AccessIncident::UnsynchronizedAccess.severity(), Severity::Warn);
        assert_eq!(AccessIncident::DeadlockDetected.severity(), Severity::Error);
        assert_eq!(
            AccessIncident::UnrelatedDeadlockObserved.severity(),
            Severity::Error
        );
    }
}
