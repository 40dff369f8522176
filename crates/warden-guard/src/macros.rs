// SPDX-FileCopyrightText: 2026 Warden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Logs an [`AccessIncident`](warden_core::AccessIncident) at the level its
/// severity calls for, with the incident label as the `incident` field.
macro_rules! report_incident {
    ($incident:expr, $($fields:tt)+) => {{
        let incident: ::warden_core::AccessIncident = $incident;
        match incident.severity() {
            ::warden_core::Severity::Warn => {
                ::tracing::warn!(incident = %incident, $($fields)+)
            }
            ::warden_core::Severity::Error => {
                ::tracing::error!(incident = %incident, $($fields)+)
            }
        }
    }};
}
