// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue-update fan-out shared by the assignment engine, router, and reaper.

use switchboard_core::Session;
use switchboard_presence::{DeliveryReport, OperatorEvent, PresenceRegistry, QueueChange};

/// Announces a session change to its department, or to everyone when the
/// session has no department yet.
pub fn announce(presence: &PresenceRegistry, change: QueueChange, session: &Session) -> DeliveryReport {
    let event = OperatorEvent::queue_update(change, session);
    match session.department.as_deref() {
        Some(dept) => presence.to_department(dept, event),
        None => presence.to_all(event),
    }
}
