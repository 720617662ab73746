// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fan-out of operator events over the presence registry.
//!
//! Targets are resolved from a snapshot of the registry and delivered with
//! `try_send` after every shard lock is released. A full or closed channel
//! counts as a failed delivery for that recipient only.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::event::OperatorEvent;
use crate::registry::PresenceRegistry;

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DeliveryReport {
    /// Number of connections the event was addressed to.
    pub fn targeted(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Broadcast scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Operator(String),
    Department(String),
    All,
}

impl PresenceRegistry {
    /// Delivers to every live connection of one operator.
    ///
    /// An offline operator is not an error: assignment may legitimately
    /// target someone who is not connected.
    pub fn to_operator(&self, operator_id: &str, event: OperatorEvent) -> DeliveryReport {
        let report = self.deliver(&Audience::Operator(operator_id.to_string()), event);
        if report.targeted() == 0 {
            debug!(operator_id, "operator not connected, event not delivered");
        }
        report
    }

    /// Delivers to every connection whose department matches.
    pub fn to_department(&self, department: &str, event: OperatorEvent) -> DeliveryReport {
        self.deliver(&Audience::Department(department.to_string()), event)
    }

    /// Delivers to every connection.
    pub fn to_all(&self, event: OperatorEvent) -> DeliveryReport {
        self.deliver(&Audience::All, event)
    }

    pub fn deliver(&self, audience: &Audience, event: OperatorEvent) -> DeliveryReport {
        let targets = self.resolve(audience);
        let kind = event.kind();
        let mut report = DeliveryReport::default();
        for (connection_id, tx) in targets {
            match tx.try_send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(%connection_id, event = kind, error = %e, "event delivery failed");
                }
            }
        }
        report
    }

    fn resolve(&self, audience: &Audience) -> Vec<(String, mpsc::Sender<OperatorEvent>)> {
        self.connections
            .iter()
            .filter(|entry| match audience {
                Audience::Operator(id) => entry.record.operator_id == *id,
                Audience::Department(dept) => entry.record.department == *dept,
                Audience::All => true,
            })
            .map(|entry| (entry.key().clone(), entry.tx.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::OperatorIdentity;
    use crate::event::NotificationLevel;
    use tracing_test::traced_test;

    fn identity(id: &str, dept: &str) -> OperatorIdentity {
        OperatorIdentity {
            id: id.into(),
            name: id.into(),
            department: dept.into(),
        }
    }

    fn notice(text: &str) -> OperatorEvent {
        OperatorEvent::SystemNotification {
            level: NotificationLevel::Info,
            message: text.into(),
            instance: None,
        }
    }

    fn drain(rx: &mut mpsc::Receiver<OperatorEvent>) -> Vec<OperatorEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[test]
    #[traced_test]
    fn one_failed_recipient_does_not_block_the_rest() {
        let registry = PresenceRegistry::new();
        let (tx_a, mut rx_a) = mpsc::channel(16);
        let (tx_b, rx_b) = mpsc::channel(16);
        let (tx_c, mut rx_c) = mpsc::channel(16);
        registry.register("c-a", identity("a", "sales"), tx_a);
        registry.register("c-b", identity("b", "sales"), tx_b);
        registry.register("c-c", identity("c", "sales"), tx_c);
        drain(&mut rx_a);
        drain(&mut rx_c);

        // b's connection is dead.
        drop(rx_b);

        let report = registry.to_department("sales", notice("queue moved"));
        assert_eq!(report, DeliveryReport { delivered: 2, failed: 1 });
        assert_eq!(drain(&mut rx_a).len(), 1);
        assert_eq!(drain(&mut rx_c).len(), 1);
        assert!(logs_contain("event delivery failed"));
    }

    #[test]
    fn full_channel_counts_as_failure() {
        let registry = PresenceRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        // The registration status event fills the only slot.
        registry.register("c-a", identity("a", "sales"), tx);
        let report = registry.to_operator("a", notice("hello"));
        assert_eq!(report, DeliveryReport { delivered: 0, failed: 1 });
    }

    #[test]
    fn offline_operator_is_not_an_error() {
        let registry = PresenceRegistry::new();
        let report = registry.to_operator("nobody", notice("hello"));
        assert_eq!(report.targeted(), 0);
    }

    #[test]
    fn department_broadcast_skips_other_departments() {
        let registry = PresenceRegistry::new();
        let (tx_a, mut rx_a) = mpsc::channel(16);
        let (tx_b, mut rx_b) = mpsc::channel(16);
        registry.register("c-a", identity("a", "sales"), tx_a);
        registry.register("c-b", identity("b", "billing"), tx_b);
        drain(&mut rx_a);
        drain(&mut rx_b);

        let report = registry.to_department("billing", notice("invoice run"));
        assert_eq!(report.delivered, 1);
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b).len(), 1);

        assert_eq!(registry.to_all(notice("all hands")).delivered, 2);
    }
}
