//! Typed in-process event bus.
//!
//! The lifecycle orchestrator publishes rule-group events; the scheduler
//! subscribes and reconciles its job registry. The bus is a thin wrapper
//! over a broadcast channel so every subscriber sees every event; handlers
//! must be idempotent under repeated delivery.

use tokio::sync::broadcast;
use tracing::debug;

use crate::schema::{RuleGroup, Settings};

/// Lifecycle events consumed by the scheduler.
#[derive(Debug, Clone)]
pub enum RuleGroupEvent {
    Created {
        rule_group: RuleGroup,
    },
    Updated {
        rule_group: RuleGroup,
        old_rule_group: RuleGroup,
    },
    Deleted {
        rule_group: RuleGroup,
    },
    SettingsUpdated {
        settings: Settings,
        old_settings: Settings,
    },
}

impl RuleGroupEvent {
    /// Topic-style label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            RuleGroupEvent::Created { .. } => "rule-group.created",
            RuleGroupEvent::Updated { .. } => "rule-group.updated",
            RuleGroupEvent::Deleted { .. } => "rule-group.deleted",
            RuleGroupEvent::SettingsUpdated { .. } => "settings.updated",
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RuleGroupEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    ///
    /// An event with no subscribers is dropped (normal during startup and
    /// shutdown).
    pub fn publish(&self, event: RuleGroupEvent) {
        let kind = event.kind();
        match self.tx.send(event) {
            Ok(receivers) => debug!(kind, receivers, "event published"),
            Err(_) => debug!(kind, "event dropped, no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RuleGroupEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MediaType;

    fn group(id: i64) -> RuleGroup {
        RuleGroup {
            id,
            name: format!("group {id}"),
            library_id: 1,
            data_type: MediaType::Movies,
            is_active: true,
            cron_schedule: None,
            collection_id: None,
            rules: vec![],
        }
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.publish(RuleGroupEvent::Created { rule_group: group(1) });
    }

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(RuleGroupEvent::Created { rule_group: group(1) });
        bus.publish(RuleGroupEvent::Deleted { rule_group: group(1) });

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.kind(), "rule-group.created");
        assert_eq!(second.kind(), "rule-group.deleted");
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_event() {
        let bus = EventBus::default();
        let mut rx_a = bus.subscribe();
        let mut rx_b = bus.subscribe();

        bus.publish(RuleGroupEvent::Created { rule_group: group(2) });

        assert_eq!(rx_a.recv().await.unwrap().kind(), "rule-group.created");
        assert_eq!(rx_b.recv().await.unwrap().kind(), "rule-group.created");
    }
}
