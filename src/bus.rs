use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub const DEFAULT_BUS_CAPACITY: usize = 64;

/// Session lifecycle event propagated across components and, via the
/// storage watcher, across processes sharing the same storage root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionSyncEvent {
    Created { session_id: String },
    Updated { session_id: String },
    Cleared,
    Deleted { session_id: String },
}

impl SessionSyncEvent {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Updated { .. } => "updated",
            Self::Cleared => "cleared",
            Self::Deleted { .. } => "deleted",
        }
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Created { session_id }
            | Self::Updated { session_id }
            | Self::Deleted { session_id } => Some(session_id),
            Self::Cleared => None,
        }
    }
}

/// Process-wide publish/subscribe channel for session lifecycle events.
///
/// Delivery order across subscribers is unspecified; events from a
/// single publisher arrive in publish order. Subscribers must be
/// idempotent per session id: the same id delivered twice is a no-op by
/// contract on the subscriber side.
#[derive(Debug, Clone)]
pub struct SyncEventBus {
    tx: broadcast::Sender<SessionSyncEvent>,
}

impl Default for SyncEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl SyncEventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishing with no live subscribers is a no-op, not an error.
    pub fn publish(&self, event: SessionSyncEvent) {
        let _ = self.tx.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionSyncEvent> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::{SessionSyncEvent, SyncEventBus};

    #[test]
    fn publish_without_subscribers_is_a_noop() {
        let bus = SyncEventBus::default();
        bus.publish(SessionSyncEvent::Cleared);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn event_wire_schema_is_kind_tagged() {
        let event = SessionSyncEvent::Created {
            session_id: "session-1".to_string(),
        };
        let value = serde_json::to_value(&event).expect("serialize event");

        assert_eq!(value["type"], "created");
        assert_eq!(value["session_id"], "session-1");

        let cleared = serde_json::to_value(SessionSyncEvent::Cleared).expect("serialize cleared");
        assert_eq!(cleared["type"], "cleared");
    }

    #[tokio::test]
    async fn events_from_one_publisher_arrive_in_publish_order() {
        let bus = SyncEventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(SessionSyncEvent::Created {
            session_id: "session-1".to_string(),
        });
        bus.publish(SessionSyncEvent::Updated {
            session_id: "session-1".to_string(),
        });
        bus.publish(SessionSyncEvent::Cleared);

        assert_eq!(rx.recv().await.expect("created").kind(), "created");
        assert_eq!(rx.recv().await.expect("updated").kind(), "updated");
        assert_eq!(rx.recv().await.expect("cleared").kind(), "cleared");
    }

    #[tokio::test]
    async fn every_subscriber_observes_every_event() {
        let bus = SyncEventBus::default();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(SessionSyncEvent::Deleted {
            session_id: "session-9".to_string(),
        });

        let a = first.recv().await.expect("first subscriber event");
        let b = second.recv().await.expect("second subscriber event");
        assert_eq!(a, b);
        assert_eq!(a.session_id(), Some("session-9"));
    }
}
