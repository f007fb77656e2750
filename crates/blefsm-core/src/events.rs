//! Lifecycle event broadcasting.
//!
//! Sessions and the scan controller publish what they do on an
//! [`EventDispatcher`]. Subscribers receive every event sent after they
//! subscribed; with no subscribers events are dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use blefsm_types::{State, Trigger};

/// Events emitted by sessions and scanning.
///
/// All events are serializable for logging, persistence, and IPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SessionEvent {
    /// A peripheral was discovered or its advertisement updated.
    DeviceDiscovered {
        address: String,
        name: Option<String>,
        rssi: Option<i16>,
    },
    /// A session moved between states.
    StateChanged {
        session: u64,
        trigger: Trigger,
        from: State,
        to: State,
    },
    /// A guard failed and the session stayed put.
    GuardFailed {
        session: u64,
        trigger: Trigger,
        state: State,
        reason: String,
    },
}

/// Sender for session events.
pub type EventSender = broadcast::Sender<SessionEvent>;

/// Receiver for session events.
pub type EventReceiver = broadcast::Receiver<SessionEvent>;

/// Fan-out of [`SessionEvent`]s to any number of receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a dispatcher buffering up to `capacity` events per receiver.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: SessionEvent) {
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let events = EventDispatcher::default();
        let mut rx = events.subscribe();

        events.send(SessionEvent::StateChanged {
            session: 1,
            trigger: Trigger::SetTarget,
            from: State::Init,
            to: State::TargetSet,
        });

        match rx.recv().await.unwrap() {
            SessionEvent::StateChanged { to, .. } => assert_eq!(to, State::TargetSet),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_send_without_receivers_is_silent() {
        let events = EventDispatcher::new(4);
        events.send(SessionEvent::DeviceDiscovered {
            address: "addr1".to_string(),
            name: None,
            rssi: None,
        });
        assert_eq!(events.receiver_count(), 0);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = SessionEvent::GuardFailed {
            session: 7,
            trigger: Trigger::Connect,
            state: State::TargetSet,
            reason: "connect timed out after 5s".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "guard_failed");
        assert_eq!(json["trigger"], "connect");
        assert_eq!(json["state"], "TargetSet");
    }
}
