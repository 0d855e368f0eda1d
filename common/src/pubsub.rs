//! In-process publish/subscribe bus.
//!
//! The terminal UI (out of scope for this crate family) and the agent
//! loop both need to observe session/message/log changes without being
//! wired together directly. Publishers call [`Bus::publish`]; subscribers
//! get a broadcast-style receiver via [`Bus::subscribe`]. Delivery is
//! best-effort: a subscriber that falls behind drops the oldest events
//! rather than blocking publishers, since observers are UI-class
//! consumers, not a durability mechanism.

use serde::Deserialize;
use serde::Serialize;
use tokio::sync::broadcast;

/// Coarse event topics a subscriber can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Session,
    Message,
    Log,
}

/// An envelope published on the bus. `kind` is `created` | `updated` | `deleted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub topic: Topic,
    pub kind: &'static str,
    /// Entity id (session id, message id, ...) the event concerns.
    pub subject_id: String,
    /// Opaque JSON payload, shape depends on `topic`.
    pub payload: serde_json::Value,
}

const DEFAULT_CAPACITY: usize = 1024;

/// The bus itself. Cheap to clone; clones share the same broadcast channel.
#[derive(Clone)]
pub struct Bus {
    sender: broadcast::Sender<Event>,
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Bus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. A publish with no subscribers is a no-op, not an
    /// error — the bus is an observability side channel, not a queue.
    pub fn publish(&self, event: Event) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
