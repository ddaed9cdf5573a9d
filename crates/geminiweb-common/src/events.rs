use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Lifecycle and rotation notifications published by a session.
///
/// Rotation ticks never surface errors to generation callers; subscribers
/// of the bus are the only place a failed tick becomes observable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionEvent {
    Ready,
    CookieRotated,
    RotationSkipped { reason: String },
    RotationFailed { error: String },
    Failed { error: String },
    Closed,
    #[serde(other)]
    Unknown,
}

pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: SessionEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
