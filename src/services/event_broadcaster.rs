//! Event broadcaster for live board updates.
//!
//! Uses tokio::sync::broadcast to fan out board events to every connected
//! WebSocket client.

use tokio::sync::broadcast;

use crate::models::{BoardEvent, BoardEventMessage};

/// Default capacity for the broadcast channel.
const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Distributes board events to all subscribers.
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<BoardEventMessage>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<BoardEventMessage> {
        self.sender.subscribe()
    }

    /// Broadcast an event, stamped with the current time.
    /// Returns the number of receivers; 0 when nobody is listening.
    pub fn send(&self, event: BoardEvent) -> usize {
        self.sender.send(BoardEventMessage::new(event)).unwrap_or(0)
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
