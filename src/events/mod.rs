use std::pin::Pin;

use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

/// Events emitted by the messaging core.
///
/// `MessageCreated` doubles as the contract with the unread-counter trigger:
/// delivery is at-least-once, and consumers must tolerate replays.
#[derive(Debug, Clone)]
pub enum SystemEvent {
    ConversationCreated {
        conversation_id: String,
        listing_id: String,
        buyer_id: String,
        seller_id: String,
        timestamp: String, // ISO 8601
    },
    MessageCreated {
        message_id: String,
        conversation_id: String,
        sender_id: String,
        timestamp: String, // ISO 8601
    },
    UnreadIncremented {
        conversation_id: String,
        recipient_id: String,
        timestamp: String, // ISO 8601
    },
    ConversationRead {
        conversation_id: String,
        user_id: String,
        cleared: i64,
        timestamp: String, // ISO 8601
    },
    ConversationDeleted {
        conversation_id: String,
        timestamp: String, // ISO 8601
    },
}

impl SystemEvent {
    pub fn conversation_id(&self) -> &str {
        match self {
            SystemEvent::ConversationCreated {
                conversation_id, ..
            }
            | SystemEvent::MessageCreated {
                conversation_id, ..
            }
            | SystemEvent::UnreadIncremented {
                conversation_id, ..
            }
            | SystemEvent::ConversationRead {
                conversation_id, ..
            }
            | SystemEvent::ConversationDeleted {
                conversation_id, ..
            } => conversation_id,
        }
    }
}

pub type EventStream =
    Pin<Box<dyn Stream<Item = Result<SystemEvent, BroadcastStreamRecvError>> + Send>>;

/// Event bus for publishing and subscribing to system events.
pub trait EventBus: Send + Sync {
    /// Publish an event to all current subscribers. Fire-and-forget: a bus
    /// with no listeners drops the event silently.
    fn publish(&self, event: SystemEvent);

    /// Subscribe to events published after this call.
    fn subscribe(&self) -> EventStream;
}

/// In-process implementation of [`EventBus`] over a tokio broadcast channel.
#[derive(Clone)]
pub struct LocalEventBus {
    tx: broadcast::Sender<SystemEvent>,
}

impl LocalEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EventBus for LocalEventBus {
    fn publish(&self, event: SystemEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::debug!("no active subscribers for event: {}", e);
        }
    }

    fn subscribe(&self) -> EventStream {
        let rx = self.tx.subscribe();
        Box::pin(BroadcastStream::new(rx))
    }
}

impl Default for LocalEventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
