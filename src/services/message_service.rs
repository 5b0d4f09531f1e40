use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::database::Database;
use crate::error::{ChatError, ChatResult};
use crate::events::{EventBus, SystemEvent};
use crate::models::Message;
use crate::services::UnreadLedger;

/// Live feed of one thread's messages. Each item is a full snapshot, oldest
/// message first.
pub type MessageFeed = Pin<Box<dyn Stream<Item = Vec<Message>> + Send>>;

/// Sending into an existing thread, the message feed, and read-state
/// reconciliation.
#[derive(Clone)]
pub struct MessageService {
    db: Database,
    ledger: UnreadLedger,
    event_bus: Arc<dyn EventBus>,
}

impl MessageService {
    pub fn new(db: Database, ledger: UnreadLedger, event_bus: Arc<dyn EventBus>) -> Self {
        Self {
            db,
            ledger,
            event_bus,
        }
    }

    /// Append a message to an existing thread and refresh the denormalized
    /// preview. Two separate writes by design: a reader may observe the new
    /// message before the preview catches up, or the other way around.
    ///
    /// The recipient's unread counter is not touched here; the published
    /// `MessageCreated` event drives the counter trigger after the fact.
    pub async fn send(
        &self,
        conversation_id: &str,
        sender_id: &str,
        body: &str,
    ) -> ChatResult<Message> {
        Message::validate_body(body).map_err(ChatError::Validation)?;

        let conversation = self
            .db
            .get_conversation_by_id(conversation_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("conversation {conversation_id}")))?;

        if !conversation.is_participant(sender_id) {
            return Err(ChatError::Validation(
                "sender is not a participant of this conversation".to_string(),
            ));
        }

        let message = Message::new(
            conversation.id.clone(),
            sender_id.to_string(),
            body.to_string(),
            self.db.next_timestamp(),
        );
        self.db.create_message(&message).await?;
        self.db
            .touch_conversation(&conversation.id, &message.body, &message.sent_at)
            .await?;

        tracing::info!(
            message_id = %message.id,
            conversation_id = %conversation.id,
            "message appended"
        );

        self.event_bus.publish(SystemEvent::MessageCreated {
            message_id: message.id.clone(),
            conversation_id: message.conversation_id.clone(),
            sender_id: message.sender_id.clone(),
            timestamp: message.sent_at.clone(),
        });

        Ok(message)
    }

    pub async fn list_messages(&self, conversation_id: &str) -> ChatResult<Vec<Message>> {
        self.db.list_messages(conversation_id).await
    }

    /// Mark every message the counterpart sent and `user_id` has not read yet
    /// as read, then clear the matching counters.
    ///
    /// The store offers no "unread for user" filter, so the whole thread is
    /// fetched and filtered here. Zero unread messages is a no-op, not an
    /// error. The counter zeroing and the global-total decrement (by the
    /// previous counter value, not the flip count) form one atomic step.
    pub async fn mark_read(&self, conversation_id: &str, user_id: &str) -> ChatResult<()> {
        let conversation = self
            .db
            .get_conversation_by_id(conversation_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("conversation {conversation_id}")))?;

        if !conversation.is_participant(user_id) {
            return Err(ChatError::Validation(
                "user is not a participant of this conversation".to_string(),
            ));
        }

        let messages = self.db.list_messages(&conversation.id).await?;
        let unread_ids: Vec<&str> = messages
            .iter()
            .filter(|m| m.sender_id != user_id && !m.is_read)
            .map(|m| m.id.as_str())
            .collect();

        if unread_ids.is_empty() {
            return Ok(());
        }

        let read_at = self.db.next_timestamp();
        let flipped = self.db.mark_messages_read(&unread_ids, &read_at).await?;
        let cleared = self.ledger.clear_on_read(&conversation.id, user_id).await?;

        tracing::info!(
            conversation_id = %conversation.id,
            user_id,
            flipped,
            cleared,
            "conversation marked read"
        );

        self.event_bus.publish(SystemEvent::ConversationRead {
            conversation_id: conversation.id,
            user_id: user_id.to_string(),
            cleared,
            timestamp: read_at,
        });

        Ok(())
    }

    /// Live message feed for one thread: an immediate snapshot, then a fresh
    /// snapshot after every event on the thread. After deletion the feed
    /// yields an empty snapshot.
    pub fn subscribe_messages(&self, conversation_id: &str) -> MessageFeed {
        let db = self.db.clone();
        let mut events = self.event_bus.subscribe();
        let conversation_id = conversation_id.to_string();
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            match db.list_messages(&conversation_id).await {
                Ok(snapshot) => {
                    if tx.send(snapshot).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(%conversation_id, error = %e, "message feed failed its initial snapshot")
                }
            }

            while let Some(item) = events.next().await {
                let relevant = match &item {
                    Ok(event) => event.conversation_id() == conversation_id,
                    // A lagged receiver may have missed relevant events.
                    Err(_) => true,
                };
                if !relevant {
                    continue;
                }
                match db.list_messages(&conversation_id).await {
                    Ok(snapshot) => {
                        if tx.send(snapshot).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(%conversation_id, error = %e, "message feed failed to refresh")
                    }
                }
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }
}
