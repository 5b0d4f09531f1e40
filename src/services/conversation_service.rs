use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::database::Database;
use crate::error::{ChatError, ChatResult};
use crate::events::{EventBus, SystemEvent};
use crate::listings::ListingDirectory;
use crate::models::{Conversation, Message};
use crate::services::UnreadLedger;

/// Live feed of one user's conversation list. Each item is a full snapshot,
/// ordered by latest activity.
pub type ConversationFeed = Pin<Box<dyn Stream<Item = Vec<Conversation>> + Send>>;

/// Thread resolution, the conversation list feed, and thread deletion.
#[derive(Clone)]
pub struct ConversationService {
    db: Database,
    listings: Arc<dyn ListingDirectory>,
    ledger: UnreadLedger,
    event_bus: Arc<dyn EventBus>,
    resolve_gate: Arc<ResolveGate>,
}

impl ConversationService {
    pub fn new(
        db: Database,
        listings: Arc<dyn ListingDirectory>,
        ledger: UnreadLedger,
        event_bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            db,
            listings,
            ledger,
            event_bus,
            resolve_gate: Arc::new(ResolveGate::new()),
        }
    }

    /// Find the thread for `(listing, participant pair)` or create it, and
    /// append `first_message_body` to it either way. Returns the thread id.
    ///
    /// Calls for the same key are serialized through an in-process gate, so
    /// the lookup-then-insert sequence cannot race with itself and produce a
    /// duplicate thread.
    pub async fn resolve_or_create(
        &self,
        participants: (&str, &str),
        listing_id: &str,
        first_message_body: &str,
        sender_id: &str,
    ) -> ChatResult<String> {
        let (a, b) = participants;
        if a == b {
            return Err(ChatError::Validation(
                "a conversation needs two distinct participants".to_string(),
            ));
        }
        if sender_id != a && sender_id != b {
            return Err(ChatError::Validation(
                "sender must be one of the participants".to_string(),
            ));
        }
        Message::validate_body(first_message_body).map_err(ChatError::Validation)?;

        let slot = self.resolve_gate.slot(listing_id, a, b);
        let _guard = slot.lock().await;

        let candidates = self.db.list_conversations_by_listing(listing_id).await?;
        let existing = candidates
            .into_iter()
            .find(|c| c.participant_set_matches(a, b));

        if let Some(conversation) = existing {
            self.append_and_count(&conversation, sender_id, first_message_body)
                .await?;
            tracing::debug!(
                conversation_id = %conversation.id,
                listing_id,
                "resolved existing conversation"
            );
            return Ok(conversation.id);
        }

        let counterpart = if sender_id == a { b } else { a };
        let (buyer_id, seller_id) = match self.listings.owner_of(listing_id).await? {
            Some(owner) if owner == a || owner == b => {
                let buyer = if owner == a { b } else { a };
                (buyer.to_string(), owner)
            }
            other => {
                // The original behavior: when the listing owner cannot be
                // resolved, the non-sender participant is assumed to be the
                // seller instead of failing the whole operation.
                tracing::warn!(
                    listing_id,
                    resolved_owner = ?other,
                    "listing owner unresolved; assuming the counterpart is the seller"
                );
                (sender_id.to_string(), counterpart.to_string())
            }
        };

        let now = self.db.next_timestamp();
        let conversation = Conversation::new(
            listing_id.to_string(),
            buyer_id,
            seller_id,
            now,
        );
        self.db.create_conversation(&conversation).await?;

        self.event_bus.publish(SystemEvent::ConversationCreated {
            conversation_id: conversation.id.clone(),
            listing_id: conversation.listing_id.clone(),
            buyer_id: conversation.buyer_id.clone(),
            seller_id: conversation.seller_id.clone(),
            timestamp: conversation.created_at.clone(),
        });

        self.append_and_count(&conversation, sender_id, first_message_body)
            .await?;

        tracing::info!(
            conversation_id = %conversation.id,
            listing_id,
            buyer_id = %conversation.buyer_id,
            seller_id = %conversation.seller_id,
            "conversation created"
        );

        Ok(conversation.id)
    }

    pub async fn get_conversation(&self, conversation_id: &str) -> ChatResult<Conversation> {
        self.db
            .get_conversation_by_id(conversation_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("conversation {conversation_id}")))
    }

    pub async fn list_conversations_for_user(
        &self,
        user_id: &str,
    ) -> ChatResult<Vec<Conversation>> {
        self.db.list_conversations_for_user(user_id).await
    }

    /// Live conversation-list feed for one user: an immediate snapshot, then
    /// a fresh snapshot after every event that touches one of their threads.
    pub fn subscribe_conversations(&self, user_id: &str) -> ConversationFeed {
        let db = self.db.clone();
        let mut events = self.event_bus.subscribe();
        let user_id = user_id.to_string();
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            match db.list_conversations_for_user(&user_id).await {
                Ok(snapshot) => {
                    if tx.send(snapshot).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(%user_id, error = %e, "conversation feed failed its initial snapshot")
                }
            }

            while let Some(item) = events.next().await {
                let relevant = match &item {
                    Ok(event) => event_touches_user(&db, event, &user_id).await,
                    // A lagged receiver may have missed relevant events.
                    Err(_) => true,
                };
                if !relevant {
                    continue;
                }
                match db.list_conversations_for_user(&user_id).await {
                    Ok(snapshot) => {
                        if tx.send(snapshot).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(%user_id, error = %e, "conversation feed failed to refresh")
                    }
                }
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }

    /// Remove a thread and its entire message log as one atomic batch.
    pub async fn delete_conversation(&self, conversation_id: &str) -> ChatResult<()> {
        let conversation = self.get_conversation(conversation_id).await?;

        self.db.delete_conversation_graph(&conversation.id).await?;

        self.event_bus.publish(SystemEvent::ConversationDeleted {
            conversation_id: conversation.id,
            timestamp: self.db.next_timestamp(),
        });

        Ok(())
    }

    /// Append a message, touch the denormalized preview, and count the unread
    /// synchronously. Used by the resolver, where the caller already knows
    /// both participants; ordinary sends leave the counting to the trigger.
    async fn append_and_count(
        &self,
        conversation: &Conversation,
        sender_id: &str,
        body: &str,
    ) -> ChatResult<Message> {
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

        if let Some(recipient) = conversation.counterpart_of(sender_id) {
            self.ledger
                .increment_on_create(&conversation.id, recipient, &message.id)
                .await?;
        }

        // The counter trigger will see this event too; the dedup mark written
        // by the increment above turns its replay into a no-op.
        self.event_bus.publish(SystemEvent::MessageCreated {
            message_id: message.id.clone(),
            conversation_id: message.conversation_id.clone(),
            sender_id: message.sender_id.clone(),
            timestamp: message.sent_at.clone(),
        });

        Ok(message)
    }
}

/// Whether an event concerns one of `user_id`'s conversations. Deletions
/// always trigger a refresh: the thread is gone, so membership can no longer
/// be checked, and a spurious snapshot is harmless.
async fn event_touches_user(db: &Database, event: &SystemEvent, user_id: &str) -> bool {
    match event {
        SystemEvent::ConversationCreated {
            buyer_id,
            seller_id,
            ..
        } => buyer_id == user_id || seller_id == user_id,
        SystemEvent::ConversationDeleted { .. } => true,
        other => match db.get_conversation_by_id(other.conversation_id()).await {
            Ok(Some(conversation)) => conversation.is_participant(user_id),
            Ok(None) => true,
            Err(e) => {
                tracing::debug!(error = %e, "membership check failed; refreshing feed anyway");
                true
            }
        },
    }
}

/// One async mutex per `(listing, sorted pair)` key. Serializes resolve
/// calls so find-or-create cannot duplicate a thread.
struct ResolveGate {
    slots: StdMutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ResolveGate {
    fn new() -> Self {
        Self {
            slots: StdMutex::new(HashMap::new()),
        }
    }

    fn slot(&self, listing_id: &str, a: &str, b: &str) -> Arc<tokio::sync::Mutex<()>> {
        let key = pair_key(listing_id, a, b);
        let mut slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.entry(key).or_default().clone()
    }
}

fn pair_key(listing_id: &str, a: &str, b: &str) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{listing_id}:{low}:{high}")
}

#[cfg(test)]
mod tests {
    use super::pair_key;

    #[test]
    fn pair_key_is_order_insensitive() {
        assert_eq!(pair_key("l1", "ana", "bruno"), pair_key("l1", "bruno", "ana"));
    }

    #[test]
    fn pair_key_separates_listings() {
        assert_ne!(pair_key("l1", "ana", "bruno"), pair_key("l2", "ana", "bruno"));
    }
}
