use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

use crate::database::Database;
use crate::error::ChatResult;
use crate::events::{EventBus, EventStream, SystemEvent};
use crate::services::UnreadLedger;

/// Spawn the counter trigger: a task consuming `MessageCreated` events and
/// applying the recipient's unread increment after the fact.
///
/// The subscription is taken before the task is spawned, so no event
/// published after this call returns can be missed. Delivery is
/// at-least-once; counting is exactly-once because the ledger records a dedup
/// mark per message id. The task runs until the event bus is dropped.
pub fn spawn_unread_counter_listener(
    event_bus: Arc<dyn EventBus>,
    db: Database,
    ledger: UnreadLedger,
) -> JoinHandle<()> {
    let events = event_bus.subscribe();
    tokio::spawn(listener_loop(events, event_bus, db, ledger))
}

async fn listener_loop(
    mut events: EventStream,
    event_bus: Arc<dyn EventBus>,
    db: Database,
    ledger: UnreadLedger,
) {
    tracing::info!("unread counter listener started");

    while let Some(item) = events.next().await {
        match item {
            Ok(SystemEvent::MessageCreated {
                message_id,
                conversation_id,
                sender_id,
                ..
            }) => {
                if let Err(e) = on_message_created(
                    &db,
                    &ledger,
                    event_bus.as_ref(),
                    &conversation_id,
                    &message_id,
                    &sender_id,
                )
                .await
                {
                    tracing::error!(
                        error = %e,
                        %message_id,
                        %conversation_id,
                        "failed to apply unread increment"
                    );
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("unread counter listener lagged: {}", e),
        }
    }

    tracing::info!("unread counter listener stopped");
}

/// Apply one `MessageCreated` event: derive the recipient from the
/// conversation's participants and count the message against them.
///
/// A conversation deleted before its events drained is skipped; so is a
/// message already counted (replayed delivery, or the resolver's synchronous
/// first-message increment).
pub async fn on_message_created(
    db: &Database,
    ledger: &UnreadLedger,
    event_bus: &dyn EventBus,
    conversation_id: &str,
    message_id: &str,
    sender_id: &str,
) -> ChatResult<()> {
    let Some(conversation) = db.get_conversation_by_id(conversation_id).await? else {
        tracing::debug!(
            conversation_id,
            message_id,
            "conversation gone before its unread increment was applied"
        );
        return Ok(());
    };

    let Some(recipient) = conversation.counterpart_of(sender_id) else {
        tracing::warn!(
            conversation_id,
            sender_id,
            "message sender is not a participant; skipping increment"
        );
        return Ok(());
    };

    let applied = ledger
        .increment_on_create(conversation_id, recipient, message_id)
        .await?;

    if applied {
        event_bus.publish(SystemEvent::UnreadIncremented {
            conversation_id: conversation_id.to_string(),
            recipient_id: recipient.to_string(),
            timestamp: db.next_timestamp(),
        });
    }

    Ok(())
}
