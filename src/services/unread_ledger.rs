use crate::database::Database;
use crate::error::ChatResult;

/// Keeper of the unread counters: the per-conversation entry and the per-user
/// global total always move inside one transaction, so the two views of the
/// same fact cannot drift.
#[derive(Clone)]
pub struct UnreadLedger {
    db: Database,
}

impl UnreadLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Count a freshly created message against its recipient. Idempotent per
    /// message id: a replayed trigger delivery returns false and changes
    /// nothing.
    pub async fn increment_on_create(
        &self,
        conversation_id: &str,
        recipient_id: &str,
        message_id: &str,
    ) -> ChatResult<bool> {
        let counted_at = self.db.next_timestamp();
        let applied = self
            .db
            .apply_unread_increment(conversation_id, recipient_id, message_id, &counted_at)
            .await?;

        if applied {
            tracing::debug!(
                conversation_id,
                recipient_id,
                message_id,
                "unread counter incremented"
            );
        } else {
            tracing::debug!(
                conversation_id,
                message_id,
                "unread increment skipped (duplicate or stale)"
            );
        }

        Ok(applied)
    }

    /// Zero a participant's counter for one conversation and subtract the
    /// cleared amount from their global total. Returns the cleared amount.
    pub async fn clear_on_read(&self, conversation_id: &str, user_id: &str) -> ChatResult<i64> {
        let cleared = self.db.clear_unread_on_read(conversation_id, user_id).await?;

        if cleared > 0 {
            tracing::debug!(conversation_id, user_id, cleared, "unread counter cleared");
        }

        Ok(cleared)
    }

    pub async fn conversation_unread(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> ChatResult<i64> {
        self.db.unread_count(conversation_id, user_id).await
    }

    pub async fn total_unread(&self, user_id: &str) -> ChatResult<i64> {
        self.db.total_unread(user_id).await
    }
}
