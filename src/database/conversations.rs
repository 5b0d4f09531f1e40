use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::database::Database;
use crate::error::ChatResult;
use crate::models::Conversation;

impl Database {
    /// Insert a conversation together with its two zeroed unread rows, as one
    /// transaction so a thread can never exist with a missing counter entry.
    pub async fn create_conversation(&self, conversation: &Conversation) -> ChatResult<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "INSERT INTO conversations (id, listing_id, buyer_id, seller_id, last_message_preview, last_message_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&conversation.id)
        .bind(&conversation.listing_id)
        .bind(&conversation.buyer_id)
        .bind(&conversation.seller_id)
        .bind(&conversation.last_message_preview)
        .bind(&conversation.last_message_at)
        .bind(&conversation.created_at)
        .bind(&conversation.updated_at)
        .execute(&mut *tx)
        .await?;

        for participant in conversation.participants() {
            sqlx::query(
                "INSERT INTO conversation_unread (conversation_id, user_id, unread_count)
                 VALUES (?, ?, 0)",
            )
            .bind(&conversation.id)
            .bind(participant)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            conversation_id = %conversation.id,
            listing_id = %conversation.listing_id,
            "conversation record created"
        );

        Ok(())
    }

    pub async fn get_conversation_by_id(&self, id: &str) -> ChatResult<Option<Conversation>> {
        let row = sqlx::query(
            "SELECT id, listing_id, buyer_id, seller_id, last_message_preview, last_message_at, created_at, updated_at
             FROM conversations
             WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => {
                let mut conversation = row_to_conversation(&row)?;
                conversation.unread_counts = self.load_unread_counts(&conversation.id).await?;
                Ok(Some(conversation))
            }
            None => Ok(None),
        }
    }

    /// All conversations attached to a listing. The store only supports this
    /// equality lookup; participant-pair matching is done by the caller.
    pub async fn list_conversations_by_listing(
        &self,
        listing_id: &str,
    ) -> ChatResult<Vec<Conversation>> {
        let rows = sqlx::query(
            "SELECT id, listing_id, buyer_id, seller_id, last_message_preview, last_message_at, created_at, updated_at
             FROM conversations
             WHERE listing_id = ?",
        )
        .bind(listing_id)
        .fetch_all(self.pool())
        .await?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in rows {
            let mut conversation = row_to_conversation(&row)?;
            conversation.unread_counts = self.load_unread_counts(&conversation.id).await?;
            conversations.push(conversation);
        }

        Ok(conversations)
    }

    /// Conversation list for one user, most recently active first. Threads
    /// that never received a message (no `last_message_at`) sort last.
    pub async fn list_conversations_for_user(
        &self,
        user_id: &str,
    ) -> ChatResult<Vec<Conversation>> {
        let rows = sqlx::query(
            "SELECT id, listing_id, buyer_id, seller_id, last_message_preview, last_message_at, created_at, updated_at
             FROM conversations
             WHERE buyer_id = ? OR seller_id = ?
             ORDER BY last_message_at DESC, created_at DESC",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in rows {
            let mut conversation = row_to_conversation(&row)?;
            conversation.unread_counts = self.load_unread_counts(&conversation.id).await?;
            conversations.push(conversation);
        }

        Ok(conversations)
    }

    /// Refresh the denormalized last-message columns. Deliberately a separate
    /// write from the message insert; last writer wins under concurrency.
    pub async fn touch_conversation(
        &self,
        conversation_id: &str,
        preview: &str,
        last_message_at: &str,
    ) -> ChatResult<()> {
        sqlx::query(
            "UPDATE conversations
             SET last_message_preview = ?, last_message_at = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(preview)
        .bind(last_message_at)
        .bind(last_message_at)
        .bind(conversation_id)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Remove a conversation and everything hanging off it as one atomic
    /// batch: dedup marks, messages, unread rows, the conversation row, and
    /// the participants' shares of the global unread totals. A failed commit
    /// leaves every record set unchanged.
    pub async fn delete_conversation_graph(&self, conversation_id: &str) -> ChatResult<()> {
        let mut tx = self.pool().begin().await?;

        let unread_rows = sqlx::query(
            "SELECT user_id, unread_count FROM conversation_unread WHERE conversation_id = ?",
        )
        .bind(conversation_id)
        .fetch_all(&mut *tx)
        .await?;

        for row in &unread_rows {
            let user_id: String = row.try_get("user_id")?;
            let unread_count: i64 = row.try_get("unread_count")?;
            if unread_count > 0 {
                sqlx::query(
                    "UPDATE user_unread_totals SET total_unread = MAX(total_unread - ?, 0)
                     WHERE user_id = ?",
                )
                .bind(unread_count)
                .bind(&user_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        sqlx::query("DELETE FROM counted_messages WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM messages WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM conversation_unread WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(conversation_id, "conversation and message log deleted");

        Ok(())
    }
}

fn row_to_conversation(row: &SqliteRow) -> Result<Conversation, sqlx::Error> {
    Ok(Conversation {
        id: row.try_get("id")?,
        listing_id: row.try_get("listing_id")?,
        buyer_id: row.try_get("buyer_id")?,
        seller_id: row.try_get("seller_id")?,
        last_message_preview: row.try_get("last_message_preview")?,
        last_message_at: row.try_get("last_message_at")?,
        unread_counts: Default::default(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
