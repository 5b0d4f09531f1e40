use sqlx::Row;

use crate::database::Database;
use crate::error::ChatResult;
use crate::models::Message;

impl Database {
    pub async fn create_message(&self, message: &Message) -> ChatResult<()> {
        sqlx::query(
            "INSERT INTO messages (id, conversation_id, sender_id, body, sent_at, is_read, read_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.conversation_id)
        .bind(&message.sender_id)
        .bind(&message.body)
        .bind(&message.sent_at)
        .bind(message.is_read)
        .bind(&message.read_at)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Full message log of a conversation, oldest first.
    pub async fn list_messages(&self, conversation_id: &str) -> ChatResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, conversation_id, sender_id, body, sent_at, is_read, read_at
             FROM messages
             WHERE conversation_id = ?
             ORDER BY sent_at ASC",
        )
        .bind(conversation_id)
        .fetch_all(self.pool())
        .await?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            messages.push(Message {
                id: row.try_get("id")?,
                conversation_id: row.try_get("conversation_id")?,
                sender_id: row.try_get("sender_id")?,
                body: row.try_get("body")?,
                sent_at: row.try_get("sent_at")?,
                is_read: row.try_get("is_read")?,
                read_at: row.try_get("read_at")?,
            });
        }

        Ok(messages)
    }

    /// Flip a batch of messages to read in a single statement.
    pub async fn mark_messages_read(&self, ids: &[&str], read_at: &str) -> ChatResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "UPDATE messages SET is_read = 1, read_at = ? WHERE id IN ({placeholders})"
        );

        let mut query = sqlx::query(&sql).bind(read_at);
        for id in ids {
            query = query.bind(*id);
        }

        let result = query.execute(self.pool()).await?;
        Ok(result.rows_affected())
    }
}
