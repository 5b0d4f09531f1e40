use std::collections::HashMap;

use sqlx::Row;

use crate::database::Database;
use crate::error::ChatResult;

impl Database {
    pub(crate) async fn load_unread_counts(
        &self,
        conversation_id: &str,
    ) -> ChatResult<HashMap<String, i64>> {
        let rows = sqlx::query(
            "SELECT user_id, unread_count FROM conversation_unread WHERE conversation_id = ?",
        )
        .bind(conversation_id)
        .fetch_all(self.pool())
        .await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            counts.insert(row.try_get("user_id")?, row.try_get("unread_count")?);
        }

        Ok(counts)
    }

    pub async fn unread_count(&self, conversation_id: &str, user_id: &str) -> ChatResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(
                 (SELECT unread_count FROM conversation_unread
                  WHERE conversation_id = ? AND user_id = ?),
                 0)",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        Ok(count)
    }

    pub async fn total_unread(&self, user_id: &str) -> ChatResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(
                 (SELECT total_unread FROM user_unread_totals WHERE user_id = ?),
                 0)",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        Ok(total)
    }

    /// Count one message for its recipient: dedup mark, per-conversation
    /// counter, and global total move together in one transaction. Returns
    /// false when the message was already counted or the conversation no
    /// longer has a counter row for the recipient (deleted underneath the
    /// trigger).
    pub async fn apply_unread_increment(
        &self,
        conversation_id: &str,
        recipient_id: &str,
        message_id: &str,
        counted_at: &str,
    ) -> ChatResult<bool> {
        let mut tx = self.pool().begin().await?;

        let marked = sqlx::query(
            "INSERT OR IGNORE INTO counted_messages (message_id, conversation_id, recipient_id, counted_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(message_id)
        .bind(conversation_id)
        .bind(recipient_id)
        .bind(counted_at)
        .execute(&mut *tx)
        .await?;

        if marked.rows_affected() == 0 {
            // Duplicate delivery; nothing was changed, so there is nothing to
            // roll back.
            return Ok(false);
        }

        let bumped = sqlx::query(
            "UPDATE conversation_unread SET unread_count = unread_count + 1
             WHERE conversation_id = ? AND user_id = ?",
        )
        .bind(conversation_id)
        .bind(recipient_id)
        .execute(&mut *tx)
        .await?;

        if bumped.rows_affected() == 0 {
            tracing::debug!(
                conversation_id,
                recipient_id,
                "no counter row for increment; conversation likely deleted"
            );
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO user_unread_totals (user_id, total_unread) VALUES (?, 1)
             ON CONFLICT(user_id) DO UPDATE SET total_unread = total_unread + 1",
        )
        .bind(recipient_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(true)
    }

    /// Zero one participant's counter and subtract the same amount from their
    /// global total, atomically. Returns the counter value that was cleared.
    pub async fn clear_unread_on_read(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> ChatResult<i64> {
        let mut tx = self.pool().begin().await?;

        let previous = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(
                 (SELECT unread_count FROM conversation_unread
                  WHERE conversation_id = ? AND user_id = ?),
                 0)",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if previous > 0 {
            sqlx::query(
                "UPDATE conversation_unread SET unread_count = 0
                 WHERE conversation_id = ? AND user_id = ?",
            )
            .bind(conversation_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE user_unread_totals SET total_unread = MAX(total_unread - ?, 0)
                 WHERE user_id = ?",
            )
            .bind(previous)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(previous)
    }
}
