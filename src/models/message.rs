use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single text message inside a conversation.
///
/// Messages are write-once: after creation the only permitted mutation is the
/// `is_read`/`read_at` flip performed when the recipient opens the thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub body: String,
    pub sent_at: String, // ISO 8601 timestamp, store-assigned
    pub is_read: bool,
    pub read_at: Option<String>, // ISO 8601 timestamp
}

impl Message {
    /// Create a new unread message. `sent_at` comes from the store clock so
    /// ordering inside a conversation never depends on the caller's clock.
    pub fn new(conversation_id: String, sender_id: String, body: String, sent_at: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id,
            sender_id,
            body,
            sent_at,
            is_read: false,
            read_at: None,
        }
    }

    /// Validate message body before persistence. The empty check runs on the
    /// trimmed body so whitespace-only content is rejected too.
    pub fn validate_body(body: &str) -> Result<(), String> {
        if body.trim().is_empty() {
            return Err("message body cannot be empty".to_string());
        }
        if body.len() > 10_000 {
            return Err(format!(
                "message body too long: {} characters (max 10,000)",
                body.len()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_starts_unread() {
        let msg = Message::new(
            "conv_123".to_string(),
            "user_456".to_string(),
            "Hola".to_string(),
            "2026-08-05T10:00:00.000000Z".to_string(),
        );

        assert!(!msg.is_read);
        assert!(msg.read_at.is_none());
        assert_eq!(msg.conversation_id, "conv_123");
    }

    #[test]
    fn validate_body_rejects_empty() {
        assert!(Message::validate_body("").is_err());
    }

    #[test]
    fn validate_body_rejects_whitespace_only() {
        assert!(Message::validate_body("   \t\n").is_err());
    }

    #[test]
    fn validate_body_rejects_oversized() {
        let body = "a".repeat(10_001);
        let result = Message::validate_body(&body);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("too long"));
    }

    #[test]
    fn validate_body_accepts_text() {
        assert!(Message::validate_body("¿Sigue disponible?").is_ok());
    }

    #[test]
    fn serializes_with_storage_field_names() {
        let msg = Message::new(
            "conv_123".to_string(),
            "user_456".to_string(),
            "Hola".to_string(),
            "2026-08-05T10:00:00.000000Z".to_string(),
        );

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["is_read"], false);
        assert_eq!(json["read_at"], serde_json::Value::Null);
        assert_eq!(json["body"], "Hola");
    }
}
