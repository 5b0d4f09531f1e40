use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A thread binding exactly two participants to one listing.
///
/// `buyer_id`/`seller_id` are derived once at creation (the listing owner is
/// the seller) and never change afterwards. `last_message_preview` and
/// `last_message_at` are denormalized copies of the latest message, updated by
/// a separate write after every append; consumers treat them as advisory and
/// trust the message stream for ordering and content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub listing_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub last_message_preview: Option<String>,
    pub last_message_at: Option<String>, // ISO 8601 timestamp
    /// Unread count per participant, exactly one entry per participant.
    pub unread_counts: HashMap<String, i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl Conversation {
    pub fn new(listing_id: String, buyer_id: String, seller_id: String, now: String) -> Self {
        let mut unread_counts = HashMap::new();
        unread_counts.insert(buyer_id.clone(), 0);
        unread_counts.insert(seller_id.clone(), 0);

        Self {
            id: Uuid::new_v4().to_string(),
            listing_id,
            buyer_id,
            seller_id,
            last_message_preview: None,
            last_message_at: None,
            unread_counts,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn participants(&self) -> [&str; 2] {
        [&self.buyer_id, &self.seller_id]
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.buyer_id == user_id || self.seller_id == user_id
    }

    /// The other participant, or `None` when `user_id` is not part of the
    /// thread.
    pub fn counterpart_of(&self, user_id: &str) -> Option<&str> {
        if self.buyer_id == user_id {
            Some(&self.seller_id)
        } else if self.seller_id == user_id {
            Some(&self.buyer_id)
        } else {
            None
        }
    }

    /// Set equality against a requested pair, ignoring order.
    pub fn participant_set_matches(&self, a: &str, b: &str) -> bool {
        (self.buyer_id == a && self.seller_id == b) || (self.buyer_id == b && self.seller_id == a)
    }

    pub fn unread_for(&self, user_id: &str) -> i64 {
        self.unread_counts.get(user_id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Conversation {
        Conversation::new(
            "listing-42".to_string(),
            "ana".to_string(),
            "bruno".to_string(),
            "2026-08-05T10:00:00.000000Z".to_string(),
        )
    }

    #[test]
    fn new_conversation_zeroes_both_counters() {
        let conv = sample();
        assert_eq!(conv.unread_counts.len(), 2);
        assert_eq!(conv.unread_for("ana"), 0);
        assert_eq!(conv.unread_for("bruno"), 0);
        assert!(conv.last_message_preview.is_none());
    }

    #[test]
    fn participant_set_match_ignores_order() {
        let conv = sample();
        assert!(conv.participant_set_matches("ana", "bruno"));
        assert!(conv.participant_set_matches("bruno", "ana"));
        assert!(!conv.participant_set_matches("ana", "carla"));
    }

    #[test]
    fn counterpart_resolution() {
        let conv = sample();
        assert_eq!(conv.counterpart_of("ana"), Some("bruno"));
        assert_eq!(conv.counterpart_of("bruno"), Some("ana"));
        assert_eq!(conv.counterpart_of("carla"), None);
    }
}
