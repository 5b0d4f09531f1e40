pub mod test_db;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use mercachat::database::Database;
use mercachat::error::ChatResult;
use mercachat::events::{EventBus, LocalEventBus};
use mercachat::listings::ListingDirectory;
use mercachat::services::{ConversationService, MessageService, UnreadLedger};

/// Listing directory backed by a fixed owner table.
#[derive(Default)]
pub struct StaticListings {
    owners: HashMap<String, String>,
}

#[allow(dead_code)]
impl StaticListings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner(mut self, listing_id: &str, owner_id: &str) -> Self {
        self.owners
            .insert(listing_id.to_string(), owner_id.to_string());
        self
    }
}

#[async_trait]
impl ListingDirectory for StaticListings {
    async fn owner_of(&self, listing_id: &str) -> ChatResult<Option<String>> {
        Ok(self.owners.get(listing_id).cloned())
    }
}

#[allow(dead_code)]
pub struct TestStack {
    pub db: Database,
    pub event_bus: Arc<dyn EventBus>,
    pub conversations: ConversationService,
    pub messages: MessageService,
    pub ledger: UnreadLedger,
}

/// Wire the services against a fresh test database, without the background
/// listener: tests drive the counter trigger deterministically.
#[allow(dead_code)]
pub async fn stack_with_listings(listings: StaticListings) -> TestStack {
    let db = test_db::setup_test_db().await;
    let event_bus: Arc<dyn EventBus> = Arc::new(LocalEventBus::new(64));
    let ledger = UnreadLedger::new(db.clone());
    let conversations = ConversationService::new(
        db.clone(),
        Arc::new(listings),
        ledger.clone(),
        event_bus.clone(),
    );
    let messages = MessageService::new(db.clone(), ledger.clone(), event_bus.clone());

    TestStack {
        db,
        event_bus,
        conversations,
        messages,
        ledger,
    }
}
