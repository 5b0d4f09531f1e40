use std::sync::Arc;

use crate::config::Config;
use crate::database::Database;
use crate::error::ChatResult;
use crate::events::{EventBus, LocalEventBus};
use crate::listeners::unread_counter::spawn_unread_counter_listener;
use crate::listings::ListingDirectory;
use crate::services::{ConversationService, MessageService, UnreadLedger};

/// The wired messaging core: storage, event bus, and services sharing them.
pub struct Messaging {
    pub db: Database,
    pub event_bus: Arc<dyn EventBus>,
    pub conversations: ConversationService,
    pub messages: MessageService,
    pub ledger: UnreadLedger,
    /// Handle of the background counter trigger; aborts when dropped
    /// together with the runtime, or explicitly via `abort()`.
    pub counter_listener: tokio::task::JoinHandle<()>,
}

/// Connect the database, run migrations, build the services, and spawn the
/// unread counter listener.
pub async fn build_messaging(
    config: &Config,
    listings: Arc<dyn ListingDirectory>,
) -> ChatResult<Messaging> {
    let db = Database::connect(&config.database_url).await?;
    db.run_migrations().await?;
    tracing::info!(database_url = %config.database_url, "database ready");

    let event_bus: Arc<dyn EventBus> = Arc::new(LocalEventBus::new(config.event_bus_capacity));

    let ledger = UnreadLedger::new(db.clone());
    let conversations = ConversationService::new(
        db.clone(),
        listings,
        ledger.clone(),
        event_bus.clone(),
    );
    let messages = MessageService::new(db.clone(), ledger.clone(), event_bus.clone());

    let counter_listener =
        spawn_unread_counter_listener(event_bus.clone(), db.clone(), ledger.clone());

    Ok(Messaging {
        db,
        event_bus,
        conversations,
        messages,
        ledger,
        counter_listener,
    })
}
