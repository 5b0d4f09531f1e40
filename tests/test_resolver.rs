mod helpers;

use helpers::{stack_with_listings, StaticListings};

#[tokio::test]
async fn sequential_resolves_reuse_the_same_thread() {
    let stack = stack_with_listings(StaticListings::new().with_owner("listing-42", "bruno")).await;

    let first = stack
        .conversations
        .resolve_or_create(("ana", "bruno"), "listing-42", "Interesado", "ana")
        .await
        .unwrap();

    let second = stack
        .conversations
        .resolve_or_create(("ana", "bruno"), "listing-42", "¿Sigue disponible?", "ana")
        .await
        .unwrap();

    assert_eq!(first, second);

    let messages = stack.messages.list_messages(&first).await.unwrap();
    assert_eq!(messages.len(), 2);
}

#[tokio::test]
async fn participant_order_does_not_matter() {
    let stack = stack_with_listings(StaticListings::new().with_owner("listing-42", "bruno")).await;

    let first = stack
        .conversations
        .resolve_or_create(("ana", "bruno"), "listing-42", "hola", "ana")
        .await
        .unwrap();

    let second = stack
        .conversations
        .resolve_or_create(("bruno", "ana"), "listing-42", "respuesta", "bruno")
        .await
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn distinct_listings_get_distinct_threads() {
    let listings = StaticListings::new()
        .with_owner("listing-1", "bruno")
        .with_owner("listing-2", "bruno");
    let stack = stack_with_listings(listings).await;

    let on_first = stack
        .conversations
        .resolve_or_create(("ana", "bruno"), "listing-1", "hola", "ana")
        .await
        .unwrap();

    let on_second = stack
        .conversations
        .resolve_or_create(("ana", "bruno"), "listing-2", "hola", "ana")
        .await
        .unwrap();

    assert_ne!(on_first, on_second);
}

#[tokio::test]
async fn listing_owner_becomes_the_seller() {
    let stack = stack_with_listings(StaticListings::new().with_owner("listing-42", "bruno")).await;

    let id = stack
        .conversations
        .resolve_or_create(("ana", "bruno"), "listing-42", "Interesado", "ana")
        .await
        .unwrap();

    let conversation = stack.conversations.get_conversation(&id).await.unwrap();
    assert_eq!(conversation.seller_id, "bruno");
    assert_eq!(conversation.buyer_id, "ana");
    assert_eq!(conversation.listing_id, "listing-42");
}

#[tokio::test]
async fn unresolved_listing_falls_back_to_the_counterpart_as_seller() {
    // Empty directory: the listing record cannot be resolved.
    let stack = stack_with_listings(StaticListings::new()).await;

    let id = stack
        .conversations
        .resolve_or_create(("ana", "bruno"), "listing-missing", "hola", "ana")
        .await
        .unwrap();

    let conversation = stack.conversations.get_conversation(&id).await.unwrap();
    assert_eq!(conversation.buyer_id, "ana");
    assert_eq!(conversation.seller_id, "bruno");
}

#[tokio::test]
async fn first_message_counts_against_the_recipient() {
    let stack = stack_with_listings(StaticListings::new().with_owner("listing-42", "bruno")).await;

    let id = stack
        .conversations
        .resolve_or_create(("ana", "bruno"), "listing-42", "Interesado", "ana")
        .await
        .unwrap();

    assert_eq!(stack.db.unread_count(&id, "bruno").await.unwrap(), 1);
    assert_eq!(stack.db.unread_count(&id, "ana").await.unwrap(), 0);
    assert_eq!(stack.ledger.total_unread("bruno").await.unwrap(), 1);

    let conversation = stack.conversations.get_conversation(&id).await.unwrap();
    assert_eq!(conversation.unread_for("bruno"), 1);
    assert_eq!(conversation.unread_for("ana"), 0);
    assert_eq!(
        conversation.last_message_preview.as_deref(),
        Some("Interesado")
    );
    assert!(conversation.last_message_at.is_some());
}

#[tokio::test]
async fn resolver_validation_rejects_bad_input() {
    let stack = stack_with_listings(StaticListings::new().with_owner("listing-42", "bruno")).await;

    let empty_body = stack
        .conversations
        .resolve_or_create(("ana", "bruno"), "listing-42", "   ", "ana")
        .await
        .unwrap_err();
    assert!(empty_body.is_validation());

    let same_user = stack
        .conversations
        .resolve_or_create(("ana", "ana"), "listing-42", "hola", "ana")
        .await
        .unwrap_err();
    assert!(same_user.is_validation());

    let outside_sender = stack
        .conversations
        .resolve_or_create(("ana", "bruno"), "listing-42", "hola", "carla")
        .await
        .unwrap_err();
    assert!(outside_sender.is_validation());

    // Nothing was written by any of the failed calls.
    let conversations = stack
        .conversations
        .list_conversations_for_user("ana")
        .await
        .unwrap();
    assert!(conversations.is_empty());
}
