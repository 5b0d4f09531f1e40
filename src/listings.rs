use async_trait::async_trait;

use crate::error::ChatResult;

/// Collaborator port to the listing store. The messaging core only needs to
/// know who owns a listing, to decide which participant is the seller when a
/// thread is first created.
#[async_trait]
pub trait ListingDirectory: Send + Sync {
    /// Resolve a listing to its owning user. `Ok(None)` means the listing
    /// record could not be found.
    async fn owner_of(&self, listing_id: &str) -> ChatResult<Option<String>>;
}
