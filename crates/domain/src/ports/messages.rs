use crate::DomainResult;
use crate::messaging::Message;

/// Append-only message ledger keyed by listing id. The rest of the
/// core derives conversation structure from this store; there is no
/// stored conversation entity to keep in sync.
pub trait MessageRepository: Send + Sync {
    fn append(&self, message: &Message) -> crate::ports::BoxFuture<'_, DomainResult<Message>>;

    /// All messages for a listing, chronological ascending.
    fn list_by_listing(
        &self,
        listing_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Vec<Message>>>;

    /// All messages where the user is sender or recipient.
    fn list_for_user(
        &self,
        user_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Vec<Message>>>;

    fn exists_for_user(
        &self,
        listing_id: &str,
        user_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<bool>>;

    fn delete_by_listing(
        &self,
        listing_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<u64>>;

    /// Delete only the messages in a listing where the user is sender
    /// or recipient, leaving other participants' threads intact.
    fn delete_by_listing_for_user(
        &self,
        listing_id: &str,
        user_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<u64>>;
}
