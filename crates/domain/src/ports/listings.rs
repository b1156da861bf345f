use crate::DomainResult;
use crate::listing::ListingSummary;

/// Read-side of the listing store, which is owned by a collaborator
/// outside this core. Listing deletion cascades (removing a deleted
/// listing's messages) are that collaborator's side effect and are not
/// duplicated behind this port.
pub trait ListingDirectory: Send + Sync {
    fn get(
        &self,
        listing_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Option<ListingSummary>>>;

    fn list_owned_by(
        &self,
        user_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Vec<ListingSummary>>>;
}
