use crate::DomainResult;
use crate::notifications::Notification;

pub trait NotificationRepository: Send + Sync {
    fn create(
        &self,
        notification: &Notification,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Notification>>;

    /// All notifications for a user, newest first.
    fn list_by_user(
        &self,
        user_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Vec<Notification>>>;

    fn get(
        &self,
        notification_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Option<Notification>>>;

    /// Set the read timestamp if not already set. Returns the stored
    /// record, or None when the id is unknown.
    fn mark_read(
        &self,
        notification_id: &str,
        read_at_ms: i64,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Option<Notification>>>;

    /// Set the read timestamp on every unread notification for the
    /// user. Returns how many were transitioned.
    fn mark_all_read(
        &self,
        user_id: &str,
        read_at_ms: i64,
    ) -> crate::ports::BoxFuture<'_, DomainResult<u64>>;

    /// Delete the user's notifications whose payload references the
    /// listing.
    fn delete_for_user_by_listing(
        &self,
        user_id: &str,
        listing_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<u64>>;
}
