use std::sync::Arc;

use crate::DomainResult;
use crate::error::DomainError;
use crate::identity::ActorIdentity;
use crate::ports::listings::ListingDirectory;
use crate::ports::messages::MessageRepository;
use crate::ports::notifications::NotificationRepository;

/// Enforces who may delete a conversation and cascades the deletion
/// across the message and notification ledgers so the derived
/// conversation view stays consistent.
#[derive(Clone)]
pub struct CleanupService {
    messages: Arc<dyn MessageRepository>,
    notifications: Arc<dyn NotificationRepository>,
    listings: Arc<dyn ListingDirectory>,
}

impl CleanupService {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        notifications: Arc<dyn NotificationRepository>,
        listings: Arc<dyn ListingDirectory>,
    ) -> Self {
        Self {
            messages,
            notifications,
            listings,
        }
    }

    /// The owner's deletion clears the whole thread for everyone; a
    /// non-owner participant only erases their own side. Anyone else
    /// has no standing. The caller's notifications referencing the
    /// listing are removed either way.
    pub async fn delete_conversation(
        &self,
        actor: &ActorIdentity,
        listing_id: &str,
    ) -> DomainResult<()> {
        let is_owner = self
            .listings
            .get(listing_id)
            .await?
            .is_some_and(|listing| listing.owner_id == actor.user_id);
        let has_messages = self
            .messages
            .exists_for_user(listing_id, &actor.user_id)
            .await?;
        if !is_owner && !has_messages {
            return Err(DomainError::Forbidden);
        }

        let removed = if is_owner {
            self.messages.delete_by_listing(listing_id).await?
        } else {
            self.messages
                .delete_by_listing_for_user(listing_id, &actor.user_id)
                .await?
        };
        let notifications_removed = self
            .notifications
            .delete_for_user_by_listing(&actor.user_id, listing_id)
            .await?;
        tracing::debug!(
            listing_id,
            user_id = %actor.user_id,
            is_owner,
            removed,
            notifications_removed,
            "conversation deleted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::testing::Fixture;
    use crate::messaging::{RouteInput, RouteOutcome};

    async fn seeded_fixture() -> Fixture {
        let fixture = Fixture::new();
        fixture.seed_user("owner-a", "Alice").await;
        fixture.seed_user("user-b", "Bruno").await;
        fixture.seed_user("user-c", "Carla").await;
        fixture.seed_listing("l-1", "owner-a", "Blue backpack").await;
        fixture
    }

    async fn send(fixture: &Fixture, sender: &str, recipient: Option<&str>, body: &str) {
        let outcome = fixture
            .message_service()
            .route(
                &ActorIdentity::with_user_id(sender),
                RouteInput {
                    listing_id: "l-1".to_string(),
                    body: body.to_string(),
                    recipient_id: recipient.map(str::to_string),
                    occurred_at_ms: None,
                },
            )
            .await
            .expect("route");
        assert!(matches!(outcome, RouteOutcome::Routed { .. }));
    }

    fn cleanup(fixture: &Fixture) -> CleanupService {
        CleanupService::new(
            fixture.messages.clone(),
            fixture.notifications.clone(),
            fixture.listings.clone(),
        )
    }

    #[tokio::test]
    async fn owner_deletion_clears_the_whole_thread() {
        let fixture = seeded_fixture().await;
        send(&fixture, "user-b", None, "mine?").await;
        send(&fixture, "user-c", None, "or mine?").await;
        send(&fixture, "owner-a", Some("user-b"), "checking").await;

        cleanup(&fixture)
            .delete_conversation(&ActorIdentity::with_user_id("owner-a"), "l-1")
            .await
            .expect("delete");

        assert!(fixture.messages.messages.read().await.is_empty());
        // Owner notifications for the listing are gone; the other
        // participants keep theirs.
        let remaining = fixture.notifications.notifications.read().await;
        assert!(remaining
            .iter()
            .all(|notification| notification.user_id != "owner-a"));
        assert!(remaining
            .iter()
            .any(|notification| notification.user_id == "user-b"));
    }

    #[tokio::test]
    async fn non_owner_deletion_only_erases_their_own_side() {
        let fixture = seeded_fixture().await;
        send(&fixture, "user-b", None, "mine?").await;
        send(&fixture, "user-c", None, "or mine?").await;

        cleanup(&fixture)
            .delete_conversation(&ActorIdentity::with_user_id("user-b"), "l-1")
            .await
            .expect("delete");

        let remaining = fixture.messages.messages.read().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].sender_id, "user-c");
    }

    #[tokio::test]
    async fn unrelated_user_is_forbidden_without_mutation() {
        let fixture = seeded_fixture().await;
        send(&fixture, "user-b", None, "mine?").await;

        let result = cleanup(&fixture)
            .delete_conversation(&ActorIdentity::with_user_id("user-c"), "l-1")
            .await;

        assert!(matches!(result, Err(DomainError::Forbidden)));
        assert_eq!(fixture.messages.messages.read().await.len(), 1);
        assert_eq!(fixture.notifications.notifications.read().await.len(), 1);
    }

    #[tokio::test]
    async fn owner_may_delete_even_without_own_messages() {
        let fixture = seeded_fixture().await;
        send(&fixture, "user-b", None, "mine?").await;

        cleanup(&fixture)
            .delete_conversation(&ActorIdentity::with_user_id("owner-a"), "l-1")
            .await
            .expect("delete");
        assert!(fixture.messages.messages.read().await.is_empty());
    }
}
