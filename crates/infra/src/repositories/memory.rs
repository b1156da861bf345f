use std::collections::HashMap;
use std::sync::Arc;

use achados_domain::DomainResult;
use achados_domain::identity::UserProfile;
use achados_domain::listing::ListingSummary;
use achados_domain::messaging::Message;
use achados_domain::notifications::Notification;
use achados_domain::ports::BoxFuture;
use achados_domain::ports::listings::ListingDirectory;
use achados_domain::ports::messages::MessageRepository;
use achados_domain::ports::users::UserDirectory;
use tokio::sync::RwLock;

/// Append-only in-memory message ledger, the default `memory` backend.
#[derive(Default)]
pub struct InMemoryMessageLedger {
    messages: Arc<RwLock<Vec<Message>>>,
}

impl InMemoryMessageLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageRepository for InMemoryMessageLedger {
    fn append(&self, message: &Message) -> BoxFuture<'_, DomainResult<Message>> {
        let message = message.clone();
        let messages = self.messages.clone();
        Box::pin(async move {
            messages.write().await.push(message.clone());
            Ok(message)
        })
    }

    fn list_by_listing(&self, listing_id: &str) -> BoxFuture<'_, DomainResult<Vec<Message>>> {
        let listing_id = listing_id.to_string();
        let messages = self.messages.clone();
        Box::pin(async move {
            let mut out: Vec<_> = messages
                .read()
                .await
                .iter()
                .filter(|message| message.listing_id == listing_id)
                .cloned()
                .collect();
            // Storage-assigned timestamps are the only ordering; the
            // message id breaks same-millisecond ties deterministically.
            out.sort_by(|a, b| {
                a.created_at_ms
                    .cmp(&b.created_at_ms)
                    .then_with(|| a.message_id.cmp(&b.message_id))
            });
            Ok(out)
        })
    }

    fn list_for_user(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Vec<Message>>> {
        let user_id = user_id.to_string();
        let messages = self.messages.clone();
        Box::pin(async move {
            let out = messages
                .read()
                .await
                .iter()
                .filter(|message| {
                    message.sender_id == user_id
                        || message.recipient_id.as_deref() == Some(user_id.as_str())
                })
                .cloned()
                .collect();
            Ok(out)
        })
    }

    fn exists_for_user(
        &self,
        listing_id: &str,
        user_id: &str,
    ) -> BoxFuture<'_, DomainResult<bool>> {
        let listing_id = listing_id.to_string();
        let user_id = user_id.to_string();
        let messages = self.messages.clone();
        Box::pin(async move {
            let exists = messages.read().await.iter().any(|message| {
                message.listing_id == listing_id
                    && (message.sender_id == user_id
                        || message.recipient_id.as_deref() == Some(user_id.as_str()))
            });
            Ok(exists)
        })
    }

    fn delete_by_listing(&self, listing_id: &str) -> BoxFuture<'_, DomainResult<u64>> {
        let listing_id = listing_id.to_string();
        let messages = self.messages.clone();
        Box::pin(async move {
            let mut messages = messages.write().await;
            let before = messages.len();
            messages.retain(|message| message.listing_id != listing_id);
            Ok((before - messages.len()) as u64)
        })
    }

    fn delete_by_listing_for_user(
        &self,
        listing_id: &str,
        user_id: &str,
    ) -> BoxFuture<'_, DomainResult<u64>> {
        let listing_id = listing_id.to_string();
        let user_id = user_id.to_string();
        let messages = self.messages.clone();
        Box::pin(async move {
            let mut messages = messages.write().await;
            let before = messages.len();
            messages.retain(|message| {
                message.listing_id != listing_id
                    || (message.sender_id != user_id
                        && message.recipient_id.as_deref() != Some(user_id.as_str()))
            });
            Ok((before - messages.len()) as u64)
        })
    }
}

#[derive(Default)]
pub struct InMemoryNotificationLedger {
    notifications: Arc<RwLock<HashMap<String, Notification>>>,
}

impl InMemoryNotificationLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl achados_domain::ports::notifications::NotificationRepository for InMemoryNotificationLedger {
    fn create(&self, notification: &Notification) -> BoxFuture<'_, DomainResult<Notification>> {
        let notification = notification.clone();
        let notifications = self.notifications.clone();
        Box::pin(async move {
            notifications
                .write()
                .await
                .insert(notification.notification_id.clone(), notification.clone());
            Ok(notification)
        })
    }

    fn list_by_user(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Vec<Notification>>> {
        let user_id = user_id.to_string();
        let notifications = self.notifications.clone();
        Box::pin(async move {
            let mut out: Vec<_> = notifications
                .read()
                .await
                .values()
                .filter(|notification| notification.user_id == user_id)
                .cloned()
                .collect();
            out.sort_by(|a, b| {
                b.created_at_ms
                    .cmp(&a.created_at_ms)
                    .then_with(|| b.notification_id.cmp(&a.notification_id))
            });
            Ok(out)
        })
    }

    fn get(&self, notification_id: &str) -> BoxFuture<'_, DomainResult<Option<Notification>>> {
        let notification_id = notification_id.to_string();
        let notifications = self.notifications.clone();
        Box::pin(async move { Ok(notifications.read().await.get(&notification_id).cloned()) })
    }

    fn mark_read(
        &self,
        notification_id: &str,
        read_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<Option<Notification>>> {
        let notification_id = notification_id.to_string();
        let notifications = self.notifications.clone();
        Box::pin(async move {
            let mut notifications = notifications.write().await;
            let Some(notification) = notifications.get_mut(&notification_id) else {
                return Ok(None);
            };
            if notification.read_at_ms.is_none() {
                notification.read_at_ms = Some(read_at_ms);
            }
            Ok(Some(notification.clone()))
        })
    }

    fn mark_all_read(&self, user_id: &str, read_at_ms: i64) -> BoxFuture<'_, DomainResult<u64>> {
        let user_id = user_id.to_string();
        let notifications = self.notifications.clone();
        Box::pin(async move {
            let mut count = 0;
            for notification in notifications.write().await.values_mut() {
                if notification.user_id == user_id && notification.read_at_ms.is_none() {
                    notification.read_at_ms = Some(read_at_ms);
                    count += 1;
                }
            }
            Ok(count)
        })
    }

    fn delete_for_user_by_listing(
        &self,
        user_id: &str,
        listing_id: &str,
    ) -> BoxFuture<'_, DomainResult<u64>> {
        let user_id = user_id.to_string();
        let listing_id = listing_id.to_string();
        let notifications = self.notifications.clone();
        Box::pin(async move {
            let mut notifications = notifications.write().await;
            let before = notifications.len();
            notifications.retain(|_, notification| {
                notification.user_id != user_id || notification.data.listing_id != listing_id
            });
            Ok((before - notifications.len()) as u64)
        })
    }
}

/// In-memory stand-in for the external listing store. The real board
/// owns listing CRUD; this directory only answers ownership lookups
/// and is seeded out-of-band (tests, demo data).
#[derive(Default)]
pub struct InMemoryListingDirectory {
    listings: Arc<RwLock<HashMap<String, ListingSummary>>>,
}

impl InMemoryListingDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, listing: ListingSummary) {
        self.listings
            .write()
            .await
            .insert(listing.listing_id.clone(), listing);
    }

    pub async fn remove(&self, listing_id: &str) {
        self.listings.write().await.remove(listing_id);
    }
}

impl ListingDirectory for InMemoryListingDirectory {
    fn get(&self, listing_id: &str) -> BoxFuture<'_, DomainResult<Option<ListingSummary>>> {
        let listing_id = listing_id.to_string();
        let listings = self.listings.clone();
        Box::pin(async move { Ok(listings.read().await.get(&listing_id).cloned()) })
    }

    fn list_owned_by(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Vec<ListingSummary>>> {
        let user_id = user_id.to_string();
        let listings = self.listings.clone();
        Box::pin(async move {
            let out = listings
                .read()
                .await
                .values()
                .filter(|listing| listing.owner_id == user_id)
                .cloned()
                .collect();
            Ok(out)
        })
    }
}

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<String, UserProfile>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, profile: UserProfile) {
        self.users
            .write()
            .await
            .insert(profile.user_id.clone(), profile);
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn get(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Option<UserProfile>>> {
        let user_id = user_id.to_string();
        let users = self.users.clone();
        Box::pin(async move { Ok(users.read().await.get(&user_id).cloned()) })
    }

    fn get_many(&self, user_ids: &[String]) -> BoxFuture<'_, DomainResult<Vec<UserProfile>>> {
        let user_ids = user_ids.to_vec();
        let users = self.users.clone();
        Box::pin(async move {
            let users = users.read().await;
            Ok(user_ids
                .iter()
                .filter_map(|user_id| users.get(user_id).cloned())
                .collect())
        })
    }
}
