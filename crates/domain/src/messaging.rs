use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::identity::ActorIdentity;
use crate::notifications::{NOTIFICATION_KIND_MESSAGE, Notification, NotificationData};
use crate::ports::listings::ListingDirectory;
use crate::ports::messages::MessageRepository;
use crate::ports::notifications::NotificationRepository;
use crate::ports::users::UserDirectory;
use crate::util::{now_ms, uuid_v7_without_dashes};

pub const MAX_BODY_LENGTH: usize = 2_000;

/// One chat utterance, scoped to a listing. Sender name and email are
/// a point-in-time snapshot and are never updated if the sender later
/// changes their profile.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub message_id: String,
    pub listing_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_email: String,
    pub recipient_id: Option<String>,
    pub body: String,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct RouteInput {
    pub listing_id: String,
    pub body: String,
    pub recipient_id: Option<String>,
    pub occurred_at_ms: Option<i64>,
}

/// Why an incoming message was silently discarded. Drops are
/// fire-and-forget: no storage mutation, no event back to the sender.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Empty after trimming, or over the length cap.
    InvalidBody,
    UnknownSender,
    UnknownListing,
    MissingRecipient,
}

#[derive(Clone, Debug)]
pub enum RouteOutcome {
    Routed {
        message: Message,
        notification: Option<Notification>,
    },
    Dropped(DropReason),
}

#[derive(Clone)]
pub struct MessageService {
    messages: Arc<dyn MessageRepository>,
    notifications: Arc<dyn NotificationRepository>,
    listings: Arc<dyn ListingDirectory>,
    users: Arc<dyn UserDirectory>,
}

impl MessageService {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        notifications: Arc<dyn NotificationRepository>,
        listings: Arc<dyn ListingDirectory>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            messages,
            notifications,
            listings,
            users,
        }
    }

    /// Resolve the counterpart for an incoming message and append it.
    ///
    /// The topology is an asymmetric star: a non-owner's message always
    /// routes to the listing owner, while the owner must name one
    /// counterpart explicitly. There is no broadcast from the owner
    /// side and no stored participant registry; the decision is
    /// recomputed from ownership on every message.
    pub async fn route(
        &self,
        sender: &ActorIdentity,
        input: RouteInput,
    ) -> DomainResult<RouteOutcome> {
        let body = input.body.trim().to_string();
        if body.is_empty() || body.chars().count() > MAX_BODY_LENGTH {
            return Ok(RouteOutcome::Dropped(DropReason::InvalidBody));
        }

        let Some(profile) = self.users.get(&sender.user_id).await? else {
            tracing::debug!(sender_id = %sender.user_id, "dropping message from unknown sender");
            return Ok(RouteOutcome::Dropped(DropReason::UnknownSender));
        };

        let Some(listing) = self.listings.get(&input.listing_id).await? else {
            tracing::debug!(listing_id = %input.listing_id, "dropping message for unknown listing");
            return Ok(RouteOutcome::Dropped(DropReason::UnknownListing));
        };

        let is_owner = listing.owner_id == sender.user_id;
        let recipient_id = if is_owner {
            // Owners cannot broadcast; they must pick one counterpart.
            match input.recipient_id {
                Some(recipient_id) if !recipient_id.trim().is_empty() => Some(recipient_id),
                _ => return Ok(RouteOutcome::Dropped(DropReason::MissingRecipient)),
            }
        } else {
            Some(listing.owner_id.clone())
        };

        let message = Message {
            message_id: uuid_v7_without_dashes(),
            listing_id: listing.listing_id.clone(),
            sender_id: profile.user_id.clone(),
            sender_name: profile.name.clone(),
            sender_email: profile.email.clone(),
            recipient_id: recipient_id.clone(),
            body,
            created_at_ms: input.occurred_at_ms.unwrap_or_else(now_ms),
        };
        let message = self.messages.append(&message).await?;

        let notification = match recipient_id {
            Some(recipient_id) if recipient_id != profile.user_id => {
                let notification = Notification {
                    notification_id: uuid_v7_without_dashes(),
                    user_id: recipient_id,
                    kind: NOTIFICATION_KIND_MESSAGE.to_string(),
                    title: "New message".to_string(),
                    body: format!("{} sent you a message", profile.name),
                    data: NotificationData {
                        listing_id: message.listing_id.clone(),
                        message_id: message.message_id.clone(),
                        sender_id: message.sender_id.clone(),
                    },
                    read_at_ms: None,
                    created_at_ms: message.created_at_ms,
                };
                Some(self.notifications.create(&notification).await?)
            }
            _ => None,
        };

        Ok(RouteOutcome::Routed {
            message,
            notification,
        })
    }

    /// Chat history for a listing, chronological ascending. Read access
    /// is not gated beyond authentication.
    pub async fn history(&self, listing_id: &str) -> DomainResult<Vec<Message>> {
        self.messages.list_by_listing(listing_id).await
    }
}
