use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::error::DomainError;
use crate::identity::ActorIdentity;
use crate::ports::notifications::NotificationRepository;
use crate::util::now_ms;

pub const NOTIFICATION_KIND_MESSAGE: &str = "message";

/// Structured payload; always carries the originating listing so the
/// cleanup cascade can find notifications by listing id.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationData {
    pub listing_id: String,
    pub message_id: String,
    pub sender_id: String,
}

/// One alert surfaced to a user. `read_at_ms` absent means unread;
/// once set it is never cleared or moved earlier.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub notification_id: String,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub data: NotificationData,
    pub read_at_ms: Option<i64>,
    pub created_at_ms: i64,
}

#[derive(Clone)]
pub struct NotificationService {
    notifications: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    pub fn new(notifications: Arc<dyn NotificationRepository>) -> Self {
        Self { notifications }
    }

    pub async fn list(&self, actor: &ActorIdentity) -> DomainResult<Vec<Notification>> {
        self.notifications.list_by_user(&actor.user_id).await
    }

    /// Mark one notification read. Not found when the id is unknown or
    /// belongs to another user; a second call is a no-op.
    pub async fn mark_read(
        &self,
        actor: &ActorIdentity,
        notification_id: &str,
    ) -> DomainResult<Notification> {
        let existing = self
            .notifications
            .get(notification_id)
            .await?
            .filter(|notification| notification.user_id == actor.user_id)
            .ok_or(DomainError::NotFound)?;
        if existing.read_at_ms.is_some() {
            return Ok(existing);
        }
        self.notifications
            .mark_read(notification_id, now_ms())
            .await?
            .ok_or(DomainError::NotFound)
    }

    pub async fn mark_all_read(&self, actor: &ActorIdentity) -> DomainResult<u64> {
        self.notifications
            .mark_all_read(&actor.user_id, now_ms())
            .await
    }
}
