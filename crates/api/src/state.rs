use std::sync::Arc;

use achados_domain::ports::listings::ListingDirectory;
use achados_domain::ports::messages::MessageRepository;
use achados_domain::ports::notifications::NotificationRepository;
use achados_domain::ports::users::UserDirectory;
use achados_infra::auth::IdentityGate;
use achados_infra::config::AppConfig;
use achados_infra::repositories::{
    InMemoryListingDirectory, InMemoryMessageLedger, InMemoryNotificationLedger,
    InMemoryUserDirectory,
};

use crate::realtime::RealtimeHub;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub identity: IdentityGate,
    pub messages: Arc<dyn MessageRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub listings: Arc<dyn ListingDirectory>,
    pub users: Arc<dyn UserDirectory>,
    pub realtime: Arc<RealtimeHub>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        // "memory" is the only wired backend; the directories are seeded
        // out-of-band by whatever hosts this core.
        let messages = Arc::new(InMemoryMessageLedger::new());
        let notifications = Arc::new(InMemoryNotificationLedger::new());
        let listings = Arc::new(InMemoryListingDirectory::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        Ok(Self::with_backends(
            config,
            messages,
            notifications,
            listings,
            users,
        ))
    }

    pub fn with_backends(
        config: AppConfig,
        messages: Arc<dyn MessageRepository>,
        notifications: Arc<dyn NotificationRepository>,
        listings: Arc<dyn ListingDirectory>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        let identity = IdentityGate::new(&config.jwt_secret);
        Self {
            config,
            identity,
            messages,
            notifications,
            listings,
            users,
            realtime: Arc::new(RealtimeHub::new()),
        }
    }
}
