use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use achados_domain::identity::ActorIdentity;
use achados_domain::messaging::{MessageService, RouteInput, RouteOutcome};
use achados_domain::notifications::Notification;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Extension, Query, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use tokio::time::interval;

use crate::error::ApiError;
use crate::middleware::AuthContext;
use crate::state::AppState;

pub fn listing_room(listing_id: &str) -> String {
    format!("listing:{listing_id}")
}

pub fn user_room(user_id: &str) -> String {
    format!("user:{user_id}")
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    Message {
        message: achados_domain::messaging::Message,
    },
    Notification {
        notification: Notification,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ClientEvent {
    Join {
        listing_id: String,
    },
    Message {
        listing_id: String,
        body: String,
        #[serde(default)]
        recipient_id: Option<String>,
    },
}

type EventSender = mpsc::UnboundedSender<ServerEvent>;

#[derive(Default)]
struct HubInner {
    connections: HashMap<u64, EventSender>,
    rooms: HashMap<String, HashSet<u64>>,
}

/// Room registry for live sessions. A connection may sit in several
/// rooms at once; `publish` fans out at most one copy of an event per
/// connection no matter how many target rooms it occupies.
#[derive(Default)]
pub struct RealtimeHub {
    inner: RwLock<HubInner>,
    next_connection_id: AtomicU64,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connect(&self) -> (u64, mpsc::UnboundedReceiver<ServerEvent>) {
        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .write()
            .await
            .connections
            .insert(connection_id, tx);
        (connection_id, rx)
    }

    pub async fn join(&self, room: &str, connection_id: u64) {
        let mut inner = self.inner.write().await;
        if !inner.connections.contains_key(&connection_id) {
            return;
        }
        inner
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(connection_id);
    }

    pub async fn disconnect(&self, connection_id: u64) {
        let mut inner = self.inner.write().await;
        inner.connections.remove(&connection_id);
        inner.rooms.retain(|_, members| {
            members.remove(&connection_id);
            !members.is_empty()
        });
    }

    pub async fn publish(&self, rooms: &[String], event: ServerEvent) {
        let targets: Vec<(u64, EventSender)> = {
            let inner = self.inner.read().await;
            let mut seen = HashSet::new();
            let mut targets = Vec::new();
            for room in rooms {
                let Some(members) = inner.rooms.get(room) else {
                    continue;
                };
                for connection_id in members {
                    if seen.insert(*connection_id) {
                        if let Some(sender) = inner.connections.get(connection_id) {
                            targets.push((*connection_id, sender.clone()));
                        }
                    }
                }
            }
            targets
        };

        let mut dead = Vec::new();
        for (connection_id, sender) in targets {
            if sender.send(event.clone()).is_err() {
                dead.push(connection_id);
            }
        }
        for connection_id in dead {
            self.disconnect(connection_id).await;
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// The credential may also arrive as a query parameter since browser
/// WebSocket clients cannot set an authorization header.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    Extension(auth): Extension<AuthContext>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user_id = match auth.user_id.filter(|_| auth.is_authenticated) {
        Some(user_id) => user_id,
        None => {
            let token = query.token.ok_or(ApiError::Unauthorized)?;
            state.identity.verify(&token).map_err(|err| {
                tracing::warn!(error = %err, "invalid realtime credential");
                ApiError::Unauthorized
            })?
        }
    };
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: String) {
    let hub = state.realtime.clone();
    let (connection_id, mut events) = hub.connect().await;
    // Every session listens on its own user room so direct deliveries
    // reach it without an explicit join.
    hub.join(&user_room(&user_id), connection_id).await;

    let service = MessageService::new(
        state.messages.clone(),
        state.notifications.clone(),
        state.listings.clone(),
        state.users.clone(),
    );
    let actor = ActorIdentity::with_user_id(user_id);

    let (mut sender, mut incoming) = socket.split();
    let mut heartbeat = interval(Duration::from_secs(15));
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let Ok(payload) = serde_json::to_string(&event) else { continue };
                if sender.send(WsMessage::Text(payload)).await.is_err() {
                    break;
                }
            }
            frame = incoming.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        handle_client_frame(&state, &service, &actor, connection_id, &text).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = heartbeat.tick() => {
                if sender.send(WsMessage::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    hub.disconnect(connection_id).await;
}

async fn handle_client_frame(
    state: &AppState,
    service: &MessageService,
    actor: &ActorIdentity,
    connection_id: u64,
    text: &str,
) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(err) => {
            tracing::debug!(error = %err, "discarding malformed realtime frame");
            return;
        }
    };

    match event {
        ClientEvent::Join { listing_id } => {
            state
                .realtime
                .join(&listing_room(&listing_id), connection_id)
                .await;
        }
        ClientEvent::Message {
            listing_id,
            body,
            recipient_id,
        } => {
            let input = RouteInput {
                listing_id: listing_id.clone(),
                body,
                recipient_id,
                occurred_at_ms: None,
            };
            let outcome = match service.route(actor, input).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::debug!(error = %err, "message routing failed");
                    return;
                }
            };
            match outcome {
                RouteOutcome::Routed {
                    message,
                    notification,
                } => {
                    let mut rooms = vec![
                        listing_room(&listing_id),
                        user_room(&message.sender_id),
                    ];
                    if let Some(recipient_id) = message.recipient_id.as_deref() {
                        rooms.push(user_room(recipient_id));
                    }
                    state
                        .realtime
                        .publish(&rooms, ServerEvent::Message { message })
                        .await;
                    if let Some(notification) = notification {
                        state
                            .realtime
                            .publish(
                                &[user_room(&notification.user_id)],
                                ServerEvent::Notification { notification },
                            )
                            .await;
                    }
                }
                RouteOutcome::Dropped(reason) => {
                    tracing::debug!(?reason, "message dropped");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use achados_domain::identity::UserProfile;
    use achados_domain::listing::ListingSummary;
    use achados_domain::messaging::Message;
    use achados_domain::ports::messages::MessageRepository as _;
    use achados_infra::config::AppConfig;
    use achados_infra::repositories::{
        InMemoryListingDirectory, InMemoryMessageLedger, InMemoryNotificationLedger,
        InMemoryUserDirectory,
    };
    use std::sync::Arc;

    fn test_event(body: &str) -> ServerEvent {
        ServerEvent::Message {
            message: Message {
                message_id: "m-1".to_string(),
                listing_id: "l-1".to_string(),
                sender_id: "user-b".to_string(),
                sender_name: "B".to_string(),
                sender_email: "b@example.edu".to_string(),
                recipient_id: Some("owner-a".to_string()),
                body: body.to_string(),
                created_at_ms: 1_000,
            },
        }
    }

    #[tokio::test]
    async fn publish_delivers_once_per_connection_across_rooms() {
        let hub = RealtimeHub::new();
        let (connection_id, mut events) = hub.connect().await;
        hub.join(&listing_room("l-1"), connection_id).await;
        hub.join(&user_room("owner-a"), connection_id).await;

        hub.publish(
            &[listing_room("l-1"), user_room("owner-a")],
            test_event("hello"),
        )
        .await;

        assert!(events.try_recv().is_ok());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnect_prunes_room_membership() {
        let hub = RealtimeHub::new();
        let (first, mut first_events) = hub.connect().await;
        let (second, mut second_events) = hub.connect().await;
        hub.join(&listing_room("l-1"), first).await;
        hub.join(&listing_room("l-1"), second).await;

        hub.disconnect(first).await;
        hub.publish(&[listing_room("l-1")], test_event("hello"))
            .await;

        assert!(first_events.try_recv().is_err());
        assert!(second_events.try_recv().is_ok());
    }

    #[tokio::test]
    async fn publish_survives_dropped_receivers() {
        let hub = RealtimeHub::new();
        let (first, first_events) = hub.connect().await;
        let (second, mut second_events) = hub.connect().await;
        hub.join(&listing_room("l-1"), first).await;
        hub.join(&listing_room("l-1"), second).await;
        drop(first_events);

        hub.publish(&[listing_room("l-1")], test_event("hello"))
            .await;
        hub.publish(&[listing_room("l-1")], test_event("again"))
            .await;

        assert!(second_events.try_recv().is_ok());
        assert!(second_events.try_recv().is_ok());
    }

    async fn seeded_state() -> AppState {
        let config = AppConfig {
            app_env: "test".to_string(),
            port: 0,
            log_level: "info".to_string(),
            data_backend: "memory".to_string(),
            jwt_secret: "test-secret".to_string(),
        };
        let listings = Arc::new(InMemoryListingDirectory::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        users
            .upsert(UserProfile {
                user_id: "owner-a".to_string(),
                name: "Alice".to_string(),
                email: "alice@example.edu".to_string(),
            })
            .await;
        users
            .upsert(UserProfile {
                user_id: "user-b".to_string(),
                name: "Bruno".to_string(),
                email: "bruno@example.edu".to_string(),
            })
            .await;
        listings
            .upsert(ListingSummary {
                listing_id: "l-1".to_string(),
                owner_id: "owner-a".to_string(),
                title: "Blue backpack".to_string(),
                kind: "lost".to_string(),
            })
            .await;
        AppState::with_backends(
            config,
            Arc::new(InMemoryMessageLedger::new()),
            Arc::new(InMemoryNotificationLedger::new()),
            listings,
            users,
        )
    }

    fn service(state: &AppState) -> MessageService {
        MessageService::new(
            state.messages.clone(),
            state.notifications.clone(),
            state.listings.clone(),
            state.users.clone(),
        )
    }

    #[tokio::test]
    async fn sender_frame_reaches_user_rooms_without_a_listing_join() {
        let state = seeded_state().await;
        let hub = state.realtime.clone();
        let service = service(&state);
        let actor = ActorIdentity::with_user_id("user-b");

        // Sender and recipient sit in their user rooms only.
        let (sender_conn, mut sender_events) = hub.connect().await;
        hub.join(&user_room("user-b"), sender_conn).await;
        let (owner_conn, mut owner_events) = hub.connect().await;
        hub.join(&user_room("owner-a"), owner_conn).await;

        handle_client_frame(
            &state,
            &service,
            &actor,
            sender_conn,
            r#"{"event":"message","listing_id":"l-1","body":"is this yours?"}"#,
        )
        .await;

        let echoed = sender_events.try_recv().expect("sender copy");
        assert!(matches!(echoed, ServerEvent::Message { .. }));
        assert!(sender_events.try_recv().is_err());

        let delivered = owner_events.try_recv().expect("owner message");
        let ServerEvent::Message { message } = delivered else {
            panic!("expected message event");
        };
        assert_eq!(message.recipient_id.as_deref(), Some("owner-a"));
        let notified = owner_events.try_recv().expect("owner notification");
        assert!(matches!(notified, ServerEvent::Notification { .. }));
    }

    #[tokio::test]
    async fn malformed_and_dropped_frames_mutate_and_emit_nothing() {
        let state = seeded_state().await;
        let hub = state.realtime.clone();
        let service = service(&state);
        let actor = ActorIdentity::with_user_id("owner-a");

        let (owner_conn, mut owner_events) = hub.connect().await;
        hub.join(&user_room("owner-a"), owner_conn).await;

        handle_client_frame(&state, &service, &actor, owner_conn, "not json").await;
        // Owner with no recipient is a routing drop.
        handle_client_frame(
            &state,
            &service,
            &actor,
            owner_conn,
            r#"{"event":"message","listing_id":"l-1","body":"anyone?"}"#,
        )
        .await;

        assert!(owner_events.try_recv().is_err());
        let stored = state.messages.list_by_listing("l-1").await.expect("list");
        assert!(stored.is_empty());
    }

    #[test]
    fn server_events_are_tagged_by_event_name() {
        let payload = serde_json::to_value(test_event("hello")).expect("serialize");
        assert_eq!(payload["event"], "message");
        assert_eq!(payload["message"]["body"], "hello");
    }

    #[test]
    fn client_frames_parse_join_and_message() {
        let join: ClientEvent =
            serde_json::from_str(r#"{"event":"join","listing_id":"l-1"}"#).expect("join");
        assert!(matches!(join, ClientEvent::Join { listing_id } if listing_id == "l-1"));

        let message: ClientEvent =
            serde_json::from_str(r#"{"event":"message","listing_id":"l-1","body":"hi"}"#)
                .expect("message");
        assert!(matches!(
            message,
            ClientEvent::Message { recipient_id: None, .. }
        ));
    }
}
