use axum::extract::{Extension, Path, State};
use axum::{
    Json, Router, middleware,
    routing::{delete, get, patch},
};
use serde::Serialize;
use serde_json::{Value, json};

use achados_domain::{
    cleanup::CleanupService,
    conversations::{Conversation, ConversationService},
    error::DomainError,
    identity::ActorIdentity,
    messaging::{Message, MessageService},
    notifications::{Notification, NotificationService},
};

use crate::middleware::AuthContext;
use crate::{error::ApiError, middleware as app_middleware, realtime, state::AppState};

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/v1/listings/:listing_id/messages",
            get(list_listing_messages),
        )
        .route("/v1/chats", get(list_chats))
        .route("/v1/chats/:listing_id", delete(delete_chat))
        .route("/v1/notifications", get(list_notifications))
        .route(
            "/v1/notifications/:notification_id/read",
            patch(mark_notification_read),
        )
        .route("/v1/notifications/read-all", patch(mark_all_notifications_read))
        .route_layer(middleware::from_fn(app_middleware::require_auth_middleware));

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/v1/ws", get(realtime::ws_handler))
        .merge(protected)
        .layer(app_middleware::timeout_layer())
        .layer(app_middleware::trace_layer())
        .layer(app_middleware::set_request_id_layer())
        .layer(app_middleware::propagate_request_id_layer())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::auth_middleware,
        ));

    if !state.config.app_env.eq_ignore_ascii_case("test") {
        app = app.layer(app_middleware::rate_limit_layer());
    }

    app.with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    environment: String,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.app_env.clone(),
    })
}

async fn list_listing_messages(
    State(state): State<AppState>,
    Path(listing_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let service = MessageService::new(
        state.messages.clone(),
        state.notifications.clone(),
        state.listings.clone(),
        state.users.clone(),
    );
    let messages = service.history(&listing_id).await.map_err(map_domain_error)?;
    Ok(Json(messages))
}

async fn list_chats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let actor = actor_identity(&auth)?;
    let service = ConversationService::new(
        state.messages.clone(),
        state.listings.clone(),
        state.users.clone(),
    );
    let conversations = service
        .list_conversations(&actor)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(conversations))
}

async fn delete_chat(
    State(state): State<AppState>,
    Path(listing_id): Path<String>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Value>, ApiError> {
    let actor = actor_identity(&auth)?;
    let service = CleanupService::new(
        state.messages.clone(),
        state.notifications.clone(),
        state.listings.clone(),
    );
    service
        .delete_conversation(&actor, &listing_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(json!({ "success": true })))
}

async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let actor = actor_identity(&auth)?;
    let service = NotificationService::new(state.notifications.clone());
    let notifications = service.list(&actor).await.map_err(map_domain_error)?;
    Ok(Json(notifications))
}

async fn mark_notification_read(
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Notification>, ApiError> {
    let actor = actor_identity(&auth)?;
    let service = NotificationService::new(state.notifications.clone());
    let notification = service
        .mark_read(&actor, &notification_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(notification))
}

async fn mark_all_notifications_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Value>, ApiError> {
    let actor = actor_identity(&auth)?;
    let service = NotificationService::new(state.notifications.clone());
    service.mark_all_read(&actor).await.map_err(map_domain_error)?;
    Ok(Json(json!({ "success": true })))
}

fn actor_identity(auth: &AuthContext) -> Result<ActorIdentity, ApiError> {
    let user_id = auth
        .user_id
        .as_ref()
        .filter(|user_id| !user_id.trim().is_empty())
        .ok_or(ApiError::Unauthorized)?;
    Ok(ActorIdentity::with_user_id(user_id.to_string()))
}

fn map_domain_error(err: DomainError) -> ApiError {
    match err {
        DomainError::Validation(message) => ApiError::Validation(message),
        DomainError::Forbidden => ApiError::Forbidden,
        DomainError::NotFound => ApiError::NotFound,
    }
}
