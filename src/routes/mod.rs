use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;

use crate::middleware::auth::auth_middleware;
use crate::middleware::logging::add_tracing;
use crate::state::AppState;

pub mod conversations;
pub mod engagement;
pub mod media;
pub mod messages;
pub mod notifications;
pub mod reactions;
pub mod stream;
pub mod ws;

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "service": "courier-service" }))
}

/// Assemble the full application router.
///
/// Credential-in-query channels (SSE, websocket), public media fetches and
/// the optional-auth hit endpoint bypass the bearer middleware; everything
/// else sits behind it.
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/api/messages/stream", get(stream::sse_stream))
        .route("/api/messages/ws", get(ws::ws_handler))
        .route("/api/messages/media/:id", get(media::get_media))
        .route(
            "/api/engagement/:entity_kind/:entity_id/hit",
            post(engagement::record_hit),
        );

    let messaging = Router::new()
        .route("/api/messages/conversations", get(conversations::list_conversations))
        .route(
            "/api/messages/conversations/:id",
            post(conversations::get_or_create_conversation),
        )
        .route(
            "/api/messages/:id",
            get(messages::get_history)
                .patch(messages::edit_message)
                .delete(messages::delete_message),
        )
        .route("/api/messages/:id/text", post(messages::send_text))
        .route(
            "/api/messages/:id/media",
            post(media::send_media).layer(DefaultBodyLimit::max(media::MEDIA_MAX_BYTES + 16 * 1024)),
        )
        .route("/api/messages/:id/read", post(messages::mark_read))
        .route("/api/messages/:id/delivered", post(messages::mark_delivered))
        .route("/api/messages/:id/search", get(messages::search_messages))
        .route("/api/messages/typing/:id", post(messages::send_typing))
        .route(
            "/api/messages/reactions/:id",
            post(reactions::add_reaction).delete(reactions::remove_reaction),
        );

    let engagement = Router::new()
        .route(
            "/api/engagement/:entity_kind/:entity_id/like/toggle",
            post(engagement::toggle_like),
        )
        .route(
            "/api/engagement/:entity_kind/:entity_id/bookmark/toggle",
            post(engagement::toggle_bookmark),
        )
        .route(
            "/api/engagement/:entity_kind/:entity_id/kudos",
            post(engagement::give_kudos),
        )
        .route(
            "/api/engagement/:entity_kind/:entity_id/counters",
            get(engagement::get_counters),
        );

    let notifications = Router::new()
        .route("/api/notifications", get(notifications::list_notifications))
        .route("/api/notifications/unread-count", get(notifications::unread_count))
        .route("/api/notifications/read", post(notifications::mark_read))
        .route("/api/notifications/read-all", post(notifications::mark_all_read))
        .route("/api/notifications/mentions", post(notifications::notify_mentions))
        .route(
            "/api/notifications/profile-view/:id",
            post(notifications::record_profile_view),
        )
        .route(
            "/api/notifications/:id",
            delete(notifications::delete_notification),
        );

    let protected = messaging
        .merge(engagement)
        .merge(notifications)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    add_tracing(public.merge(protected)).with_state(state)
}
