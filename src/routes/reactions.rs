use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::guards::User;
use crate::models::conversation::Conversation;
use crate::realtime::events::RealtimeEvent;
use crate::services::message_service::MessageService;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddReactionRequest {
    pub emoji: String,
}

/// POST /api/messages/reactions/:id — set the caller's reaction on a
/// message. A second react replaces the first.
pub async fn add_reaction(
    State(state): State<AppState>,
    user: User,
    Path(message_id): Path<Uuid>,
    Json(body): Json<AddReactionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let message = MessageService::react(&state.db, user.id, message_id, &body.emoji).await?;

    broadcast_reaction(
        &state,
        message.conversation_id,
        message_id,
        user.id,
        Some(body.emoji.trim().to_string()),
    )
    .await?;

    Ok(Json(json!({ "messageId": message_id, "emoji": body.emoji.trim() })))
}

/// DELETE /api/messages/reactions/:id — clear the caller's reaction.
/// Clearing an absent reaction still succeeds.
pub async fn remove_reaction(
    State(state): State<AppState>,
    user: User,
    Path(message_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let message = MessageService::unreact(&state.db, user.id, message_id).await?;

    broadcast_reaction(&state, message.conversation_id, message_id, user.id, None).await?;

    Ok(Json(json!({ "messageId": message_id, "emoji": null })))
}

async fn broadcast_reaction(
    state: &AppState,
    conversation_id: Uuid,
    message_id: Uuid,
    actor: Uuid,
    emoji: Option<String>,
) -> Result<(), AppError> {
    let conversation =
        sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .fetch_one(&state.db)
            .await?;

    let event = RealtimeEvent::ReactionUpdated {
        conversation_id,
        message_id,
        user: actor,
        emoji,
    };
    state
        .broadcaster
        .broadcast(conversation_id, &conversation.participants(), &event)
        .await;
    Ok(())
}
