use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::guards::User;
use crate::models::conversation::ConversationSummary;
use crate::services::conversation_service::ConversationService;
use crate::state::AppState;

/// GET /api/messages/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    user: User,
) -> Result<Json<Vec<ConversationSummary>>, AppError> {
    let summaries = ConversationService::list(&state.db, user.id).await?;
    Ok(Json(summaries))
}

/// POST /api/messages/conversations/:id — get or create the conversation
/// with the given user.
pub async fn get_or_create_conversation(
    State(state): State<AppState>,
    user: User,
    Path(other): Path<Uuid>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let conversation = ConversationService::get_or_create(&state.db, user.id, other).await?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "id": conversation.id,
            "participants": conversation.participants(),
        })),
    ))
}
