use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::guards::{ConversationMember, User};
use crate::models::conversation::Conversation;
use crate::models::message::{MessageDto, MessageKind, ReceiptKind};
use crate::models::rfc3339_to_ms;
use crate::realtime::events::RealtimeEvent;
use crate::services::message_service::MessageService;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTextRequest {
    pub content: String,
    pub reply_to: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub before: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct TypingRequest {
    pub typing: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    pub content: String,
}

/// POST /api/messages/:id/text — send a text message to user `:id`.
pub async fn send_text(
    State(state): State<AppState>,
    user: User,
    Path(other): Path<Uuid>,
    Json(body): Json<SendTextRequest>,
) -> Result<(StatusCode, Json<MessageDto>), AppError> {
    let (conversation, dto) = MessageService::send(
        &state.db,
        user.id,
        other,
        MessageKind::Text,
        &body.content,
        None,
        body.reply_to,
    )
    .await?;

    broadcast_created(&state, &conversation, dto.clone()).await;

    Ok((StatusCode::CREATED, Json(dto)))
}

/// GET /api/messages/:id — conversation history.
pub async fn get_history(
    State(state): State<AppState>,
    user: User,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageDto>>, AppError> {
    ConversationMember::verify(&state.db, user.id, conversation_id).await?;

    let before_ms = match query.before.as_deref() {
        Some(raw) => Some(
            rfc3339_to_ms(raw).ok_or_else(|| AppError::BadRequest("invalid before cursor".into()))?,
        ),
        None => None,
    };

    let messages =
        MessageService::history(&state.db, conversation_id, query.limit, before_ms).await?;
    Ok(Json(messages))
}

/// GET /api/messages/:id/search — literal substring search.
pub async fn search_messages(
    State(state): State<AppState>,
    user: User,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<MessageDto>>, AppError> {
    ConversationMember::verify(&state.db, user.id, conversation_id).await?;

    let messages = MessageService::search(
        &state.db,
        conversation_id,
        query.q.as_deref().unwrap_or(""),
        query.limit,
    )
    .await?;
    Ok(Json(messages))
}

/// POST /api/messages/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    user: User,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    mark(state, user, conversation_id, ReceiptKind::Read).await
}

/// POST /api/messages/:id/delivered
pub async fn mark_delivered(
    State(state): State<AppState>,
    user: User,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    mark(state, user, conversation_id, ReceiptKind::Delivered).await
}

async fn mark(
    state: AppState,
    user: User,
    conversation_id: Uuid,
    kind: ReceiptKind,
) -> Result<Json<serde_json::Value>, AppError> {
    let member = ConversationMember::verify(&state.db, user.id, conversation_id).await?;

    let (modified, ids) = MessageService::mark(&state.db, user.id, conversation_id, kind).await?;

    let event = match kind {
        ReceiptKind::Read => RealtimeEvent::MessagesRead {
            conversation_id,
            reader: user.id,
            message_ids: ids.clone(),
        },
        ReceiptKind::Delivered => RealtimeEvent::MessagesDelivered {
            conversation_id,
            deliverer: user.id,
            message_ids: ids.clone(),
        },
    };
    state
        .broadcaster
        .broadcast(conversation_id, &member.conversation.participants(), &event)
        .await;

    Ok(Json(json!({ "modified": modified, "messageIds": ids })))
}

/// POST /api/messages/typing/:id — fire a typing indicator at user `:id`.
/// Nothing is persisted; without an existing conversation this is a no-op.
pub async fn send_typing(
    State(state): State<AppState>,
    user: User,
    Path(other): Path<Uuid>,
    Json(body): Json<TypingRequest>,
) -> Result<StatusCode, AppError> {
    let (user_low, user_high) = Conversation::canonical_pair(user.id, other);
    let conversation = sqlx::query_as::<_, Conversation>(
        "SELECT * FROM conversations WHERE user_low = ? AND user_high = ?",
    )
    .bind(user_low)
    .bind(user_high)
    .fetch_optional(&state.db)
    .await?;

    if let Some(conversation) = conversation {
        let event = RealtimeEvent::Typing {
            conversation_id: conversation.id,
            from: user.id,
            typing: body.typing,
        };
        state.broadcaster.send_to_user(other, &event).await;
    }

    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/messages/:id — edit a text message's content.
pub async fn edit_message(
    State(state): State<AppState>,
    user: User,
    Path(message_id): Path<Uuid>,
    Json(body): Json<EditRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let message = MessageService::edit(&state.db, user.id, message_id, &body.content).await?;

    let conversation =
        sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = ?")
            .bind(message.conversation_id)
            .fetch_one(&state.db)
            .await?;

    let event = RealtimeEvent::MessageUpdated {
        id: message_id,
        conversation_id: message.conversation_id,
        kind: message.kind.clone(),
        content: message.content.clone(),
    };
    state
        .broadcaster
        .broadcast(message.conversation_id, &conversation.participants(), &event)
        .await;

    Ok(Json(json!({ "id": message_id, "content": message.content })))
}

/// DELETE /api/messages/:id — hard delete, broadcast the tombstone.
pub async fn delete_message(
    State(state): State<AppState>,
    user: User,
    Path(message_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let message = MessageService::delete(&state.db, user.id, message_id).await?;

    let conversation =
        sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = ?")
            .bind(message.conversation_id)
            .fetch_one(&state.db)
            .await?;

    let event = RealtimeEvent::MessageDeleted {
        conversation_id: message.conversation_id,
        message_id,
    };
    state
        .broadcaster
        .broadcast(message.conversation_id, &conversation.participants(), &event)
        .await;

    Ok(Json(json!({
        "conversationId": message.conversation_id,
        "messageId": message_id,
    })))
}

/// Fan a freshly created message out to the conversation room and both
/// participants' channels.
pub(crate) async fn broadcast_created(
    state: &AppState,
    conversation: &Conversation,
    dto: MessageDto,
) {
    let event = RealtimeEvent::MessageCreated { message: dto };
    state
        .broadcaster
        .broadcast(conversation.id, &conversation.participants(), &event)
        .await;
}
