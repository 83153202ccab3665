use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::guards::User;
use crate::models::notification::NotificationDto;
use crate::models::rfc3339_to_ms;
use crate::services::notification_service::NotificationService;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub before: Option<String>,
}

#[derive(Deserialize)]
pub struct MarkReadRequest {
    pub ids: Vec<Uuid>,
}

/// GET /api/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    user: User,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<NotificationDto>>, AppError> {
    let before_ms = match query.before.as_deref() {
        Some(raw) => Some(
            rfc3339_to_ms(raw).ok_or_else(|| AppError::BadRequest("invalid before cursor".into()))?,
        ),
        None => None,
    };

    let notifications =
        NotificationService::list(&state.db, user.id, query.limit, before_ms).await?;
    Ok(Json(notifications))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    user: User,
) -> Result<Json<serde_json::Value>, AppError> {
    let count = NotificationService::unread_count(&state.db, user.id).await?;
    Ok(Json(json!({ "count": count })))
}

/// POST /api/notifications/read {ids}
pub async fn mark_read(
    State(state): State<AppState>,
    user: User,
    Json(body): Json<MarkReadRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let modified = NotificationService::mark_read(&state.db, user.id, &body.ids).await?;
    Ok(Json(json!({ "modified": modified })))
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    user: User,
) -> Result<Json<serde_json::Value>, AppError> {
    let modified = NotificationService::mark_all_read(&state.db, user.id).await?;
    Ok(Json(json!({ "modified": modified })))
}

/// POST /api/notifications/profile-view/:id — dedup window applies.
pub async fn record_profile_view(
    State(state): State<AppState>,
    user: User,
    Path(profile_owner): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let created =
        NotificationService::record_profile_view(&state.db, user.id, profile_owner).await?;
    Ok(Json(json!({ "created": created })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentionsRequest {
    pub content: String,
    pub entity_kind: Option<String>,
    pub entity_id: Option<Uuid>,
    pub url: Option<String>,
}

/// POST /api/notifications/mentions — fan mention notifications out for a
/// piece of content the caller just authored. Unknown usernames are
/// skipped; the author never notifies themselves.
pub async fn notify_mentions(
    State(state): State<AppState>,
    user: User,
    Json(body): Json<MentionsRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let entity = match (body.entity_kind.as_deref(), body.entity_id) {
        (Some(kind), Some(id)) => Some((crate::models::engagement::EntityKind::parse(kind)?, id)),
        _ => None,
    };

    NotificationService::notify_mentions(
        &state.db,
        user.id,
        &body.content,
        entity,
        body.url.as_deref(),
    )
    .await?;

    Ok(Json(json!({ "ok": true })))
}

/// DELETE /api/notifications/:id — recipient-only.
pub async fn delete_notification(
    State(state): State<AppState>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let removed = sqlx::query("DELETE FROM notifications WHERE id = ? AND recipient_id = ?")
        .bind(id)
        .bind(user.id)
        .execute(&state.db)
        .await?
        .rows_affected();

    if removed == 0 {
        return Err(AppError::NotFound);
    }
    Ok(Json(json!({ "deleted": true })))
}
