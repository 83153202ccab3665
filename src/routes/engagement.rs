use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::user_from_token;
use crate::middleware::guards::User;
use crate::models::engagement::{EdgeKind, EntityCounters, EntityKind, ToggleResult};
use crate::models::notification::NotificationKind;
use crate::services::engagement_service::EngagementService;
use crate::services::notification_service::NotificationService;
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct ToggleRequest {
    /// Entity owner, when the caller wants an engagement notification sent.
    pub owner: Option<Uuid>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HitRequest {
    pub anon_id: Option<String>,
}

/// POST /api/engagement/:entityKind/:entityId/like/toggle
pub async fn toggle_like(
    State(state): State<AppState>,
    user: User,
    Path((entity_kind, entity_id)): Path<(String, Uuid)>,
    body: Option<Json<ToggleRequest>>,
) -> Result<Json<ToggleResult>, AppError> {
    let entity_kind = EntityKind::parse(&entity_kind)?;
    let result =
        EngagementService::toggle(&state.db, user.id, EdgeKind::Like, entity_kind, entity_id)
            .await?;

    // Notify the owner on like, never on unlike. Best effort: a failure is
    // logged and the toggle response is unaffected.
    if result.active {
        if let Some(owner) = body.and_then(|Json(b)| b.owner) {
            let db = state.db.clone();
            let actor = user.id;
            tokio::spawn(async move {
                if let Err(err) = NotificationService::create(
                    &db,
                    owner,
                    actor,
                    NotificationKind::Like,
                    Some((entity_kind, entity_id)),
                    None,
                )
                .await
                {
                    tracing::warn!(error = %err, "like notification failed");
                }
            });
        }
    }

    Ok(Json(result))
}

/// POST /api/engagement/:entityKind/:entityId/bookmark/toggle
pub async fn toggle_bookmark(
    State(state): State<AppState>,
    user: User,
    Path((entity_kind, entity_id)): Path<(String, Uuid)>,
) -> Result<Json<ToggleResult>, AppError> {
    let entity_kind = EntityKind::parse(&entity_kind)?;
    let result =
        EngagementService::toggle(&state.db, user.id, EdgeKind::Bookmark, entity_kind, entity_id)
            .await?;
    Ok(Json(result))
}

/// POST /api/engagement/:entityKind/:entityId/kudos — one-directional;
/// giving twice is a no-op.
pub async fn give_kudos(
    State(state): State<AppState>,
    user: User,
    Path((entity_kind, entity_id)): Path<(String, Uuid)>,
    body: Option<Json<ToggleRequest>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let entity_kind = EntityKind::parse(&entity_kind)?;
    let (given, count) =
        EngagementService::give_kudos(&state.db, user.id, entity_kind, entity_id).await?;

    if given {
        if let Some(owner) = body.and_then(|Json(b)| b.owner) {
            let db = state.db.clone();
            let actor = user.id;
            tokio::spawn(async move {
                if let Err(err) = NotificationService::create(
                    &db,
                    owner,
                    actor,
                    NotificationKind::Kudos,
                    Some((entity_kind, entity_id)),
                    None,
                )
                .await
                {
                    tracing::warn!(error = %err, "kudos notification failed");
                }
            });
        }
    }

    Ok(Json(json!({ "given": given, "count": count })))
}

/// POST /api/engagement/:entityKind/:entityId/hit — optional auth. An
/// anonymous id plus a later authenticated hit from the same person counts
/// once.
pub async fn record_hit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((entity_kind, entity_id)): Path<(String, Uuid)>,
    body: Option<Json<HitRequest>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let entity_kind = EntityKind::parse(&entity_kind)?;

    // This endpoint sits outside the auth layer; a bearer token is honored
    // when present and valid, otherwise the hit is anonymous.
    let actor = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .and_then(|token| user_from_token(token, &state.config.jwt_secret).ok());

    let anon_id = body.and_then(|Json(b)| b.anon_id);

    let (deduped, count) = EngagementService::record_hit(
        &state.db,
        actor,
        anon_id.as_deref(),
        entity_kind,
        entity_id,
    )
    .await?;

    Ok(Json(json!({ "deduped": deduped, "count": count })))
}

/// GET /api/engagement/:entityKind/:entityId/counters
pub async fn get_counters(
    State(state): State<AppState>,
    _user: User,
    Path((entity_kind, entity_id)): Path<(String, Uuid)>,
) -> Result<Json<EntityCounters>, AppError> {
    let entity_kind = EntityKind::parse(&entity_kind)?;
    let counters = EngagementService::counters(&state.db, entity_kind, entity_id).await?;
    Ok(Json(counters))
}
