use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::guards::User;
use crate::models::message::{MessageDto, MessageKind};
use crate::routes::messages::broadcast_created;
use crate::services::message_service::MessageService;
use crate::state::AppState;

/// Upload cap, enforced before the blob is stored.
pub const MEDIA_MAX_BYTES: usize = 25 * 1024 * 1024;

#[derive(Deserialize)]
pub struct MediaQuery {
    pub download: Option<String>,
}

/// POST /api/messages/:id/media — multipart upload of one `file` part,
/// sent as an image or voice-note message to user `:id`.
pub async fn send_media(
    State(state): State<AppState>,
    user: User,
    Path(other): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<MessageDto>), AppError> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(format!("invalid multipart body: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .ok_or_else(|| AppError::BadRequest("file content type is required".into()))?
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::BadRequest(format!("failed to read upload: {err}")))?;
        upload = Some((filename, content_type, bytes));
        break;
    }

    let (filename, content_type, bytes) =
        upload.ok_or_else(|| AppError::BadRequest("file field is required".into()))?;

    if bytes.len() > state.config.media_max_bytes {
        return Err(AppError::BadRequest("file exceeds the upload size limit".into()));
    }

    let mime: mime::Mime = content_type
        .parse()
        .map_err(|_| AppError::BadRequest("unrecognized content type".into()))?;
    let (kind, placeholder) = match mime.type_() {
        mime::IMAGE => (MessageKind::Image, "📷 Image"),
        mime::AUDIO => (MessageKind::Audio, "🎤 Voice note"),
        _ => {
            return Err(AppError::BadRequest(
                "only image and audio uploads are allowed".into(),
            ))
        }
    };

    // Store the blob first: a failed upload must not leave a message row.
    let media_url = state.media.put(&filename, &content_type, bytes).await?;

    let (conversation, dto) = MessageService::send(
        &state.db,
        user.id,
        other,
        kind,
        placeholder,
        Some(media_url),
        None,
    )
    .await?;

    broadcast_created(&state, &conversation, dto.clone()).await;

    Ok((StatusCode::CREATED, Json(dto)))
}

/// GET /api/messages/media/:id — public blob fetch. `?download=1` switches
/// the disposition to attachment.
pub async fn get_media(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<MediaQuery>,
) -> Result<impl IntoResponse, AppError> {
    let media = state.media.get(id).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&media.content_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );
    if query.download.as_deref() == Some("1") {
        let disposition = format!(
            "attachment; filename=\"{}\"",
            media.filename.replace('"', "")
        );
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }

    Ok((headers, media.bytes))
}
