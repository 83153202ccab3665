use axum::{http::StatusCode, response::IntoResponse, Json};
use once_cell::sync::Lazy;
use serde_json::json;

use crate::error::AppError;

static DEVELOPMENT: Lazy<bool> = Lazy::new(|| {
    matches!(
        std::env::var("APP_ENV").as_deref(),
        Ok("development") | Ok("dev")
    )
});

/// Map a domain error to an HTTP status and JSON body.
///
/// Server-side failures keep their detail out of responses outside of
/// development; the full error is logged instead.
pub fn map_error(err: &AppError) -> (StatusCode, String) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let message = if status.is_server_error() && !*DEVELOPMENT {
        "Internal server error".to_string()
    } else {
        err.to_string()
    };

    (status, message)
}

pub fn into_response(err: AppError) -> axum::response::Response {
    if err.status_code() >= 500 {
        tracing::error!(error = %err, "request failed");
    }
    let (status, message) = map_error(&err);
    (status, Json(json!({ "message": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_keeps_its_message() {
        let (status, message) = map_error(&AppError::BadRequest("emoji required".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "emoji required");
    }

    #[test]
    fn not_found_maps_to_404() {
        let (status, _) = map_error(&AppError::NotFound);
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn unauthorized_maps_to_401() {
        let (status, message) = map_error(&AppError::Unauthorized);
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(message, "Unauthorized");
    }
}
