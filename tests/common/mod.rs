#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::SqlitePool;
use tower::ServiceExt;
use uuid::Uuid;

use courier_service::config::Config;
use courier_service::db;
use courier_service::middleware::auth::issue_token;
use courier_service::realtime::Broadcaster;
use courier_service::routes::build_router;
use courier_service::services::media_store::DbMediaStore;
use courier_service::state::AppState;

pub struct TestApp {
    pub db: SqlitePool,
    pub state: AppState,
    pub router: Router,
    // Keeps the database file alive for the duration of the test.
    _dir: tempfile::TempDir,
}

/// Build a full application against a fresh on-disk SQLite database.
///
/// A file-backed database (rather than `:memory:`) gives every pool
/// connection the same schema, which the concurrency tests rely on.
pub async fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().expect("create tempdir");
    let db_path = dir.path().join("courier-test.db");
    let database_url = format!("sqlite://{}", db_path.display());

    let pool = db::init_pool(&database_url).await.expect("init pool");

    let state = AppState {
        db: pool.clone(),
        broadcaster: Broadcaster::new(),
        media: Arc::new(DbMediaStore::new(pool.clone())),
        config: Arc::new(Config::test_defaults()),
    };

    TestApp {
        db: pool,
        router: build_router(state.clone()),
        state,
        _dir: dir,
    }
}

pub async fn create_user(db: &SqlitePool, username: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, username, created_at) VALUES (?, ?, ?)")
        .bind(id)
        .bind(username)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(db)
        .await
        .expect("insert user");
    id
}

pub fn token_for(user: Uuid) -> String {
    issue_token(user, "test-secret", 3600).expect("issue token")
}

/// Drive one request through the router and decode the JSON response.
pub async fn request(
    router: &Router,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("build request"),
        None => builder.body(Body::empty()).expect("build request"),
    };

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router call failed");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();

    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };

    (status, json)
}

/// Raw-body variant for multipart and media requests.
pub async fn request_raw(
    router: &Router,
    method: &str,
    path: &str,
    token: Option<&str>,
    content_type: Option<&str>,
    body: Vec<u8>,
) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }

    let response = router
        .clone()
        .oneshot(builder.body(Body::from(body)).expect("build request"))
        .await
        .expect("router call failed");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes()
        .to_vec();

    (status, bytes, headers)
}

/// Assemble a single-file multipart body.
pub fn multipart_body(
    boundary: &str,
    filename: &str,
    content_type: &str,
    bytes: &[u8],
) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
