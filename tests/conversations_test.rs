mod common;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use common::{create_user, request, spawn_app, token_for};

#[tokio::test]
async fn conversation_is_symmetric() {
    let app = spawn_app().await;
    let alice = create_user(&app.db, "alice").await;
    let bob = create_user(&app.db, "bob").await;

    let (status, from_alice) = request(
        &app.router,
        "POST",
        &format!("/api/messages/conversations/{bob}"),
        Some(&token_for(alice)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, from_bob) = request(
        &app.router,
        "POST",
        &format!("/api/messages/conversations/{alice}"),
        Some(&token_for(bob)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(from_alice["id"], from_bob["id"]);
}

#[tokio::test]
async fn concurrent_get_or_create_converges_on_one_conversation() {
    let app = spawn_app().await;
    let alice = create_user(&app.db, "alice").await;
    let bob = create_user(&app.db, "bob").await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let router = app.router.clone();
        let (me, other) = if i % 2 == 0 { (alice, bob) } else { (bob, alice) };
        handles.push(tokio::spawn(async move {
            let (status, body) = request(
                &router,
                "POST",
                &format!("/api/messages/conversations/{other}"),
                Some(&token_for(me)),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            body["id"].as_str().unwrap().to_string()
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1, "all callers must land on the same conversation");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn self_conversation_is_rejected() {
    let app = spawn_app().await;
    let alice = create_user(&app.db, "alice").await;

    let (status, body) = request(
        &app.router,
        "POST",
        &format!("/api/messages/conversations/{alice}"),
        Some(&token_for(alice)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn unknown_peer_is_not_found() {
    let app = spawn_app().await;
    let alice = create_user(&app.db, "alice").await;

    let (status, _) = request(
        &app.router,
        "POST",
        &format!("/api/messages/conversations/{}", Uuid::new_v4()),
        Some(&token_for(alice)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn conversation_list_carries_unread_counts() {
    let app = spawn_app().await;
    let alice = create_user(&app.db, "alice").await;
    let bob = create_user(&app.db, "bob").await;

    for content in ["first", "second", "third"] {
        let (status, _) = request(
            &app.router,
            "POST",
            &format!("/api/messages/{bob}/text"),
            Some(&token_for(alice)),
            Some(json!({ "content": content })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // Bob sees three unread; Alice (the sender) sees none.
    let (status, list) = request(
        &app.router,
        "GET",
        "/api/messages/conversations",
        Some(&token_for(bob)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["unreadCount"], 3);
    assert_eq!(list[0]["lastMessage"], "third");
    assert_eq!(list[0]["otherUser"]["username"], "alice");

    let (_, list) = request(
        &app.router,
        "GET",
        "/api/messages/conversations",
        Some(&token_for(alice)),
        None,
    )
    .await;
    assert_eq!(list[0]["unreadCount"], 0);
    assert_eq!(list[0]["otherUser"]["username"], "bob");
}

#[tokio::test]
async fn empty_conversation_has_null_last_message_at() {
    let app = spawn_app().await;
    let alice = create_user(&app.db, "alice").await;
    let bob = create_user(&app.db, "bob").await;

    let (status, _) = request(
        &app.router,
        "POST",
        &format!("/api/messages/conversations/{bob}"),
        Some(&token_for(alice)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, list) = request(
        &app.router,
        "GET",
        "/api/messages/conversations",
        Some(&token_for(alice)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(list[0]["lastMessageAt"].is_null());

    let (status, _) = request(
        &app.router,
        "POST",
        &format!("/api/messages/{bob}/text"),
        Some(&token_for(alice)),
        Some(json!({ "content": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, list) = request(
        &app.router,
        "GET",
        "/api/messages/conversations",
        Some(&token_for(alice)),
        None,
    )
    .await;
    assert!(list[0]["lastMessageAt"].is_string());
}
