mod common;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use common::{create_user, request, spawn_app, token_for};

async fn send(
    app: &common::TestApp,
    from: Uuid,
    to: Uuid,
    content: &str,
) -> serde_json::Value {
    let (status, body) = request(
        &app.router,
        "POST",
        &format!("/api/messages/{to}/text"),
        Some(&token_for(from)),
        Some(json!({ "content": content })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn sent_message_carries_sender_read_receipt() {
    let app = spawn_app().await;
    let alice = create_user(&app.db, "alice").await;
    let bob = create_user(&app.db, "bob").await;

    let message = send(&app, alice, bob, "hello bob").await;

    assert_eq!(message["type"], "text");
    assert_eq!(message["content"], "hello bob");
    assert_eq!(message["sender"], alice.to_string());
    let read_by = message["readBy"].as_array().unwrap();
    assert_eq!(read_by.len(), 1);
    assert_eq!(read_by[0], alice.to_string());
    assert!(message["deliveredBy"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn empty_content_is_rejected() {
    let app = spawn_app().await;
    let alice = create_user(&app.db, "alice").await;
    let bob = create_user(&app.db, "bob").await;

    let (status, _) = request(
        &app.router,
        "POST",
        &format!("/api/messages/{bob}/text"),
        Some(&token_for(alice)),
        Some(json!({ "content": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn history_is_ascending_and_paginates_backwards() {
    let app = spawn_app().await;
    let alice = create_user(&app.db, "alice").await;
    let bob = create_user(&app.db, "bob").await;

    let mut conversation_id = String::new();
    for i in 0..5 {
        let message = send(&app, alice, bob, &format!("msg {i}")).await;
        conversation_id = message["conversationId"].as_str().unwrap().to_string();
        // Distinct created_at values keep the cursor deterministic.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let (status, history) = request(
        &app.router,
        "GET",
        &format!("/api/messages/{conversation_id}?limit=3"),
        Some(&token_for(bob)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let window = history.as_array().unwrap();
    assert_eq!(window.len(), 3);
    assert_eq!(window[0]["content"], "msg 2");
    assert_eq!(window[2]["content"], "msg 4");

    // Page older messages with the first entry's timestamp as cursor.
    let cursor = window[0]["createdAt"].as_str().unwrap();
    let (status, older) = request(
        &app.router,
        "GET",
        &format!(
            "/api/messages/{conversation_id}?limit=3&before={}",
            urlencode(cursor)
        ),
        Some(&token_for(bob)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let older = older.as_array().unwrap();
    assert_eq!(older.len(), 2);
    assert_eq!(older[0]["content"], "msg 0");
    assert_eq!(older[1]["content"], "msg 1");
}

#[tokio::test]
async fn history_requires_membership() {
    let app = spawn_app().await;
    let alice = create_user(&app.db, "alice").await;
    let bob = create_user(&app.db, "bob").await;
    let eve = create_user(&app.db, "eve").await;

    let message = send(&app, alice, bob, "private").await;
    let conversation_id = message["conversationId"].as_str().unwrap();

    let (status, _) = request(
        &app.router,
        "GET",
        &format!("/api/messages/{conversation_id}"),
        Some(&token_for(eve)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn read_set_only_grows() {
    let app = spawn_app().await;
    let alice = create_user(&app.db, "alice").await;
    let bob = create_user(&app.db, "bob").await;

    let first = send(&app, alice, bob, "one").await;
    let conversation_id = first["conversationId"].as_str().unwrap().to_string();

    let (status, marked) = request(
        &app.router,
        "POST",
        &format!("/api/messages/{conversation_id}/read"),
        Some(&token_for(bob)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(marked["modified"], 1);
    assert_eq!(marked["messageIds"].as_array().unwrap().len(), 1);

    // Marking again adds nothing but still reports the full set.
    let (_, again) = request(
        &app.router,
        "POST",
        &format!("/api/messages/{conversation_id}/read"),
        Some(&token_for(bob)),
        None,
    )
    .await;
    assert_eq!(again["modified"], 0);
    assert_eq!(again["messageIds"].as_array().unwrap().len(), 1);

    // A new message grows the set; the old receipt survives.
    send(&app, alice, bob, "two").await;
    let (_, grown) = request(
        &app.router,
        "POST",
        &format!("/api/messages/{conversation_id}/read"),
        Some(&token_for(bob)),
        None,
    )
    .await;
    assert_eq!(grown["modified"], 1);
    assert_eq!(grown["messageIds"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn delivered_receipts_are_tracked_separately() {
    let app = spawn_app().await;
    let alice = create_user(&app.db, "alice").await;
    let bob = create_user(&app.db, "bob").await;

    let message = send(&app, alice, bob, "ping").await;
    let conversation_id = message["conversationId"].as_str().unwrap();

    let (status, delivered) = request(
        &app.router,
        "POST",
        &format!("/api/messages/{conversation_id}/delivered"),
        Some(&token_for(bob)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivered["modified"], 1);

    // Delivery does not imply read.
    let (_, list) = request(
        &app.router,
        "GET",
        "/api/messages/conversations",
        Some(&token_for(bob)),
        None,
    )
    .await;
    assert_eq!(list[0]["unreadCount"], 1);
}

#[tokio::test]
async fn only_the_sender_may_edit_and_only_text() {
    let app = spawn_app().await;
    let alice = create_user(&app.db, "alice").await;
    let bob = create_user(&app.db, "bob").await;

    let message = send(&app, alice, bob, "tpyo").await;
    let message_id = message["id"].as_str().unwrap();

    // Non-sender: 403.
    let (status, _) = request(
        &app.router,
        "PATCH",
        &format!("/api/messages/{message_id}"),
        Some(&token_for(bob)),
        Some(json!({ "content": "hijack" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Sender: ok.
    let (status, edited) = request(
        &app.router,
        "PATCH",
        &format!("/api/messages/{message_id}"),
        Some(&token_for(alice)),
        Some(json!({ "content": "typo" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["content"], "typo");

    // A media message cannot be edited.
    sqlx::query("UPDATE messages SET kind = 'image' WHERE id = ?")
        .bind(Uuid::parse_str(message_id).unwrap())
        .execute(&app.db)
        .await
        .unwrap();
    let (status, _) = request(
        &app.router,
        "PATCH",
        &format!("/api/messages/{message_id}"),
        Some(&token_for(alice)),
        Some(json!({ "content": "again" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_is_sender_only_and_cascades() {
    let app = spawn_app().await;
    let alice = create_user(&app.db, "alice").await;
    let bob = create_user(&app.db, "bob").await;

    let message = send(&app, alice, bob, "remove me").await;
    let message_id = message["id"].as_str().unwrap();
    let conversation_id = message["conversationId"].as_str().unwrap();

    let (status, _) = request(
        &app.router,
        "DELETE",
        &format!("/api/messages/{message_id}"),
        Some(&token_for(bob)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, tombstone) = request(
        &app.router,
        "DELETE",
        &format!("/api/messages/{message_id}"),
        Some(&token_for(alice)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tombstone["conversationId"], conversation_id);
    assert_eq!(tombstone["messageId"], message_id);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
    let receipts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM message_receipts")
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(receipts, 0, "receipts cascade with the message");
}

#[tokio::test]
async fn search_is_literal_and_case_insensitive() {
    let app = spawn_app().await;
    let alice = create_user(&app.db, "alice").await;
    let bob = create_user(&app.db, "bob").await;

    send(&app, alice, bob, "The 100% Plan").await;
    let message = send(&app, alice, bob, "unrelated").await;
    let conversation_id = message["conversationId"].as_str().unwrap();

    // `%` must match literally, not as a wildcard.
    let (status, hits) = request(
        &app.router,
        "GET",
        &format!("/api/messages/{conversation_id}/search?q=100%25"),
        Some(&token_for(bob)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hits.as_array().unwrap().len(), 1);

    let (_, hits) = request(
        &app.router,
        "GET",
        &format!("/api/messages/{conversation_id}/search?q=the"),
        Some(&token_for(bob)),
        None,
    )
    .await;
    assert_eq!(hits.as_array().unwrap().len(), 1);

    // Empty query returns an empty list, not everything.
    let (_, hits) = request(
        &app.router,
        "GET",
        &format!("/api/messages/{conversation_id}/search?q="),
        Some(&token_for(bob)),
        None,
    )
    .await;
    assert!(hits.as_array().unwrap().is_empty());
}

fn urlencode(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('+', "%2B")
        .replace(':', "%3A")
}
