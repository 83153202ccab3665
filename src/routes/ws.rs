use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::middleware::auth::user_from_token;
use crate::middleware::guards::ConversationMember;
use crate::realtime::events::RealtimeEvent;
use crate::realtime::Room;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsParams {
    pub token: Option<String>,
    pub conversation_id: Option<Uuid>,
}

/// Inbound client frames. Only typing indicators are accepted; everything
/// else goes through the HTTP API.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WsInboundEvent {
    #[serde(rename_all = "camelCase")]
    Typing {
        conversation_id: Uuid,
        typing: bool,
    },
}

fn token_from(params: &WsParams, headers: &HeaderMap) -> Option<String> {
    params.token.clone().or_else(|| {
        headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|s| s.to_string())
    })
}

/// GET /api/messages/ws?token=&conversationId=
///
/// The socket always joins the caller's user room; with `conversationId` it
/// also joins that conversation's room after a membership check.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let user_id = match token_from(&params, &headers)
        .and_then(|token| user_from_token(&token, &state.config.jwt_secret).ok())
    {
        Some(id) => id,
        None => return StatusCode::UNAUTHORIZED.into_response(),
    };

    if let Some(conversation_id) = params.conversation_id {
        if ConversationMember::verify(&state.db, user_id, conversation_id)
            .await
            .is_err()
        {
            warn!(%user_id, %conversation_id, "websocket rejected: not a participant");
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    ws.on_upgrade(move |socket| handle_socket(state, user_id, params.conversation_id, socket))
}

async fn handle_socket(
    state: AppState,
    user_id: Uuid,
    conversation_id: Option<Uuid>,
    socket: WebSocket,
) {
    let mut rooms = vec![Room::User(user_id)];
    if let Some(conversation_id) = conversation_id {
        rooms.push(Room::Conversation(conversation_id));
    }
    let mut rx = state.broadcaster.rooms.join(&rooms).await;

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            maybe = rx.recv() => {
                match maybe {
                    Some(msg) => {
                        if sender.send(msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(event) = serde_json::from_str::<WsInboundEvent>(&text) {
                            handle_inbound(&state, user_id, event).await;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }
}

async fn handle_inbound(state: &AppState, user_id: Uuid, event: WsInboundEvent) {
    match event {
        WsInboundEvent::Typing {
            conversation_id,
            typing,
        } => {
            // Re-check membership: the frame names an arbitrary conversation.
            let member = match ConversationMember::verify(&state.db, user_id, conversation_id).await
            {
                Ok(member) => member,
                Err(_) => return,
            };

            let out = RealtimeEvent::Typing {
                conversation_id,
                from: user_id,
                typing,
            };
            state.broadcaster.send_to_user(member.peer(), &out).await;
        }
    }
}
