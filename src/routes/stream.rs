use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::Stream;
use serde::Deserialize;
use tokio_stream::{wrappers::UnboundedReceiverStream, StreamExt};

use crate::middleware::auth::user_from_token;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct StreamParams {
    pub token: Option<String>,
}

/// GET /api/messages/stream?token=
///
/// SSE fallback channel for clients without a websocket. Credential failure
/// is a bare 401 with no body (the EventSource API exposes nothing else).
/// Each open stream gets a `ready` event first, then every event addressed
/// to the user; one user may hold several streams at once.
pub async fn sse_stream(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let user_id = params
        .token
        .as_deref()
        .and_then(|token| user_from_token(token, &state.config.jwt_secret).ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let rx = state.broadcaster.streams.subscribe(user_id).await;

    let ready = tokio_stream::once(Ok(Event::default().event("ready").data("{}")));
    let events = UnboundedReceiverStream::new(rx)
        .map(|envelope| Ok(Event::default().event(envelope.event).data(envelope.data)));

    Ok(Sse::new(ready.chain(events)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}
