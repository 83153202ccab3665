use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod events;
pub mod sse;

use events::RealtimeEvent;
use sse::StreamRegistry;

/// A websocket fan-out target. Sockets join the room for each conversation
/// they care about plus their own user room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    Conversation(Uuid),
    User(Uuid),
}

/// Room membership for live websocket connections.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<Room, Vec<UnboundedSender<Message>>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one socket in several rooms; all of them feed the same
    /// receiver.
    pub async fn join(&self, rooms: &[Room]) -> UnboundedReceiver<Message> {
        let (tx, rx) = unbounded_channel();
        let mut guard = self.inner.write().await;
        for room in rooms {
            guard.entry(*room).or_default().push(tx.clone());
        }
        rx
    }

    /// Send to every live socket in the room, dropping closed ones.
    pub async fn broadcast(&self, room: Room, msg: Message) {
        let mut guard = self.inner.write().await;
        if let Some(list) = guard.get_mut(&room) {
            list.retain(|sender| sender.send(msg.clone()).is_ok());
        }
    }
}

/// Fans realtime events out to websocket rooms and SSE streams.
///
/// Delivery is best effort: a dead subscriber never fails the request that
/// produced the event.
#[derive(Default, Clone)]
pub struct Broadcaster {
    pub rooms: ConnectionRegistry,
    pub streams: StreamRegistry,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize the event once, then deliver it to the conversation room,
    /// each recipient's user room, and each recipient's SSE streams.
    pub async fn broadcast(&self, conversation_id: Uuid, recipients: &[Uuid], event: &RealtimeEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize realtime event");
                return;
            }
        };

        self.rooms
            .broadcast(
                Room::Conversation(conversation_id),
                Message::Text(payload.clone()),
            )
            .await;

        for user in recipients {
            self.rooms
                .broadcast(Room::User(*user), Message::Text(payload.clone()))
                .await;
            self.streams
                .send(*user, event.event_name(), payload.clone())
                .await;
        }
    }

    /// Deliver to a single user's rooms and streams only. Used for events
    /// scoped to one recipient, like typing indicators.
    pub async fn send_to_user(&self, user: Uuid, event: &RealtimeEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize realtime event");
                return;
            }
        };

        self.rooms
            .broadcast(Room::User(user), Message::Text(payload.clone()))
            .await;
        self.streams.send(user, event.event_name(), payload).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_room_member() {
        let registry = ConnectionRegistry::new();
        let room = Room::Conversation(Uuid::new_v4());
        let mut a = registry.join(&[room]).await;
        let mut b = registry.join(&[room]).await;

        registry.broadcast(room, Message::Text("hi".into())).await;

        assert_eq!(a.recv().await, Some(Message::Text("hi".into())));
        assert_eq!(b.recv().await, Some(Message::Text("hi".into())));
    }

    #[tokio::test]
    async fn rooms_are_isolated() {
        let registry = ConnectionRegistry::new();
        let room_a = Room::Conversation(Uuid::new_v4());
        let room_b = Room::Conversation(Uuid::new_v4());
        let mut a = registry.join(&[room_a]).await;
        let mut b = registry.join(&[room_b]).await;

        registry.broadcast(room_a, Message::Text("hi".into())).await;

        assert_eq!(a.recv().await, Some(Message::Text("hi".into())));
        assert!(b.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_receivers_are_pruned() {
        let registry = ConnectionRegistry::new();
        let room = Room::User(Uuid::new_v4());
        let rx = registry.join(&[room]).await;
        drop(rx);

        // Must not error; the dead sender is dropped on the next broadcast.
        registry.broadcast(room, Message::Text("hi".into())).await;
    }
}
