use serde::Serialize;
use uuid::Uuid;

use crate::models::message::MessageDto;

/// Realtime events pushed over websockets and SSE.
///
/// Every event serializes with a top-level `"event"` discriminant so clients
/// can dispatch without inspecting the payload shape. Serialization happens
/// once per dispatch, in the broadcaster.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RealtimeEvent {
    /// A new message arrived in one of the recipient's conversations.
    MessageCreated {
        #[serde(flatten)]
        message: MessageDto,
    },

    /// A message's text was edited by its sender.
    #[serde(rename_all = "camelCase")]
    MessageUpdated {
        id: Uuid,
        conversation_id: Uuid,
        #[serde(rename = "type")]
        kind: String,
        content: String,
    },

    /// A message was deleted; clients drop it from their view.
    #[serde(rename_all = "camelCase")]
    MessageDeleted {
        conversation_id: Uuid,
        message_id: Uuid,
    },

    /// The reader marked messages in the conversation as read.
    #[serde(rename_all = "camelCase")]
    MessagesRead {
        conversation_id: Uuid,
        reader: Uuid,
        message_ids: Vec<Uuid>,
    },

    /// Messages were acknowledged as delivered to the recipient's device.
    #[serde(rename_all = "camelCase")]
    MessagesDelivered {
        conversation_id: Uuid,
        deliverer: Uuid,
        message_ids: Vec<Uuid>,
    },

    /// A reaction was set (`emoji` present) or cleared (`emoji` null).
    #[serde(rename_all = "camelCase")]
    ReactionUpdated {
        conversation_id: Uuid,
        message_id: Uuid,
        user: Uuid,
        emoji: Option<String>,
    },

    /// The peer started or stopped typing. Never persisted.
    #[serde(rename_all = "camelCase")]
    Typing {
        conversation_id: Uuid,
        from: Uuid,
        typing: bool,
    },
}

impl RealtimeEvent {
    /// Event name used for the SSE `event:` line; matches the serialized
    /// `"event"` discriminant.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::MessageCreated { .. } => "message_created",
            Self::MessageUpdated { .. } => "message_updated",
            Self::MessageDeleted { .. } => "message_deleted",
            Self::MessagesRead { .. } => "messages_read",
            Self::MessagesDelivered { .. } => "messages_delivered",
            Self::ReactionUpdated { .. } => "reaction_updated",
            Self::Typing { .. } => "typing",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminant_matches_event_name() {
        let event = RealtimeEvent::Typing {
            conversation_id: Uuid::new_v4(),
            from: Uuid::new_v4(),
            typing: true,
        };
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(value["event"], event.event_name());
        assert_eq!(value["typing"], true);
    }

    #[test]
    fn reaction_cleared_serializes_null_emoji() {
        let event = RealtimeEvent::ReactionUpdated {
            conversation_id: Uuid::new_v4(),
            message_id: Uuid::new_v4(),
            user: Uuid::new_v4(),
            emoji: None,
        };
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(value["event"], "reaction_updated");
        assert!(value["emoji"].is_null());
    }

    #[test]
    fn read_event_carries_the_full_id_set() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let event = RealtimeEvent::MessagesRead {
            conversation_id: Uuid::new_v4(),
            reader: Uuid::new_v4(),
            message_ids: ids.clone(),
        };
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(value["messageIds"].as_array().unwrap().len(), ids.len());
    }
}
