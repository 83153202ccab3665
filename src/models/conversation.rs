use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A two-party conversation row. Participants are stored as the canonical
/// sorted pair so `(a, b)` and `(b, a)` hit the same UNIQUE key.
#[derive(Debug, Clone, FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub user_low: Uuid,
    pub user_high: Uuid,
    pub last_message: String,
    pub last_message_at: Option<i64>,
    pub last_sender: Option<Uuid>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Conversation {
    pub fn participants(&self) -> [Uuid; 2] {
        [self.user_low, self.user_high]
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.user_low == user_id || self.user_high == user_id
    }

    /// The other side of the conversation, from `user_id`'s perspective.
    pub fn peer_of(&self, user_id: Uuid) -> Uuid {
        if self.user_low == user_id {
            self.user_high
        } else {
            self.user_low
        }
    }

    /// Canonical storage order for a participant pair.
    pub fn canonical_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

/// List-view projection for `GET /conversations`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub other_user: Option<PeerInfo>,
    pub last_message: String,
    pub last_message_at: Option<String>,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeerInfo {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub username: String,
}
