use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::conversation::{Conversation, ConversationSummary, PeerInfo};
use crate::models::{ms_to_rfc3339, now_ms, User};

pub struct ConversationService;

impl ConversationService {
    /// Get or create the conversation between two users.
    ///
    /// The participant pair is stored sorted under a UNIQUE key, so two
    /// racing first messages converge on one row: the insert is
    /// `ON CONFLICT DO NOTHING` and the follow-up select finds whichever
    /// insert won.
    pub async fn get_or_create(
        db: &SqlitePool,
        me: Uuid,
        other: Uuid,
    ) -> Result<Conversation, AppError> {
        if me == other {
            return Err(AppError::BadRequest(
                "cannot start a conversation with yourself".into(),
            ));
        }

        let peer_exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind(other)
            .fetch_one(db)
            .await?;
        if peer_exists == 0 {
            return Err(AppError::NotFound);
        }

        let (user_low, user_high) = Conversation::canonical_pair(me, other);
        let now = now_ms();

        sqlx::query(
            "INSERT INTO conversations (id, user_low, user_high, last_message, created_at, updated_at) \
             VALUES (?, ?, ?, '', ?, ?) \
             ON CONFLICT (user_low, user_high) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user_low)
        .bind(user_high)
        .bind(now)
        .bind(now)
        .execute(db)
        .await?;

        let conversation = sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations WHERE user_low = ? AND user_high = ?",
        )
        .bind(user_low)
        .bind(user_high)
        .fetch_one(db)
        .await?;

        Ok(conversation)
    }

    /// Caller's conversations by recency, with peer display info and a real
    /// unread count.
    pub async fn list(db: &SqlitePool, me: Uuid) -> Result<Vec<ConversationSummary>, AppError> {
        let conversations = sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations WHERE user_low = ? OR user_high = ? \
             ORDER BY COALESCE(last_message_at, updated_at) DESC",
        )
        .bind(me)
        .bind(me)
        .fetch_all(db)
        .await?;

        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let peer_id = conversation.peer_of(me);
            let peer = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
                .bind(peer_id)
                .fetch_optional(db)
                .await?;

            let unread_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM messages m \
                 WHERE m.conversation_id = ? AND m.sender_id != ? \
                 AND NOT EXISTS ( \
                     SELECT 1 FROM message_receipts r \
                     WHERE r.message_id = m.id AND r.user_id = ? AND r.kind = 'read' \
                 )",
            )
            .bind(conversation.id)
            .bind(me)
            .bind(me)
            .fetch_one(db)
            .await?;

            summaries.push(ConversationSummary {
                id: conversation.id,
                other_user: peer.map(|u| PeerInfo {
                    id: u.id,
                    username: u.username,
                }),
                last_message: conversation.last_message.clone(),
                last_message_at: conversation.last_message_at.map(ms_to_rfc3339),
                unread_count,
            });
        }

        Ok(summaries)
    }

    /// Rewrite the denormalized last-message fields after a send.
    pub async fn touch_last_message(
        db: &SqlitePool,
        conversation_id: Uuid,
        preview: &str,
        sender: Uuid,
        at: i64,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE conversations \
             SET last_message = ?, last_message_at = ?, last_sender = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(preview)
        .bind(at)
        .bind(sender)
        .bind(at)
        .bind(conversation_id)
        .execute(db)
        .await?;
        Ok(())
    }
}
