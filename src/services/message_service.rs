use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::conversation::Conversation;
use crate::models::message::{
    Message, MessageDto, MessageKind, ReactionDto, ReceiptKind, ReplyPreview,
};
use crate::models::{ms_to_rfc3339, now_ms};
use crate::services::conversation_service::ConversationService;

pub const HISTORY_DEFAULT_LIMIT: i64 = 50;
pub const HISTORY_MAX_LIMIT: i64 = 100;
pub const SEARCH_DEFAULT_LIMIT: i64 = 50;
pub const SEARCH_MAX_LIMIT: i64 = 200;

pub struct MessageService;

impl MessageService {
    /// Persist a new message to `other` and return the hydrated wire shape.
    ///
    /// Creates the conversation lazily, writes the sender's read receipt in
    /// the same breath, and rewrites the conversation's denormalized
    /// last-message fields. Fan-out happens at the route layer.
    pub async fn send(
        db: &SqlitePool,
        sender: Uuid,
        other: Uuid,
        kind: MessageKind,
        content: &str,
        media_url: Option<String>,
        reply_to: Option<Uuid>,
    ) -> Result<(Conversation, MessageDto), AppError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::BadRequest("message content is required".into()));
        }

        let conversation = ConversationService::get_or_create(db, sender, other).await?;

        if let Some(reply_id) = reply_to {
            let belongs: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM messages WHERE id = ? AND conversation_id = ?",
            )
            .bind(reply_id)
            .bind(conversation.id)
            .fetch_one(db)
            .await?;
            if belongs == 0 {
                return Err(AppError::BadRequest(
                    "replyTo message is not in this conversation".into(),
                ));
            }
        }

        let id = Uuid::new_v4();
        let now = now_ms();

        sqlx::query(
            "INSERT INTO messages (id, conversation_id, sender_id, kind, content, media_url, reply_to, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(conversation.id)
        .bind(sender)
        .bind(kind.as_str())
        .bind(content)
        .bind(&media_url)
        .bind(reply_to)
        .bind(now)
        .execute(db)
        .await?;

        // The sender has trivially read their own message.
        sqlx::query(
            "INSERT INTO message_receipts (message_id, user_id, kind, created_at) \
             VALUES (?, ?, 'read', ?)",
        )
        .bind(id)
        .bind(sender)
        .bind(now)
        .execute(db)
        .await?;

        ConversationService::touch_last_message(db, conversation.id, content, sender, now).await?;

        let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_one(db)
            .await?;
        let dto = Self::hydrate(db, vec![message])
            .await?
            .pop()
            .ok_or(AppError::Internal)?;

        Ok((conversation, dto))
    }

    /// Conversation history: the newest window before the cursor, returned
    /// in ascending order.
    pub async fn history(
        db: &SqlitePool,
        conversation_id: Uuid,
        limit: Option<i64>,
        before_ms: Option<i64>,
    ) -> Result<Vec<MessageDto>, AppError> {
        let limit = limit
            .unwrap_or(HISTORY_DEFAULT_LIMIT)
            .clamp(1, HISTORY_MAX_LIMIT);

        let mut messages = match before_ms {
            Some(before) => {
                sqlx::query_as::<_, Message>(
                    "SELECT * FROM messages WHERE conversation_id = ? AND created_at < ? \
                     ORDER BY created_at DESC, id DESC LIMIT ?",
                )
                .bind(conversation_id)
                .bind(before)
                .bind(limit)
                .fetch_all(db)
                .await?
            }
            None => {
                sqlx::query_as::<_, Message>(
                    "SELECT * FROM messages WHERE conversation_id = ? \
                     ORDER BY created_at DESC, id DESC LIMIT ?",
                )
                .bind(conversation_id)
                .bind(limit)
                .fetch_all(db)
                .await?
            }
        };
        messages.reverse();

        Self::hydrate(db, messages).await
    }

    /// Literal substring search within one conversation, case-insensitive.
    pub async fn search(
        db: &SqlitePool,
        conversation_id: Uuid,
        query: &str,
        limit: Option<i64>,
    ) -> Result<Vec<MessageDto>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let limit = limit
            .unwrap_or(SEARCH_DEFAULT_LIMIT)
            .clamp(1, SEARCH_MAX_LIMIT);

        // Escape LIKE metacharacters so the query is a literal substring.
        let escaped = query
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{escaped}%");

        let messages = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE conversation_id = ? \
             AND content LIKE ? ESCAPE '\\' \
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(conversation_id)
        .bind(pattern)
        .bind(limit)
        .fetch_all(db)
        .await?;

        Self::hydrate(db, messages).await
    }

    /// Mark every peer-sent message in the conversation read or delivered.
    ///
    /// Receipt sets only grow; re-marking is a no-op. Returns how many rows
    /// the call added plus the recomputed full id set, so the response (and
    /// the broadcast) reflects the state after the call rather than its
    /// delta.
    pub async fn mark(
        db: &SqlitePool,
        actor: Uuid,
        conversation_id: Uuid,
        kind: ReceiptKind,
    ) -> Result<(u64, Vec<Uuid>), AppError> {
        let modified = sqlx::query(
            "INSERT INTO message_receipts (message_id, user_id, kind, created_at) \
             SELECT id, ?, ?, ? FROM messages \
             WHERE conversation_id = ? AND sender_id != ? \
             ON CONFLICT (message_id, user_id, kind) DO NOTHING",
        )
        .bind(actor)
        .bind(kind.as_str())
        .bind(now_ms())
        .bind(conversation_id)
        .bind(actor)
        .execute(db)
        .await?
        .rows_affected();

        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT m.id FROM messages m \
             JOIN message_receipts r ON r.message_id = m.id \
             WHERE m.conversation_id = ? AND r.user_id = ? AND r.kind = ? \
             ORDER BY m.created_at, m.id",
        )
        .bind(conversation_id)
        .bind(actor)
        .bind(kind.as_str())
        .fetch_all(db)
        .await?;

        Ok((modified, ids))
    }

    /// Set the actor's reaction on a message. One reaction per user per
    /// message; a second react replaces the first.
    pub async fn react(
        db: &SqlitePool,
        actor: Uuid,
        message_id: Uuid,
        emoji: &str,
    ) -> Result<Message, AppError> {
        let emoji = emoji.trim();
        if emoji.is_empty() {
            return Err(AppError::BadRequest("emoji is required".into()));
        }

        let message = Self::load_for_participant(db, actor, message_id).await?;

        sqlx::query(
            "INSERT INTO message_reactions (message_id, user_id, emoji, created_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT (message_id, user_id) DO UPDATE SET emoji = excluded.emoji",
        )
        .bind(message_id)
        .bind(actor)
        .bind(emoji)
        .bind(now_ms())
        .execute(db)
        .await?;

        Ok(message)
    }

    /// Clear the actor's reaction. Clearing an absent reaction succeeds.
    pub async fn unreact(
        db: &SqlitePool,
        actor: Uuid,
        message_id: Uuid,
    ) -> Result<Message, AppError> {
        let message = Self::load_for_participant(db, actor, message_id).await?;

        sqlx::query("DELETE FROM message_reactions WHERE message_id = ? AND user_id = ?")
            .bind(message_id)
            .bind(actor)
            .execute(db)
            .await?;

        Ok(message)
    }

    /// Edit a message's text. Sender-only; media messages cannot be edited.
    pub async fn edit(
        db: &SqlitePool,
        actor: Uuid,
        message_id: Uuid,
        content: &str,
    ) -> Result<Message, AppError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::BadRequest("message content is required".into()));
        }

        let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = ?")
            .bind(message_id)
            .fetch_optional(db)
            .await?
            .ok_or(AppError::NotFound)?;

        if message.sender_id != actor {
            return Err(AppError::Forbidden);
        }
        if message.kind() != MessageKind::Text {
            return Err(AppError::BadRequest(
                "only text messages can be edited".into(),
            ));
        }

        sqlx::query("UPDATE messages SET content = ? WHERE id = ?")
            .bind(content)
            .bind(message_id)
            .execute(db)
            .await?;

        Ok(Message {
            content: content.to_string(),
            ..message
        })
    }

    /// Hard-delete a message. Sender-only; receipts and reactions cascade.
    pub async fn delete(
        db: &SqlitePool,
        actor: Uuid,
        message_id: Uuid,
    ) -> Result<Message, AppError> {
        let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = ?")
            .bind(message_id)
            .fetch_optional(db)
            .await?
            .ok_or(AppError::NotFound)?;

        if message.sender_id != actor {
            return Err(AppError::Forbidden);
        }

        sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(message_id)
            .execute(db)
            .await?;

        Ok(message)
    }

    /// Load a message and check the actor participates in its conversation.
    pub async fn load_for_participant(
        db: &SqlitePool,
        actor: Uuid,
        message_id: Uuid,
    ) -> Result<Message, AppError> {
        let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = ?")
            .bind(message_id)
            .fetch_optional(db)
            .await?
            .ok_or(AppError::NotFound)?;

        let conversation =
            sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = ?")
                .bind(message.conversation_id)
                .fetch_one(db)
                .await?;
        if !conversation.is_participant(actor) {
            return Err(AppError::Forbidden);
        }

        Ok(message)
    }

    /// Batch-attach receipts, reactions and reply previews to a message
    /// window, grouping child rows by message id in memory.
    pub async fn hydrate(
        db: &SqlitePool,
        messages: Vec<Message>,
    ) -> Result<Vec<MessageDto>, AppError> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = messages.iter().map(|m| m.id).collect();

        let mut receipts: HashMap<Uuid, (Vec<Uuid>, Vec<Uuid>)> = HashMap::new();
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT message_id, user_id, kind FROM message_receipts WHERE message_id IN (",
        );
        push_id_list(&mut qb, &ids);
        qb.push(")");
        let rows: Vec<ReceiptRow> = qb.build_query_as().fetch_all(db).await?;
        for row in rows {
            let entry = receipts.entry(row.message_id).or_default();
            match row.kind.as_str() {
                "read" => entry.0.push(row.user_id),
                "delivered" => entry.1.push(row.user_id),
                _ => {}
            }
        }

        let mut reactions: HashMap<Uuid, Vec<ReactionDto>> = HashMap::new();
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT message_id, user_id, emoji FROM message_reactions WHERE message_id IN (",
        );
        push_id_list(&mut qb, &ids);
        qb.push(")");
        let rows: Vec<ReactionRow> = qb.build_query_as().fetch_all(db).await?;
        for row in rows {
            reactions.entry(row.message_id).or_default().push(ReactionDto {
                user: row.user_id,
                emoji: row.emoji,
            });
        }

        let reply_ids: Vec<Uuid> = messages.iter().filter_map(|m| m.reply_to).collect();
        let mut replies: HashMap<Uuid, ReplyPreview> = HashMap::new();
        if !reply_ids.is_empty() {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "SELECT id, kind, content FROM messages WHERE id IN (",
            );
            push_id_list(&mut qb, &reply_ids);
            qb.push(")");
            let rows: Vec<ReplyRow> = qb.build_query_as().fetch_all(db).await?;
            for row in rows {
                replies.insert(
                    row.id,
                    ReplyPreview {
                        id: row.id,
                        content: row.content,
                        kind: MessageKind::parse(&row.kind).unwrap_or(MessageKind::Text),
                    },
                );
            }
        }

        Ok(messages
            .into_iter()
            .map(|m| {
                let (read_by, delivered_by) = receipts.remove(&m.id).unwrap_or_default();
                let reply_to = m.reply_to.and_then(|id| replies.get(&id).cloned());
                MessageDto {
                    id: m.id,
                    conversation_id: m.conversation_id,
                    kind: m.kind(),
                    content: m.content,
                    media_url: m.media_url,
                    sender: m.sender_id,
                    created_at: ms_to_rfc3339(m.created_at),
                    read_by,
                    delivered_by,
                    reactions: reactions.remove(&m.id).unwrap_or_default(),
                    reply_to,
                }
            })
            .collect())
    }
}

fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[Uuid]) {
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
}

#[derive(sqlx::FromRow)]
struct ReceiptRow {
    message_id: Uuid,
    user_id: Uuid,
    kind: String,
}

#[derive(sqlx::FromRow)]
struct ReactionRow {
    message_id: Uuid,
    user_id: Uuid,
    emoji: String,
}

#[derive(sqlx::FromRow)]
struct ReplyRow {
    id: Uuid,
    kind: String,
    content: String,
}
