//! Authorization guards that enforce permission checks at the type level.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::conversation::Conversation;

/// Authenticated user extracted from JWT claims.
#[derive(Debug, Clone, Copy)]
pub struct User {
    pub id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for User
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by the auth middleware.
        let user_id = parts
            .extensions
            .get::<Uuid>()
            .copied()
            .ok_or(AppError::Unauthorized)?;

        Ok(User { id: user_id })
    }
}

/// A verified participant of a two-party conversation.
#[derive(Debug, Clone)]
pub struct ConversationMember {
    pub user_id: Uuid,
    pub conversation: Conversation,
}

impl ConversationMember {
    /// Load the conversation and check membership in one query.
    pub async fn verify(
        db: &SqlitePool,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Self, AppError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations WHERE id = ?",
        )
        .bind(conversation_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)?;

        if !conversation.is_participant(user_id) {
            return Err(AppError::Forbidden);
        }

        Ok(ConversationMember {
            user_id,
            conversation,
        })
    }

    /// The other participant.
    pub fn peer(&self) -> Uuid {
        self.conversation.peer_of(self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation_between(a: Uuid, b: Uuid) -> Conversation {
        let (user_low, user_high) = Conversation::canonical_pair(a, b);
        Conversation {
            id: Uuid::new_v4(),
            user_low,
            user_high,
            last_message: String::new(),
            last_message_at: None,
            last_sender: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn peer_is_the_other_participant() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let member = ConversationMember {
            user_id: a,
            conversation: conversation_between(a, b),
        };
        assert_eq!(member.peer(), b);
    }
}
