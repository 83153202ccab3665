use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::ms_to_rfc3339;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Comment,
    Reply,
    Mention,
    ProfileView,
    Kudos,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Like => "like",
            NotificationKind::Comment => "comment",
            NotificationKind::Reply => "reply",
            NotificationKind::Mention => "mention",
            NotificationKind::ProfileView => "profile_view",
            NotificationKind::Kudos => "kudos",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "like" => Ok(NotificationKind::Like),
            "comment" => Ok(NotificationKind::Comment),
            "reply" => Ok(NotificationKind::Reply),
            "mention" => Ok(NotificationKind::Mention),
            "profile_view" => Ok(NotificationKind::ProfileView),
            "kudos" => Ok(NotificationKind::Kudos),
            other => Err(AppError::BadRequest(format!(
                "unknown notification kind: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub actor_id: Uuid,
    pub kind: String,
    pub entity_kind: Option<String>,
    pub entity_id: Option<Uuid>,
    pub url: Option<String>,
    pub read_at: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDto {
    pub id: Uuid,
    pub actor: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub read: bool,
    pub created_at: String,
}

impl From<Notification> for NotificationDto {
    fn from(n: Notification) -> Self {
        NotificationDto {
            id: n.id,
            actor: n.actor_id,
            kind: n.kind,
            entity_kind: n.entity_kind,
            entity_id: n.entity_id,
            url: n.url,
            read: n.read_at.is_some(),
            created_at: ms_to_rfc3339(n.created_at),
        }
    }
}
