use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

/// Entity classes that can accumulate likes, kudos, bookmarks, and hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    CommunityPost,
    CommunityComment,
    Profile,
    Story,
    StoryComment,
    Work,
    WorkComment,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::CommunityPost => "community_post",
            EntityKind::CommunityComment => "community_comment",
            EntityKind::Profile => "profile",
            EntityKind::Story => "story",
            EntityKind::StoryComment => "story_comment",
            EntityKind::Work => "work",
            EntityKind::WorkComment => "work_comment",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "community_post" => Ok(EntityKind::CommunityPost),
            "community_comment" => Ok(EntityKind::CommunityComment),
            "profile" => Ok(EntityKind::Profile),
            "story" => Ok(EntityKind::Story),
            "story_comment" => Ok(EntityKind::StoryComment),
            "work" => Ok(EntityKind::Work),
            "work_comment" => Ok(EntityKind::WorkComment),
            other => Err(AppError::BadRequest(format!(
                "unknown entity kind: {other}"
            ))),
        }
    }
}

/// Kinds of engagement edge a user can hold against an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Like,
    Kudos,
    Bookmark,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Like => "like",
            EdgeKind::Kudos => "kudos",
            EdgeKind::Bookmark => "bookmark",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CounterRow {
    pub kind: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntityCounters {
    pub likes: i64,
    pub kudos: i64,
    pub bookmarks: i64,
    pub hits: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResult {
    pub active: bool,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_round_trips() {
        for kind in [
            EntityKind::CommunityPost,
            EntityKind::CommunityComment,
            EntityKind::Profile,
            EntityKind::Story,
            EntityKind::StoryComment,
            EntityKind::Work,
            EntityKind::WorkComment,
        ] {
            assert_eq!(EntityKind::parse(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_entity_kind_is_rejected() {
        assert!(EntityKind::parse("galaxy").is_err());
    }
}
