use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::engagement::EntityKind;
use crate::models::notification::{Notification, NotificationDto, NotificationKind};
use crate::models::now_ms;
use crate::services::mention_parser;

pub const LIST_DEFAULT_LIMIT: i64 = 50;
pub const LIST_MAX_LIMIT: i64 = 100;

const PROFILE_VIEW_DEDUP_MS: i64 = 24 * 60 * 60 * 1000;

pub struct NotificationService;

impl NotificationService {
    /// Insert one notification. Acting on your own content never notifies
    /// you, so recipient == actor is a silent no-op.
    pub async fn create(
        db: &SqlitePool,
        recipient: Uuid,
        actor: Uuid,
        kind: NotificationKind,
        entity: Option<(EntityKind, Uuid)>,
        url: Option<&str>,
    ) -> Result<(), AppError> {
        if recipient == actor {
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO notifications \
             (id, recipient_id, actor_id, kind, entity_kind, entity_id, url, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4())
        .bind(recipient)
        .bind(actor)
        .bind(kind.as_str())
        .bind(entity.map(|(k, _)| k.as_str()))
        .bind(entity.map(|(_, id)| id))
        .bind(url)
        .bind(now_ms())
        .execute(db)
        .await?;

        Ok(())
    }

    /// Notify every user @mentioned in `content`, excluding the actor.
    /// Unknown usernames are silently skipped; one failed insert does not
    /// stop the rest.
    pub async fn notify_mentions(
        db: &SqlitePool,
        actor: Uuid,
        content: &str,
        entity: Option<(EntityKind, Uuid)>,
        url: Option<&str>,
    ) -> Result<(), AppError> {
        let usernames = mention_parser::extract_mentions(content);
        if usernames.is_empty() {
            return Ok(());
        }

        for username in usernames {
            let recipient: Option<Uuid> =
                sqlx::query_scalar("SELECT id FROM users WHERE LOWER(username) = ?")
                    .bind(&username)
                    .fetch_optional(db)
                    .await?;

            let Some(recipient) = recipient else { continue };
            if let Err(err) =
                Self::create(db, recipient, actor, NotificationKind::Mention, entity, url).await
            {
                tracing::warn!(error = %err, %username, "mention notification failed");
            }
        }

        Ok(())
    }

    /// Profile-view notification with a 24-hour dedup window per
    /// (recipient, actor) pair. Viewing your own profile is ignored.
    pub async fn record_profile_view(
        db: &SqlitePool,
        viewer: Uuid,
        profile_owner: Uuid,
    ) -> Result<bool, AppError> {
        if viewer == profile_owner {
            return Ok(false);
        }

        let recent: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications \
             WHERE recipient_id = ? AND actor_id = ? AND kind = 'profile_view' \
             AND created_at > ?",
        )
        .bind(profile_owner)
        .bind(viewer)
        .bind(now_ms() - PROFILE_VIEW_DEDUP_MS)
        .fetch_one(db)
        .await?;
        if recent > 0 {
            return Ok(false);
        }

        Self::create(
            db,
            profile_owner,
            viewer,
            NotificationKind::ProfileView,
            Some((EntityKind::Profile, profile_owner)),
            None,
        )
        .await?;
        Ok(true)
    }

    /// Recency-paginated notification list for the caller.
    pub async fn list(
        db: &SqlitePool,
        me: Uuid,
        limit: Option<i64>,
        before_ms: Option<i64>,
    ) -> Result<Vec<NotificationDto>, AppError> {
        let limit = limit.unwrap_or(LIST_DEFAULT_LIMIT).clamp(1, LIST_MAX_LIMIT);

        let rows = match before_ms {
            Some(before) => {
                sqlx::query_as::<_, Notification>(
                    "SELECT * FROM notifications WHERE recipient_id = ? AND created_at < ? \
                     ORDER BY created_at DESC, id DESC LIMIT ?",
                )
                .bind(me)
                .bind(before)
                .bind(limit)
                .fetch_all(db)
                .await?
            }
            None => {
                sqlx::query_as::<_, Notification>(
                    "SELECT * FROM notifications WHERE recipient_id = ? \
                     ORDER BY created_at DESC, id DESC LIMIT ?",
                )
                .bind(me)
                .bind(limit)
                .fetch_all(db)
                .await?
            }
        };

        Ok(rows.into_iter().map(NotificationDto::from).collect())
    }

    pub async fn unread_count(db: &SqlitePool, me: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = ? AND read_at IS NULL",
        )
        .bind(me)
        .fetch_one(db)
        .await?;
        Ok(count)
    }

    /// Mark specific notifications read. Other users' rows are untouched.
    pub async fn mark_read(db: &SqlitePool, me: Uuid, ids: &[Uuid]) -> Result<u64, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut qb = sqlx::QueryBuilder::<sqlx::Sqlite>::new(
            "UPDATE notifications SET read_at = ",
        );
        qb.push_bind(now_ms());
        qb.push(" WHERE recipient_id = ");
        qb.push_bind(me);
        qb.push(" AND read_at IS NULL AND id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        qb.push(")");

        let modified = qb.build().execute(db).await?.rows_affected();
        Ok(modified)
    }

    pub async fn mark_all_read(db: &SqlitePool, me: Uuid) -> Result<u64, AppError> {
        let modified = sqlx::query(
            "UPDATE notifications SET read_at = ? WHERE recipient_id = ? AND read_at IS NULL",
        )
        .bind(now_ms())
        .bind(me)
        .execute(db)
        .await?
        .rows_affected();
        Ok(modified)
    }
}
