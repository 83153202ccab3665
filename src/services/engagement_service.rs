use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::engagement::{CounterRow, EdgeKind, EntityCounters, EntityKind, ToggleResult};
use crate::models::now_ms;

pub struct EngagementService;

impl EngagementService {
    /// Flip the actor's edge (like or bookmark) on an entity.
    ///
    /// Runs in one transaction so concurrent toggles serialize: remove the
    /// edge if present, otherwise add it, then recount from the edge table
    /// and rewrite the counter cache with the exact count. The counter can
    /// therefore never drift from the edges.
    pub async fn toggle(
        db: &SqlitePool,
        actor: Uuid,
        edge: EdgeKind,
        entity_kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<ToggleResult, AppError> {
        let mut tx = db.begin().await?;

        let removed = sqlx::query(
            "DELETE FROM engagement_edges \
             WHERE kind = ? AND entity_kind = ? AND entity_id = ? AND user_id = ?",
        )
        .bind(edge.as_str())
        .bind(entity_kind.as_str())
        .bind(entity_id)
        .bind(actor)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let active = if removed > 0 {
            false
        } else {
            // A concurrent insert losing the race is still "active".
            sqlx::query(
                "INSERT INTO engagement_edges (kind, entity_kind, entity_id, user_id, created_at) \
                 VALUES (?, ?, ?, ?, ?) \
                 ON CONFLICT (kind, entity_kind, entity_id, user_id) DO NOTHING",
            )
            .bind(edge.as_str())
            .bind(entity_kind.as_str())
            .bind(entity_id)
            .bind(actor)
            .bind(now_ms())
            .execute(&mut *tx)
            .await?;
            true
        };

        let count = Self::recount(&mut tx, edge.as_str(), entity_kind, entity_id).await?;
        tx.commit().await?;

        Ok(ToggleResult { active, count })
    }

    /// Give kudos. One-directional: giving twice is a deduplicated no-op.
    /// Returns whether this call added the kudos plus the exact count.
    pub async fn give_kudos(
        db: &SqlitePool,
        actor: Uuid,
        entity_kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<(bool, i64), AppError> {
        let mut tx = db.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO engagement_edges (kind, entity_kind, entity_id, user_id, created_at) \
             VALUES ('kudos', ?, ?, ?, ?) \
             ON CONFLICT (kind, entity_kind, entity_id, user_id) DO NOTHING",
        )
        .bind(entity_kind.as_str())
        .bind(entity_id)
        .bind(actor)
        .bind(now_ms())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let count = Self::recount(&mut tx, "kudos", entity_kind, entity_id).await?;
        tx.commit().await?;

        Ok((inserted > 0, count))
    }

    /// Record a view hit, at most once per identity per entity.
    ///
    /// An anonymous hit later repeated by the same person while logged in is
    /// promoted in place to their user id instead of counting twice.
    pub async fn record_hit(
        db: &SqlitePool,
        actor: Option<Uuid>,
        anon_id: Option<&str>,
        entity_kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<(bool, i64), AppError> {
        let mut tx = db.begin().await?;

        let deduped = match actor {
            Some(user) => {
                let existing: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM hits \
                     WHERE entity_kind = ? AND entity_id = ? AND user_id = ?",
                )
                .bind(entity_kind.as_str())
                .bind(entity_id)
                .bind(user)
                .fetch_one(&mut *tx)
                .await?;

                if existing > 0 {
                    true
                } else if let Some(anon) = anon_id.filter(|a| !a.is_empty()) {
                    let promoted = sqlx::query(
                        "UPDATE hits SET user_id = ?, anon_id = NULL \
                         WHERE entity_kind = ? AND entity_id = ? AND anon_id = ?",
                    )
                    .bind(user)
                    .bind(entity_kind.as_str())
                    .bind(entity_id)
                    .bind(anon)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();

                    if promoted > 0 {
                        true
                    } else {
                        Self::insert_hit(&mut tx, entity_kind, entity_id, Some(user), None).await?;
                        false
                    }
                } else {
                    Self::insert_hit(&mut tx, entity_kind, entity_id, Some(user), None).await?;
                    false
                }
            }
            None => {
                let anon = anon_id
                    .filter(|a| !a.is_empty())
                    .ok_or_else(|| AppError::BadRequest("anonId is required".into()))?;
                let inserted =
                    Self::insert_hit(&mut tx, entity_kind, entity_id, None, Some(anon)).await?;
                inserted == 0
            }
        };

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM hits WHERE entity_kind = ? AND entity_id = ?",
        )
        .bind(entity_kind.as_str())
        .bind(entity_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO entity_counters (entity_kind, entity_id, kind, count) \
             VALUES (?, ?, 'hit', ?) \
             ON CONFLICT (entity_kind, entity_id, kind) DO UPDATE SET count = excluded.count",
        )
        .bind(entity_kind.as_str())
        .bind(entity_id)
        .bind(count)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((deduped, count))
    }

    /// Cached counters readback.
    pub async fn counters(
        db: &SqlitePool,
        entity_kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<EntityCounters, AppError> {
        let rows = sqlx::query_as::<_, CounterRow>(
            "SELECT kind, count FROM entity_counters WHERE entity_kind = ? AND entity_id = ?",
        )
        .bind(entity_kind.as_str())
        .bind(entity_id)
        .fetch_all(db)
        .await?;

        let mut counters = EntityCounters::default();
        for row in rows {
            match row.kind.as_str() {
                "like" => counters.likes = row.count,
                "kudos" => counters.kudos = row.count,
                "bookmark" => counters.bookmarks = row.count,
                "hit" => counters.hits = row.count,
                _ => {}
            }
        }
        Ok(counters)
    }

    async fn insert_hit(
        tx: &mut Transaction<'_, Sqlite>,
        entity_kind: EntityKind,
        entity_id: Uuid,
        user_id: Option<Uuid>,
        anon_id: Option<&str>,
    ) -> Result<u64, AppError> {
        let inserted = sqlx::query(
            "INSERT INTO hits (entity_kind, entity_id, user_id, anon_id, created_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT DO NOTHING",
        )
        .bind(entity_kind.as_str())
        .bind(entity_id)
        .bind(user_id)
        .bind(anon_id)
        .bind(now_ms())
        .execute(&mut **tx)
        .await?
        .rows_affected();
        Ok(inserted)
    }

    /// Recount an edge kind from source-of-truth rows and rewrite the
    /// cached counter.
    async fn recount(
        tx: &mut Transaction<'_, Sqlite>,
        kind: &str,
        entity_kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM engagement_edges \
             WHERE kind = ? AND entity_kind = ? AND entity_id = ?",
        )
        .bind(kind)
        .bind(entity_kind.as_str())
        .bind(entity_id)
        .fetch_one(&mut **tx)
        .await?;

        sqlx::query(
            "INSERT INTO entity_counters (entity_kind, entity_id, kind, count) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT (entity_kind, entity_id, kind) DO UPDATE SET count = excluded.count",
        )
        .bind(entity_kind.as_str())
        .bind(entity_id)
        .bind(kind)
        .bind(count)
        .execute(&mut **tx)
        .await?;

        Ok(count)
    }
}
