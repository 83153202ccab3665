use async_trait::async_trait;
use bytes::Bytes;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::now_ms;

/// A stored media object.
#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Media persistence seam. The service ships one database-backed
/// implementation; an object-store backend can replace it without touching
/// the upload path.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store a blob and return its public URL path.
    async fn put(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<String, AppError>;

    async fn get(&self, id: Uuid) -> Result<StoredMedia, AppError>;
}

/// Blob store backed by the service database.
pub struct DbMediaStore {
    db: SqlitePool,
}

impl DbMediaStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MediaStore for DbMediaStore {
    async fn put(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<String, AppError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO media_blobs (id, filename, content_type, bytes, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(filename)
        .bind(content_type)
        .bind(bytes.as_ref())
        .bind(now_ms())
        .execute(&self.db)
        .await
        .map_err(|err| AppError::Upstream(format!("media store write failed: {err}")))?;

        Ok(format!("/api/messages/media/{id}"))
    }

    async fn get(&self, id: Uuid) -> Result<StoredMedia, AppError> {
        let row = sqlx::query_as::<_, MediaBlobRow>(
            "SELECT id, filename, content_type, bytes FROM media_blobs WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound)?;

        Ok(StoredMedia {
            id: row.id,
            filename: row.filename,
            content_type: row.content_type,
            bytes: Bytes::from(row.bytes),
        })
    }
}

#[derive(sqlx::FromRow)]
struct MediaBlobRow {
    id: Uuid,
    filename: String,
    content_type: String,
    bytes: Vec<u8>,
}
