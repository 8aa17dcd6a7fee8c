use async_trait::async_trait;
use chrono::Utc;
use mediabox_core::models::MediaRow;
use mediabox_core::{
    MediaError, MediaFilter, MediaRecord, MediaResult, MediaUpdate, NewMediaRecord,
};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::repository::{MediaRepository, MediaTransaction};

const MEDIA_COLUMNS: &str = "id, name, hash, kind, role, source_path, mime_type, additions, \
                             parent_id, created_at, updated_at";

/// Map a unique violation on the hash index to `DuplicateFile`.
fn map_insert_error(err: sqlx::Error, hash: Option<&str>) -> MediaError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            if let Some(hash) = hash {
                return MediaError::DuplicateFile {
                    hash: hash.to_string(),
                };
            }
        }
    }
    MediaError::from(err)
}

/// Postgres-backed media repository
#[derive(Clone)]
pub struct PgMediaRepository {
    pool: PgPool,
}

impl PgMediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MediaRepository for PgMediaRepository {
    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select"))]
    async fn find_where(&self, filter: &MediaFilter) -> MediaResult<Vec<MediaRecord>> {
        let query = format!(
            r#"
            SELECT {MEDIA_COLUMNS} FROM media
            WHERE ($1::text IS NULL OR hash = $1)
              AND ($2::uuid IS NULL OR parent_id = $2)
              AND ($3::media_role IS NULL OR role = $3)
            ORDER BY created_at ASC, id ASC
            "#
        );

        let rows = sqlx::query_as::<Postgres, MediaRow>(&query)
            .bind(filter.hash.as_ref().map(|h| h.as_str()))
            .bind(filter.parent_id)
            .bind(filter.role)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(MediaRow::into_record).collect()
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> MediaResult<Option<MediaRecord>> {
        let query = format!("SELECT {MEDIA_COLUMNS} FROM media WHERE id = $1");

        let row = sqlx::query_as::<Postgres, MediaRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(MediaRow::into_record).transpose()
    }

    #[tracing::instrument(skip(self, record), fields(db.table = "media", db.operation = "insert", media.role = %record.role))]
    async fn create(&self, record: NewMediaRecord) -> MediaResult<MediaRecord> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let hash = record.hash.as_ref().map(|h| h.as_str().to_string());
        let additions = record.additions.as_ref().map(|a| a.to_json_value());

        let query = format!(
            r#"
            INSERT INTO media (
                id, name, hash, kind, role, source_path, mime_type, additions,
                parent_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {MEDIA_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<Postgres, MediaRow>(&query)
            .bind(id)
            .bind(&record.name)
            .bind(hash.as_deref())
            .bind(record.kind)
            .bind(record.role)
            .bind(record.source_path.as_deref())
            .bind(record.mime_type.as_deref())
            .bind(additions)
            .bind(record.parent_id)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_insert_error(e, hash.as_deref()))?;

        row.into_record()
    }

    #[tracing::instrument(skip(self, update), fields(db.table = "media", db.operation = "update", db.record_id = %id))]
    async fn update(&self, id: Uuid, update: &MediaUpdate) -> MediaResult<MediaRecord> {
        let query = format!(
            r#"
            UPDATE media SET
                name = COALESCE($2, name),
                source_path = COALESCE($3, source_path),
                additions = COALESCE($4, additions),
                parent_id = CASE WHEN $5 THEN $6 ELSE parent_id END,
                updated_at = $7
            WHERE id = $1
            RETURNING {MEDIA_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<Postgres, MediaRow>(&query)
            .bind(id)
            .bind(update.name.as_deref())
            .bind(update.source_path.as_deref())
            .bind(update.additions.as_ref().map(|a| a.to_json_value()))
            .bind(update.parent_id.is_some())
            .bind(update.parent_id.flatten())
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("Media {}", id)))?;

        row.into_record()
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> MediaResult<()> {
        let result = sqlx::query("DELETE FROM media WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MediaError::NotFound(format!("Media {}", id)));
        }

        Ok(())
    }

    async fn begin(&self) -> MediaResult<Box<dyn MediaTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgMediaTransaction { tx }))
    }
}

/// Transaction handle over a pooled Postgres connection
pub struct PgMediaTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl MediaTransaction for PgMediaTransaction {
    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "update", db.record_id = %id))]
    async fn detach(&mut self, id: Uuid) -> MediaResult<()> {
        let result =
            sqlx::query("UPDATE media SET parent_id = NULL, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&mut *self.tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(MediaError::NotFound(format!("Media {}", id)));
        }

        Ok(())
    }

    async fn commit(self: Box<Self>) -> MediaResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MediaResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
