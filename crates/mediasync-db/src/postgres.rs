//! Postgres-backed asset store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool, Postgres};
use uuid::Uuid;

use mediasync_core::models::VariantSet;
use mediasync_core::{AppError, AssetPatch, AssetRecord, MediaSource};

use crate::AssetStore;

const SELECT_COLUMNS: &str = "id, filename, mime_type, filesize, source, sizes, video_sizes, \
     cdn_url, cdn_synced, cdn_sync_error, cdn_uploaded_at, cdn_remote_path, \
     sync_permanent_failure, created_at, updated_at";

#[derive(FromRow)]
struct AssetRow {
    id: Uuid,
    filename: String,
    mime_type: String,
    filesize: i64,
    source: String,
    sizes: Option<JsonValue>,
    video_sizes: Option<JsonValue>,
    cdn_url: Option<String>,
    cdn_synced: bool,
    cdn_sync_error: Option<String>,
    cdn_uploaded_at: Option<DateTime<Utc>>,
    cdn_remote_path: Option<String>,
    sync_permanent_failure: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AssetRow {
    fn into_record(self) -> Result<AssetRecord, AppError> {
        let source = match self.source.as_str() {
            "upload" => MediaSource::Upload,
            "cdn" => MediaSource::Cdn,
            other => {
                return Err(AppError::Internal(format!(
                    "Unknown media source '{}' for record {}",
                    other, self.id
                )))
            }
        };

        let parse_set = |value: Option<JsonValue>| -> Result<Option<VariantSet>, AppError> {
            value
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| AppError::Internal(format!("Invalid variant manifest: {}", e)))
        };

        Ok(AssetRecord {
            id: self.id,
            filename: self.filename,
            mime_type: self.mime_type,
            filesize: self.filesize,
            source,
            sizes: parse_set(self.sizes)?,
            video_sizes: parse_set(self.video_sizes)?,
            cdn_url: self.cdn_url,
            cdn_synced: self.cdn_synced,
            cdn_sync_error: self.cdn_sync_error,
            cdn_uploaded_at: self.cdn_uploaded_at,
            cdn_remote_path: self.cdn_remote_path,
            sync_permanent_failure: self.sync_permanent_failure,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn source_str(source: MediaSource) -> &'static str {
    match source {
        MediaSource::Upload => "upload",
        MediaSource::Cdn => "cdn",
    }
}

fn set_json(set: &Option<VariantSet>) -> Result<Option<JsonValue>, AppError> {
    set.as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| AppError::Internal(format!("Failed to serialize variant manifest: {}", e)))
}

fn db_err(e: sqlx::Error) -> AppError {
    tracing::error!(error = %e, "Database operation failed");
    AppError::Database(e.to_string())
}

/// Asset store over a Postgres pool. Partial updates are applied under a
/// row lock so concurrent sweeps see serialized per-record writes.
#[derive(Clone)]
pub struct PgAssetStore {
    pool: PgPool,
}

impl PgAssetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn write_record(
        &self,
        tx: &mut sqlx::Transaction<'_, Postgres>,
        record: &AssetRecord,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE asset_records SET \
                 sizes = $2, video_sizes = $3, cdn_url = $4, cdn_synced = $5, \
                 cdn_sync_error = $6, cdn_uploaded_at = $7, cdn_remote_path = $8, \
                 sync_permanent_failure = $9, updated_at = $10 \
             WHERE id = $1",
        )
        .bind(record.id)
        .bind(set_json(&record.sizes)?)
        .bind(set_json(&record.video_sizes)?)
        .bind(&record.cdn_url)
        .bind(record.cdn_synced)
        .bind(&record.cdn_sync_error)
        .bind(record.cdn_uploaded_at)
        .bind(&record.cdn_remote_path)
        .bind(record.sync_permanent_failure)
        .bind(record.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}

#[async_trait]
impl AssetStore for PgAssetStore {
    async fn get(&self, id: Uuid) -> Result<Option<AssetRecord>, AppError> {
        let row: Option<AssetRow> = sqlx::query_as::<Postgres, AssetRow>(&format!(
            "SELECT {} FROM asset_records WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(AssetRow::into_record).transpose()
    }

    async fn create(&self, record: AssetRecord) -> Result<AssetRecord, AppError> {
        sqlx::query(
            "INSERT INTO asset_records \
                 (id, filename, mime_type, filesize, source, sizes, video_sizes, \
                  cdn_url, cdn_synced, cdn_sync_error, cdn_uploaded_at, cdn_remote_path, \
                  sync_permanent_failure, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(record.id)
        .bind(&record.filename)
        .bind(&record.mime_type)
        .bind(record.filesize)
        .bind(source_str(record.source))
        .bind(set_json(&record.sizes)?)
        .bind(set_json(&record.video_sizes)?)
        .bind(&record.cdn_url)
        .bind(record.cdn_synced)
        .bind(&record.cdn_sync_error)
        .bind(record.cdn_uploaded_at)
        .bind(&record.cdn_remote_path)
        .bind(record.sync_permanent_failure)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(record)
    }

    async fn find_unsynced(&self, limit: i64) -> Result<Vec<AssetRecord>, AppError> {
        let rows: Vec<AssetRow> = sqlx::query_as::<Postgres, AssetRow>(&format!(
            "SELECT {} FROM asset_records \
             WHERE source = 'upload' \
               AND cdn_synced = false \
               AND filename <> '' \
               AND sync_permanent_failure = false \
             ORDER BY created_at \
             LIMIT $1",
            SELECT_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(AssetRow::into_record).collect()
    }

    async fn find_cleanup_candidates(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<AssetRecord>, AppError> {
        let rows: Vec<AssetRow> = sqlx::query_as::<Postgres, AssetRow>(&format!(
            "SELECT {} FROM asset_records \
             WHERE cdn_synced = true \
               AND cdn_uploaded_at < $1 \
               AND filename <> '' \
             ORDER BY cdn_uploaded_at \
             LIMIT $2",
            SELECT_COLUMNS
        ))
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(AssetRow::into_record).collect()
    }

    async fn update(&self, id: Uuid, patch: AssetPatch) -> Result<AssetRecord, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row: Option<AssetRow> = sqlx::query_as::<Postgres, AssetRow>(&format!(
            "SELECT {} FROM asset_records WHERE id = $1 FOR UPDATE",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let mut record = row
            .ok_or_else(|| AppError::NotFound(id.to_string()))?
            .into_record()?;

        patch.apply(&mut record);
        self.write_record(&mut tx, &record).await?;
        tx.commit().await.map_err(db_err)?;

        Ok(record)
    }

    async fn confirm_synced(&self, id: Uuid) -> Result<bool, AppError> {
        let synced: Option<bool> =
            sqlx::query_scalar("SELECT cdn_synced FROM asset_records WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        Ok(synced.unwrap_or(false))
    }
}
