//! Persistence for asset records.
//!
//! [`AssetStore`] is the narrow surface the pipeline consumes from the
//! record store: batch queries for the sweeps plus partial updates.
//! [`PgAssetStore`] backs it with Postgres; [`MemoryAssetStore`] backs it
//! with a `HashMap` for tests and single-process setups.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use mediasync_core::{AppError, AssetPatch, AssetRecord};

pub mod memory;
pub mod postgres;

pub use memory::MemoryAssetStore;
pub use postgres::PgAssetStore;

/// Narrow record-store interface consumed by the ingest pipeline and the
/// reconciler. Per-record field updates are serialized by the backing store
/// (last-write-wins); the pipeline does not do optimistic locking.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<AssetRecord>, AppError>;

    /// Insert a freshly accepted record.
    async fn create(&self, record: AssetRecord) -> Result<AssetRecord, AppError>;

    /// Records needing a mirror attempt: uploads that are not synced, still
    /// have a filename, and have not been abandoned as permanent failures.
    async fn find_unsynced(&self, limit: i64) -> Result<Vec<AssetRecord>, AppError>;

    /// Synced records whose mirror is older than `cutoff` and which still
    /// reference a local file.
    async fn find_cleanup_candidates(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<AssetRecord>, AppError>;

    /// Partial update: only fields set in the patch are written.
    async fn update(&self, id: Uuid, patch: AssetPatch) -> Result<AssetRecord, AppError>;

    /// Conditional guard for cleanup: true only if the record exists and is
    /// still `cdn_synced` at the time of the check. Cleanup must not unlink
    /// a local file whose record has been unmarked since the candidate query.
    async fn confirm_synced(&self, id: Uuid) -> Result<bool, AppError>;
}
