//! In-memory asset store.
//!
//! Used by the worker tests and suitable for single-process setups where the
//! record store is not backed by a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use mediasync_core::{AppError, AssetPatch, AssetRecord, MediaSource};

use crate::AssetStore;

#[derive(Clone, Default)]
pub struct MemoryAssetStore {
    records: Arc<Mutex<HashMap<Uuid, AssetRecord>>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, AssetRecord>>, AppError> {
        self.records
            .lock()
            .map_err(|_| AppError::Internal("Asset store lock poisoned".to_string()))
    }

    /// Snapshot of a record, for test assertions.
    pub fn snapshot(&self, id: Uuid) -> Option<AssetRecord> {
        self.records.lock().ok()?.get(&id).cloned()
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn get(&self, id: Uuid) -> Result<Option<AssetRecord>, AppError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn create(&self, record: AssetRecord) -> Result<AssetRecord, AppError> {
        self.lock()?.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_unsynced(&self, limit: i64) -> Result<Vec<AssetRecord>, AppError> {
        let records = self.lock()?;
        let mut matches: Vec<AssetRecord> = records
            .values()
            .filter(|r| {
                r.source == MediaSource::Upload
                    && !r.cdn_synced
                    && !r.filename.is_empty()
                    && !r.sync_permanent_failure
            })
            .cloned()
            .collect();
        matches.sort_by_key(|r| r.created_at);
        matches.truncate(limit.max(0) as usize);
        Ok(matches)
    }

    async fn find_cleanup_candidates(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<AssetRecord>, AppError> {
        let records = self.lock()?;
        let mut matches: Vec<AssetRecord> = records
            .values()
            .filter(|r| {
                r.cdn_synced
                    && r.cdn_uploaded_at.is_some_and(|at| at < cutoff)
                    && !r.filename.is_empty()
            })
            .cloned()
            .collect();
        matches.sort_by_key(|r| r.cdn_uploaded_at);
        matches.truncate(limit.max(0) as usize);
        Ok(matches)
    }

    async fn update(&self, id: Uuid, patch: AssetPatch) -> Result<AssetRecord, AppError> {
        let mut records = self.lock()?;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(id.to_string()))?;
        patch.apply(record);
        Ok(record.clone())
    }

    async fn confirm_synced(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.lock()?.get(&id).is_some_and(|r| r.cdn_synced))
    }
}
