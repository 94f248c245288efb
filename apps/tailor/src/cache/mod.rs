//! Content Cache: generated section content keyed by (job id, section).
//!
//! `save` is write-then-commit: the content blob is written first, then the
//! record that references it. If the blob write fails nothing is recorded; if
//! the record write fails the new blob is removed. A record is the only thing
//! that makes a blob visible, so there is never a record without content.
//!
//! Saves to the same key are serialized within a process, so each save sees
//! the blob committed before it and removes it. Across processes the last
//! committed record wins.
//!
//! `load` never fails: anything missing, corrupt, stale or dangling is a miss.
//! Caching is an optimization and must not block generation.

pub mod storage;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::CacheError;
use crate::sections::SectionContent;

pub use storage::{CacheKey, CacheStorage, FileCacheStorage};

/// Bump when the record or content format changes; older entries become stale.
pub const CACHE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub job_id: String,
    pub section: String,
    pub content: SectionContent,
    pub generated_at: DateTime<Utc>,
    pub generator: String,
    pub cache_version: u32,
}

/// On-disk record. The content lives in the blob it names.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheRecord {
    job_id: String,
    section: String,
    content_file: String,
    generated_at: DateTime<Utc>,
    generator: String,
    cache_version: u32,
}

/// One lock per key, shared by every clone of the cache.
type SaveLocks = Arc<Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>>;

#[derive(Clone)]
pub struct ContentCache {
    storage: Arc<dyn CacheStorage>,
    save_locks: SaveLocks,
}

impl ContentCache {
    pub fn new(storage: Arc<dyn CacheStorage>) -> Self {
        Self {
            storage,
            save_locks: SaveLocks::default(),
        }
    }

    pub fn on_disk(root: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileCacheStorage::new(root)))
    }

    /// Persists `content` and commits a record for it. Overwrites any
    /// previous entry for the key (last writer wins).
    pub async fn save(
        &self,
        job_id: &str,
        section: &str,
        generator: &str,
        content: &SectionContent,
    ) -> Result<CacheEntry, CacheError> {
        let key = CacheKey::new(job_id, section)?;
        let lock = self.save_lock(&key);
        let _guard = lock.lock().await;
        let previous_blob = self.read_record(&key).await.map(|r| r.content_file);

        let blob = format!("content-{}.json", Uuid::new_v4());
        let record = CacheRecord {
            job_id: job_id.to_string(),
            section: section.to_string(),
            content_file: blob.clone(),
            generated_at: Utc::now(),
            generator: generator.to_string(),
            cache_version: CACHE_VERSION,
        };
        let content_bytes = serde_json::to_vec_pretty(content)?;
        let record_bytes = serde_json::to_vec_pretty(&record)?;

        self.storage.write_blob(&key, &blob, &content_bytes).await?;

        if let Err(e) = self.storage.write_record(&key, &record_bytes).await {
            warn!("Cache commit failed for {job_id}/{section}, rolling back content: {e}");
            if let Err(rollback) = self.storage.remove_blob(&key, &blob).await {
                error!("Cache rollback failed for {job_id}/{section}/{blob}: {rollback}");
            }
            return Err(e.into());
        }

        if let Some(old) = previous_blob.filter(|old| *old != blob) {
            if let Err(e) = self.storage.remove_blob(&key, &old).await {
                warn!("Failed to remove superseded cache content {job_id}/{section}/{old}: {e}");
            }
        }

        debug!("Cached {job_id}/{section} from {generator}");
        Ok(CacheEntry {
            job_id: record.job_id,
            section: record.section,
            content: content.clone(),
            generated_at: record.generated_at,
            generator: record.generator,
            cache_version: record.cache_version,
        })
    }

    /// Returns the current entry, or `None` for a miss of any kind.
    pub async fn load(&self, job_id: &str, section: &str) -> Option<CacheEntry> {
        let key = match CacheKey::new(job_id, section) {
            Ok(key) => key,
            Err(e) => {
                warn!("Cache lookup skipped: {e}");
                return None;
            }
        };

        let record = self.read_record(&key).await?;

        if record.cache_version != CACHE_VERSION {
            debug!(
                "Cache entry {job_id}/{section} is stale (version {} != {CACHE_VERSION})",
                record.cache_version
            );
            return None;
        }
        if record.job_id != job_id || record.section != section {
            warn!("Cache record at {job_id}/{section} names a different key; ignoring");
            return None;
        }
        if !storage::is_blob_name(&record.content_file) {
            warn!(
                "Cache record {job_id}/{section} references an invalid content file '{}'",
                record.content_file
            );
            return None;
        }

        let bytes = match self.storage.read_blob(&key, &record.content_file).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Cache content for {job_id}/{section} unreadable: {e}");
                return None;
            }
        };
        let content: SectionContent = match serde_json::from_slice(&bytes) {
            Ok(content) => content,
            Err(e) => {
                warn!("Cache content for {job_id}/{section} is corrupt: {e}");
                return None;
            }
        };

        Some(CacheEntry {
            job_id: record.job_id,
            section: record.section,
            content,
            generated_at: record.generated_at,
            generator: record.generator,
            cache_version: record.cache_version,
        })
    }

    /// Removes one section's entry, or every entry for the job when `section` is `None`.
    pub async fn clear(&self, job_id: &str, section: Option<&str>) -> Result<(), CacheError> {
        match section {
            Some(section) => {
                let key = CacheKey::new(job_id, section)?;
                self.storage.remove_section(&key).await?;
                info!("Cleared cache for {job_id}/{section}");
            }
            None => {
                if !storage::is_safe_component(job_id) {
                    return Err(CacheError::InvalidKey(job_id.to_string()));
                }
                self.storage.remove_job(job_id).await?;
                info!("Cleared cache for job {job_id}");
            }
        }
        Ok(())
    }

    fn save_lock(&self, key: &CacheKey) -> Arc<AsyncMutex<()>> {
        let mut locks = self.save_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    async fn read_record(&self, key: &CacheKey) -> Option<CacheRecord> {
        let bytes = match self.storage.read_record(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache record for {}/{} unreadable: {e}", key.job_id, key.section);
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Cache record for {}/{} is corrupt: {e}", key.job_id, key.section);
                None
            }
        }
    }
}
